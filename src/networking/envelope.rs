use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method name a node uses to signal an application-level failure.
pub const ERROR_METHOD: &str = "error";

#[derive(Serialize, Deserialize)]
struct WireRequest {
    req: (u64, String, Value, u64),
    #[serde(default)]
    sig: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct WireResponse {
    res: (u64, String, Value, u64),
    #[serde(default)]
    sig: Vec<String>,
}

/// An outbound request. Immutable once sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub id: u64,
    pub method: String,
    pub params: Value,
    pub timestamp: u64,
    pub signatures: Vec<String>,
}

impl RequestEnvelope {
    pub fn new(id: u64, method: &str, params: Value, timestamp: u64) -> RequestEnvelope {
        RequestEnvelope {
            id,
            method: String::from(method),
            params,
            timestamp,
            signatures: vec![],
        }
    }

    /// The canonical byte payload covered by request signatures: the
    /// serialized `req` tuple.
    pub fn signing_payload(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(&(self.id, &self.method, &self.params, self.timestamp))
            .map_err(Error::from)
    }

    pub fn serialize(&self) -> crate::Result<String> {
        let wire = WireRequest {
            req: (
                self.id,
                self.method.clone(),
                self.params.clone(),
                self.timestamp,
            ),
            sig: self.signatures.clone(),
        };
        serde_json::to_string(&wire).map_err(Error::from)
    }

    pub fn deserialize(raw: &str) -> crate::Result<RequestEnvelope> {
        let wire: WireRequest = serde_json::from_str(raw)?;
        let (id, method, params, timestamp) = wire.req;
        Ok(RequestEnvelope {
            id,
            method,
            params,
            timestamp,
            signatures: wire.sig,
        })
    }
}

/// An inbound response or notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub id: u64,
    pub method: String,
    pub result: Value,
    pub timestamp: u64,
    pub signatures: Vec<String>,
}

impl ResponseEnvelope {
    pub fn new(id: u64, method: &str, result: Value, timestamp: u64) -> ResponseEnvelope {
        ResponseEnvelope {
            id,
            method: String::from(method),
            result,
            timestamp,
            signatures: vec![],
        }
    }

    pub fn serialize(&self) -> crate::Result<String> {
        let wire = WireResponse {
            res: (
                self.id,
                self.method.clone(),
                self.result.clone(),
                self.timestamp,
            ),
            sig: self.signatures.clone(),
        };
        serde_json::to_string(&wire).map_err(Error::from)
    }

    pub fn deserialize(raw: &str) -> crate::Result<ResponseEnvelope> {
        let wire: WireResponse = serde_json::from_str(raw)?;
        let (id, method, result, timestamp) = wire.res;
        Ok(ResponseEnvelope {
            id,
            method,
            result,
            timestamp,
            signatures: wire.sig,
        })
    }

    pub fn is_error(&self) -> bool {
        self.method == ERROR_METHOD
    }

    /// The human-readable message of an error response: `result.error`,
    /// or the result itself if it is a bare string.
    pub fn error_message(&self) -> String {
        if let Some(message) = self.result.get("error").and_then(Value::as_str) {
            return String::from(message);
        }
        if let Some(message) = self.result.as_str() {
            return String::from(message);
        }
        self.result.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trip() {
        let mut request =
            RequestEnvelope::new(7, "transfer", json!({"asset": "usd", "amount": "10"}), 1234);
        request.signatures.push(String::from("aabb"));

        let raw = request.serialize().unwrap();
        assert!(raw.starts_with("{\"req\":[7,\"transfer\""));

        let parsed = RequestEnvelope::deserialize(&raw).unwrap();
        assert_eq!(parsed.id, request.id);
        assert_eq!(parsed.method, request.method);
        assert_eq!(parsed.params, request.params);
        assert_eq!(parsed.signatures, request.signatures);
    }

    #[test]
    fn response_parses_from_the_wire() {
        let response =
            ResponseEnvelope::deserialize("{\"res\":[1,\"ping\",\"pong\",99],\"sig\":[]}").unwrap();
        assert_eq!(response.id, 1);
        assert_eq!(response.method, "ping");
        assert_eq!(response.result, json!("pong"));
        assert!(!response.is_error());

        // sig may be omitted entirely
        let response = ResponseEnvelope::deserialize("{\"res\":[2,\"ping\",null,99]}").unwrap();
        assert_eq!(response.id, 2);
    }

    #[test]
    fn malformed_messages_are_rejected() {
        assert!(ResponseEnvelope::deserialize("not json").is_err());
        assert!(ResponseEnvelope::deserialize("{\"res\":[1,\"ping\"]}").is_err());
        assert!(ResponseEnvelope::deserialize("{\"other\":true}").is_err());
    }

    #[test]
    fn error_message_extraction() {
        let embedded =
            ResponseEnvelope::new(1, ERROR_METHOD, json!({"error": "bad params"}), 0);
        assert!(embedded.is_error());
        assert_eq!(embedded.error_message(), "bad params");

        let bare = ResponseEnvelope::new(1, ERROR_METHOD, json!("nope"), 0);
        assert_eq!(bare.error_message(), "nope");

        let shapeless = ResponseEnvelope::new(1, ERROR_METHOD, json!({"code": 13}), 0);
        assert_eq!(shapeless.error_message(), "{\"code\":13}");
    }

    #[test]
    fn signing_payload_covers_the_request_tuple() {
        let request = RequestEnvelope::new(3, "ping", json!({}), 17);
        let payload = request.signing_payload().unwrap();
        assert_eq!(payload, b"[3,\"ping\",{},17]".to_vec());

        // signatures are not part of the covered payload
        let mut signed = request.clone();
        signed.signatures.push(String::from("sig"));
        assert_eq!(signed.signing_payload().unwrap(), payload);
    }
}
