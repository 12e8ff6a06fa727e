use std::convert::TryInto;

use sha2::{Digest, Sha256};

pub use secp256k1::{Message, PublicKey, SecretKey, Signature, SECP256K1};

/// A sha256 digest. Everything signed by this crate is hashed first.
pub type MessageHash = [u8; 32];

pub fn hash(data: &[u8]) -> MessageHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().as_slice().try_into().unwrap()
}

/// Hash a utf8 message string into a signable digest.
pub fn make_message_from_string(message_string: &str) -> MessageHash {
    hash(message_string.as_bytes())
}

/// Sign a 32-byte digest with the given secret key.
pub fn sign(message_hash: &MessageHash, secret_key: &SecretKey) -> Signature {
    let message = Message::from_slice(message_hash).unwrap();
    SECP256K1.sign(&message, secret_key)
}

/// Verify a signature over a 32-byte digest.
pub fn verify(message_hash: &MessageHash, signature: &Signature, public_key: &PublicKey) -> bool {
    match Message::from_slice(message_hash) {
        Ok(message) => SECP256K1.verify(&message, signature, public_key).is_ok(),
        Err(_) => false,
    }
}

/// Wire encoding of a signature: hex of the 64-byte compact form.
pub fn signature_to_hex(signature: &Signature) -> String {
    hex::encode(signature.serialize_compact())
}

pub fn signature_from_hex(hex_signature: &str) -> Option<Signature> {
    let mut bytes = [0u8; 64];
    hex::decode_to_slice(hex_signature, &mut bytes as &mut [u8]).ok()?;
    Signature::from_compact(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash(b"clearline"), hash(b"clearline"));
        assert_ne!(hash(b"clearline"), hash(b"clearlinf"));
    }

    #[test]
    fn sign_verify_round_trip() {
        let (secret_key, public_key) =
            SECP256K1.generate_keypair(&mut secp256k1::rand::thread_rng());
        let digest = make_message_from_string("hello world");
        let signature = sign(&digest, &secret_key);
        assert!(verify(&digest, &signature, &public_key));
        assert!(!verify(&make_message_from_string("goodbye"), &signature, &public_key));
    }

    #[test]
    fn signature_hex_round_trip() {
        let (secret_key, _) = SECP256K1.generate_keypair(&mut secp256k1::rand::thread_rng());
        let signature = sign(&hash(b"payload"), &secret_key);
        let encoded = signature_to_hex(&signature);
        assert_eq!(encoded.len(), 128);
        assert_eq!(signature_from_hex(&encoded), Some(signature));
        assert_eq!(signature_from_hex("zz"), None);
    }
}
