//! The signing capability consumed by the RPC core.
//!
//! The client never inspects key material. Everything it needs from a key
//! holder is expressed by the [`Signer`] trait: signing canonical request
//! payloads with a referenced key, signing an authentication challenge
//! bound to a handshake domain (the structured strategy), and signing the
//! bare challenge with the long-term key (the plain strategy).
//!
//! Signer failures are tagged so the authentication handshake can decide
//! its fallback structurally instead of sniffing error strings.

use crate::crypto::{hash, signature_to_hex};
use crate::keypair::Keypair;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

const TYPED_CHALLENGE_PREFIX: &str = "\x19Clearline Typed Auth:\n";
const PLAIN_CHALLENGE_PREFIX: &str = "\x19Clearline Signed Message:\n";

/// Signing failures, tagged by class.
///
/// `InvalidChallenge` and `InvalidSignature` are the soft class the
/// authentication handshake probes past; anything else is fatal to the
/// operation that requested the signature.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignError {
    #[error("invalid challenge")]
    InvalidChallenge,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("signing failed: {0}")]
    Fatal(String),
}

/// Which key a signature should be produced with.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyRef {
    /// The long-term identity key.
    Identity,
    /// An ephemeral session key, referenced by its address.
    Session(String),
}

/// Handshake parameters covered by a structured challenge signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthIntent {
    pub address: String,
    pub session_key: String,
    pub application: String,
    pub allowances: Vec<Allowance>,
    pub expire: u64,
    pub scope: String,
}

/// A spending allowance requested for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allowance {
    pub asset: String,
    pub amount: String,
}

/// The signing capability. Implementations own the key material; the RPC
/// core only ever passes payloads and key references through this seam.
pub trait Signer: Send + Sync {
    /// Address of the long-term identity key.
    fn address(&self) -> String;

    /// Generate a fresh ephemeral session key and return its address.
    /// The returned key must be distinct from the identity key.
    fn create_session_key(&self) -> Result<String, SignError>;

    /// Sign a canonical request payload with the referenced key.
    fn sign_payload(&self, payload: &[u8], key: &KeyRef) -> Result<String, SignError>;

    /// Structured challenge signature, bound to the handshake domain and
    /// the handshake parameters.
    fn sign_typed_challenge(
        &self,
        domain: &str,
        intent: &AuthIntent,
        challenge: &str,
    ) -> Result<String, SignError>;

    /// Plain challenge signature with the long-term key.
    fn sign_challenge(&self, challenge: &str) -> Result<String, SignError>;
}

/// Default in-process signer: an secp256k1 identity keypair plus the
/// ephemeral session keypairs generated for authentication handshakes.
pub struct KeypairSigner {
    identity: Keypair,
    session_keys: Mutex<HashMap<String, Keypair>>,
}

impl KeypairSigner {
    pub fn new(identity: Keypair) -> KeypairSigner {
        KeypairSigner {
            identity,
            session_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Signer with a randomly generated identity key.
    pub fn generate() -> KeypairSigner {
        KeypairSigner::new(Keypair::new())
    }

    pub fn from_secret_hex(secret_hex: &str) -> crate::Result<KeypairSigner> {
        Ok(KeypairSigner::new(Keypair::from_secret_hex(secret_hex)?))
    }

    pub fn identity(&self) -> &Keypair {
        &self.identity
    }

    fn sign_digest_with(&self, key: &KeyRef, digest: &[u8; 32]) -> Result<String, SignError> {
        match key {
            KeyRef::Identity => Ok(signature_to_hex(&self.identity.sign_digest(digest))),
            KeyRef::Session(address) => {
                let session_keys = self
                    .session_keys
                    .lock()
                    .map_err(|_| SignError::Fatal(String::from("session key table poisoned")))?;
                match session_keys.get(address) {
                    Some(keypair) => Ok(signature_to_hex(&keypair.sign_digest(digest))),
                    None => Err(SignError::Fatal(format!("unknown session key {}", address))),
                }
            }
        }
    }
}

impl Signer for KeypairSigner {
    fn address(&self) -> String {
        self.identity.address()
    }

    fn create_session_key(&self) -> Result<String, SignError> {
        let keypair = Keypair::new();
        let address = keypair.address();
        self.session_keys
            .lock()
            .map_err(|_| SignError::Fatal(String::from("session key table poisoned")))?
            .insert(address.clone(), keypair);
        Ok(address)
    }

    fn sign_payload(&self, payload: &[u8], key: &KeyRef) -> Result<String, SignError> {
        self.sign_digest_with(key, &hash(payload))
    }

    fn sign_typed_challenge(
        &self,
        domain: &str,
        intent: &AuthIntent,
        challenge: &str,
    ) -> Result<String, SignError> {
        if challenge.is_empty() {
            return Err(SignError::InvalidChallenge);
        }
        let canonical_intent = serde_json::to_string(intent)
            .map_err(|err| SignError::Fatal(err.to_string()))?;
        let bound = format!(
            "{}{}\n{}\n{}",
            TYPED_CHALLENGE_PREFIX, domain, canonical_intent, challenge
        );
        self.sign_digest_with(&KeyRef::Identity, &hash(bound.as_bytes()))
    }

    fn sign_challenge(&self, challenge: &str) -> Result<String, SignError> {
        if challenge.is_empty() {
            return Err(SignError::InvalidChallenge);
        }
        let bound = format!("{}{}", PLAIN_CHALLENGE_PREFIX, challenge);
        self.sign_digest_with(&KeyRef::Identity, &hash(bound.as_bytes()))
    }
}
