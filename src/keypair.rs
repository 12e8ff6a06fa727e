use crate::crypto::{sign, MessageHash};
use crate::error::Error;
use base58::ToBase58;
use secp256k1::{PublicKey, SecretKey, Signature, SECP256K1};
use std::fmt;

/// An secp256k1 keypair for signing and verifying messages
#[derive(Debug, PartialEq)]
pub struct Keypair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Keypair {
    /// Create and return a keypair with a randomly generated private key.
    pub fn new() -> Keypair {
        let (mut secret_key, mut public_key) =
            SECP256K1.generate_keypair(&mut secp256k1::rand::thread_rng());
        while public_key.serialize().to_base58().len() != 44 {
            // sometimes secp256k1 address is too big to store in 44 base-58 digits
            let keypair_tuple = SECP256K1.generate_keypair(&mut secp256k1::rand::thread_rng());
            secret_key = keypair_tuple.0;
            public_key = keypair_tuple.1;
        }

        Keypair {
            secret_key,
            public_key,
        }
    }

    /// Create and return a keypair with the given u8 array as the private key
    pub fn from_secret_slice(slice: &[u8]) -> Result<Keypair, Error> {
        let secret_key =
            SecretKey::from_slice(slice).map_err(|err| Error::Key(err.to_string()))?;
        let public_key = PublicKey::from_secret_key(&SECP256K1, &secret_key);

        Ok(Keypair {
            secret_key,
            public_key,
        })
    }

    /// Create and return a keypair with the given hex string as the private key
    pub fn from_secret_hex(secret_hex: &str) -> Result<Keypair, Error> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(secret_hex, &mut bytes as &mut [u8])
            .map_err(|err| Error::Key(err.to_string()))?;
        Keypair::from_secret_slice(&bytes)
    }

    /// Get the public key of the keypair in base58(i.e. address) format
    pub fn address(&self) -> String {
        self.public_key.serialize().to_base58()
    }

    /// Get the public key of the keypair as secp256k1::key::PublicKey
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Sign a 32-byte digest
    pub fn sign_digest(&self, digest: &MessageHash) -> Signature {
        sign(digest, &self.secret_key)
    }
}

impl Default for Keypair {
    fn default() -> Self {
        Keypair::new()
    }
}

impl fmt::Display for Keypair {
    /// formats a Keypair for println!
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pubkey:{}", self.public_key)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::{make_message_from_string, verify};

    #[test]
    fn keypair_signing_test() {
        let mock_secret_key = "da79fe6d86347e8f8dc71eb3dbab9ba5623eaaed6c5dd0bb257c0d631faaff16";
        let keypair = Keypair::from_secret_hex(mock_secret_key).unwrap();
        let digest = make_message_from_string("hello world");
        let signature = keypair.sign_digest(&digest);
        assert!(verify(&digest, &signature, keypair.public_key()));
        assert!(!verify(
            &make_message_from_string("hello worlds"),
            &signature,
            keypair.public_key()
        ));
    }

    #[test]
    fn keypair_new_from_secret_key_test() {
        let mock_secret_key = "da79fe6d86347e8f8dc71eb3dbab9ba5623eaaed6c5dd0bb257c0d631faaff16";
        let keypair = Keypair::from_secret_hex(mock_secret_key).unwrap();
        assert_eq!(keypair.secret_key().to_string(), mock_secret_key);
        assert_eq!(
            keypair.address(),
            "e1hpHsuiRPbzXdCf7smXvAFCnqpvZXcjtxZLMxcATat1"
        );

        assert!(Keypair::from_secret_hex("randomtext").is_err());
        assert!(Keypair::from_secret_hex("").is_err());
    }

    #[test]
    fn keypair_new_test() {
        let keypair = Keypair::new();
        assert_eq!(keypair.address().len(), 44);
        assert_eq!(keypair.secret_key().to_string().len(), 64);
    }
}
