//! Key service abstraction.
//!
//! Production deployments keep signing keys in an HSM or a remote KMS. The
//! pipeline only needs two operations from it, captured by [`KeyService`].
//! [`MockHsm`] is the in-process implementation used by tests and the devnet
//! node.

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::crypto::{Keypair, PublicKey, Signature};

#[derive(Debug, Error)]
pub enum KeyServiceError {
    #[error("key {0} is not held by this key service")]
    KeyNotFound(PublicKey),

    #[error("key service unavailable: {0}")]
    Unavailable(String),
}

/// Something that holds private keys and signs on request.
pub trait KeyService: Send + Sync {
    /// Create a new key and return its public half.
    fn create_key(&self) -> Result<PublicKey, KeyServiceError>;

    /// Sign `message` with the private key behind `key`.
    fn sign_with_key(&self, key: &PublicKey, message: &[u8]) -> Result<Signature, KeyServiceError>;
}

/// In-memory key store. Safe to share across threads.
#[derive(Default)]
pub struct MockHsm {
    keys: DashMap<PublicKey, Keypair>,
}

impl MockHsm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand an existing keypair to the HSM, e.g. a fixed test key.
    pub fn import(&self, keypair: Keypair) -> PublicKey {
        let public = keypair.public_key();
        self.keys.insert(public, keypair);
        public
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.keys.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyService for MockHsm {
    fn create_key(&self) -> Result<PublicKey, KeyServiceError> {
        let public = self.import(Keypair::generate());
        debug!(key = %public, "mock hsm created key");
        Ok(public)
    }

    fn sign_with_key(&self, key: &PublicKey, message: &[u8]) -> Result<Signature, KeyServiceError> {
        let keypair = self
            .keys
            .get(key)
            .ok_or(KeyServiceError::KeyNotFound(*key))?;
        Ok(keypair.sign(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_keys_can_sign() {
        let hsm = MockHsm::new();
        let key = hsm.create_key().unwrap();
        let sig = hsm.sign_with_key(&key, b"payload").unwrap();
        assert!(key.verify(b"payload", &sig));
        assert_eq!(hsm.len(), 1);
    }

    #[test]
    fn unknown_key_is_reported() {
        let hsm = MockHsm::new();
        let stranger = Keypair::generate().public_key();
        assert!(matches!(
            hsm.sign_with_key(&stranger, b"x"),
            Err(KeyServiceError::KeyNotFound(k)) if k == stranger
        ));
    }

    #[test]
    fn imported_key_signs_like_the_original() {
        let hsm = MockHsm::new();
        let kp = Keypair::from_seed(&[3u8; 32]);
        let public = hsm.import(kp.clone());
        assert!(hsm.contains(&public));
        assert_eq!(hsm.sign_with_key(&public, b"m").unwrap(), kp.sign(b"m"));
    }
}
