//! Block signing for the generator.
//!
//! The signing key either lives in process or behind a [`KeyService`]. In
//! both cases the signature covers the header hash and nothing else.

use std::fmt;
use std::sync::Arc;

use crate::crypto::{Keypair, PublicKey};
use crate::identity::{KeyService, KeyServiceError};
use crate::storage::Block;

enum Backend {
    Local(Keypair),
    Service(Arc<dyn KeyService>),
}

/// Signs blocks as one fixed authority key.
pub struct BlockSigner {
    key: PublicKey,
    backend: Backend,
}

impl BlockSigner {
    pub fn local(keypair: Keypair) -> Self {
        Self {
            key: keypair.public_key(),
            backend: Backend::Local(keypair),
        }
    }

    /// Sign with `key` held by `service`.
    pub fn with_service(service: Arc<dyn KeyService>, key: PublicKey) -> Self {
        Self {
            key,
            backend: Backend::Service(service),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.key
    }

    /// Attach a signature over the block's header hash.
    pub fn sign(&self, block: &mut Block) -> Result<(), KeyServiceError> {
        let message = block.header.hash;
        let signature = match &self.backend {
            Backend::Local(keypair) => keypair.sign(message.as_bytes()),
            Backend::Service(service) => service.sign_with_key(&self.key, message.as_bytes())?,
        };
        block.header.signature = Some(signature);
        Ok(())
    }
}

impl fmt::Debug for BlockSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match self.backend {
            Backend::Local(_) => "local",
            Backend::Service(_) => "key-service",
        };
        f.debug_struct("BlockSigner")
            .field("key", &self.key)
            .field("backend", &backend)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MockHsm;
    use crate::storage::{new_genesis_block, StateSnapshot};

    fn unsigned_block(proposer: PublicKey) -> Block {
        let genesis = new_genesis_block(&StateSnapshot::new(), 0);
        Block::new(
            &genesis.header,
            vec![],
            StateSnapshot::new().root(),
            1,
            Some(proposer),
        )
    }

    #[test]
    fn local_signer_produces_authority_signature() {
        let signer = BlockSigner::local(Keypair::generate());
        let mut block = unsigned_block(signer.public_key());
        signer.sign(&mut block).unwrap();
        assert!(block.is_signed_by(&signer.public_key()));
    }

    #[test]
    fn service_signer_uses_the_hsm_key() {
        let hsm = Arc::new(MockHsm::new());
        let key = hsm.create_key().unwrap();
        let signer = BlockSigner::with_service(hsm, key);
        let mut block = unsigned_block(key);
        signer.sign(&mut block).unwrap();
        assert!(block.is_signed_by(&key));
    }

    #[test]
    fn service_without_the_key_fails() {
        let key = Keypair::generate().public_key();
        let signer = BlockSigner::with_service(Arc::new(MockHsm::new()), key);
        let mut block = unsigned_block(key);
        assert!(matches!(
            signer.sign(&mut block),
            Err(KeyServiceError::KeyNotFound(_))
        ));
        assert!(block.header.signature.is_none());
    }

    #[test]
    fn debug_hides_key_material() {
        let signer = BlockSigner::local(Keypair::generate());
        let debug = format!("{signer:?}");
        assert!(debug.contains("local"));
    }
}
