//! # Block Structure
//!
//! A block is an ordered list of finalized transactions plus a header that
//! links it to its parent and commits to the resulting ledger state.
//!
//! ## Block Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  BlockHeader                                │
//! │  ├── height: u64                            │
//! │  ├── hash: Hash          (header hash)      │
//! │  ├── parent_hash: Hash                      │
//! │  ├── timestamp: u64      (unix millis)      │
//! │  ├── proposer: Option<PublicKey>            │
//! │  ├── state_root: Hash    (after this block) │
//! │  ├── tx_root: Hash       (Merkle root)      │
//! │  └── signature: Option<Signature>           │
//! ├─────────────────────────────────────────────┤
//! │  transactions: Vec<Transaction>             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The header hash covers every field except `hash` and `signature`; the
//! authority signs the hash. `tx_root` is a Merkle root over the witness
//! hashes of the transactions, so it commits to their signatures too.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::StateSnapshot;
use super::store::StoreError;
use crate::config::DOMAIN_BLOCK;
use crate::crypto::{domain_separated_hash, merkle_root, Hash, PublicKey, Signature};
use crate::transaction::Transaction;

/// Errors from block validation and commit.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("invalid block at height {height}: {reason}")]
    InvalidBlock { height: u64, reason: String },

    #[error("ledger still contended after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl BlockError {
    pub(crate) fn invalid(height: u64, reason: impl Into<String>) -> Self {
        Self::InvalidBlock {
            height,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// BlockHeader
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block height (genesis = 0).
    pub height: u64,
    /// Hash of this header's fields.
    pub hash: Hash,
    /// Hash of the parent header. Zero for genesis.
    pub parent_hash: Hash,
    /// Unix timestamp (milliseconds) when this block was produced.
    pub timestamp: u64,
    /// Key of the authority that produced the block. `None` for genesis.
    pub proposer: Option<PublicKey>,
    /// Root of the unspent set after applying this block.
    pub state_root: Hash,
    /// Merkle root of the transactions' witness hashes.
    pub tx_root: Hash,
    /// Proposer's signature over `hash`.
    pub signature: Option<Signature>,
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Construct an unsigned block extending `parent`.
    pub fn new(
        parent: &BlockHeader,
        transactions: Vec<Transaction>,
        state_root: Hash,
        timestamp: u64,
        proposer: Option<PublicKey>,
    ) -> Self {
        let mut header = BlockHeader {
            height: parent.height + 1,
            hash: Hash::ZERO,
            parent_hash: parent.hash,
            timestamp,
            proposer,
            state_root,
            tx_root: compute_tx_root(&transactions),
            signature: None,
        };
        header.hash = compute_header_hash(&header);
        Block {
            header,
            transactions,
        }
    }

    /// Recompute the header hash from its fields.
    pub fn compute_hash(&self) -> Hash {
        compute_header_hash(&self.header)
    }

    /// Structural integrity: header hash, tx root and genesis shape.
    ///
    /// Linkage to the chain and the authority signature are checked by the
    /// ledger, which knows the tip and the configured authority.
    pub fn verify(&self) -> Result<(), BlockError> {
        let height = self.header.height;
        let expected_hash = self.compute_hash();
        if self.header.hash != expected_hash {
            return Err(BlockError::invalid(
                height,
                format!(
                    "hash mismatch: stored={}, computed={}",
                    self.header.hash, expected_hash
                ),
            ));
        }

        let expected_tx_root = compute_tx_root(&self.transactions);
        if self.header.tx_root != expected_tx_root {
            return Err(BlockError::invalid(
                height,
                format!(
                    "tx_root mismatch: stored={}, computed={}",
                    self.header.tx_root, expected_tx_root
                ),
            ));
        }

        if height == 0 && (self.header.parent_hash != Hash::ZERO || !self.transactions.is_empty()) {
            return Err(BlockError::invalid(
                0,
                "genesis must have a zero parent and no transactions",
            ));
        }

        Ok(())
    }

    /// Whether the header carries a valid signature by `authority`.
    pub fn is_signed_by(&self, authority: &PublicKey) -> bool {
        self.header.proposer.as_ref() == Some(authority)
            && self
                .header
                .signature
                .as_ref()
                .is_some_and(|sig| authority.verify(self.header.hash.as_bytes(), sig))
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

/// The height-0 block committing to `initial`, the starting unspent set.
pub fn new_genesis_block(initial: &StateSnapshot, timestamp: u64) -> Block {
    let mut header = BlockHeader {
        height: 0,
        hash: Hash::ZERO,
        parent_hash: Hash::ZERO,
        timestamp,
        proposer: None,
        state_root: initial.root(),
        tx_root: compute_tx_root(&[]),
        signature: None,
    };
    header.hash = compute_header_hash(&header);
    Block {
        header,
        transactions: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Hash Computation
// ---------------------------------------------------------------------------

fn compute_header_hash(header: &BlockHeader) -> Hash {
    let mut preimage = Vec::with_capacity(160);
    preimage.extend_from_slice(&header.height.to_le_bytes());
    preimage.extend_from_slice(header.parent_hash.as_bytes());
    preimage.extend_from_slice(&header.timestamp.to_le_bytes());
    match &header.proposer {
        Some(key) => {
            preimage.push(1);
            preimage.extend_from_slice(key.as_bytes());
        }
        None => preimage.push(0),
    }
    preimage.extend_from_slice(header.state_root.as_bytes());
    preimage.extend_from_slice(header.tx_root.as_bytes());
    domain_separated_hash(DOMAIN_BLOCK, &preimage)
}

/// Merkle root over the witness hashes of `transactions`, in block order.
pub fn compute_tx_root(transactions: &[Transaction]) -> Hash {
    let leaves: Vec<Hash> = transactions.iter().map(Transaction::witness_hash).collect();
    merkle_root(&leaves)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{blake3_hash, Keypair};

    #[test]
    fn genesis_block_properties() {
        let genesis = new_genesis_block(&StateSnapshot::new(), 0);
        assert_eq!(genesis.height(), 0);
        assert_eq!(genesis.header.parent_hash, Hash::ZERO);
        assert_eq!(genesis.header.state_root, StateSnapshot::new().root());
        assert!(genesis.transactions.is_empty());
        assert!(genesis.header.signature.is_none());
        assert!(genesis.verify().is_ok());
    }

    #[test]
    fn genesis_hash_is_deterministic() {
        let g1 = new_genesis_block(&StateSnapshot::new(), 42);
        let g2 = new_genesis_block(&StateSnapshot::new(), 42);
        assert_eq!(g1.hash(), g2.hash());
        assert_ne!(g1.hash(), new_genesis_block(&StateSnapshot::new(), 43).hash());
    }

    #[test]
    fn new_block_links_to_parent() {
        let genesis = new_genesis_block(&StateSnapshot::new(), 0);
        let block = Block::new(&genesis.header, vec![], blake3_hash(b"root"), 1, None);

        assert_eq!(block.height(), 1);
        assert_eq!(block.header.parent_hash, genesis.hash());
        assert!(block.verify().is_ok());
    }

    #[test]
    fn tampered_hash_fails_verification() {
        let genesis = new_genesis_block(&StateSnapshot::new(), 0);
        let mut block = Block::new(&genesis.header, vec![], Hash::ZERO, 1, None);
        block.header.hash.0[0] ^= 0xFF;
        assert!(matches!(block.verify(), Err(BlockError::InvalidBlock { .. })));
    }

    #[test]
    fn tampered_tx_root_fails_verification() {
        let genesis = new_genesis_block(&StateSnapshot::new(), 0);
        let mut block = Block::new(&genesis.header, vec![], Hash::ZERO, 1, None);

        // Hash recomputed so only the tx_root check can catch it.
        block.header.tx_root = blake3_hash(b"forged");
        block.header.hash = block.compute_hash();
        assert!(block.verify().is_err());
    }

    #[test]
    fn signature_binds_the_proposer() {
        let authority = Keypair::generate();
        let genesis = new_genesis_block(&StateSnapshot::new(), 0);
        let mut block = Block::new(
            &genesis.header,
            vec![],
            Hash::ZERO,
            1,
            Some(authority.public_key()),
        );
        assert!(!block.is_signed_by(&authority.public_key()));

        block.header.signature = Some(authority.sign(block.hash().as_bytes()));
        assert!(block.is_signed_by(&authority.public_key()));
        assert!(!block.is_signed_by(&Keypair::generate().public_key()));
    }

    #[test]
    fn block_serialization_roundtrip() {
        let genesis = new_genesis_block(&StateSnapshot::new(), 7);
        let json = serde_json::to_string(&genesis).expect("serialize");
        let recovered: Block = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(genesis, recovered);
    }
}
