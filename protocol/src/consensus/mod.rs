//! # Block Production
//!
//! Strata does not run a consensus algorithm. A single authority proposes
//! blocks from the finalized-but-unconfirmed transactions and commits them
//! itself; the ledger accepts them because they carry that authority's
//! signature.
//!
//! The roles are split into two traits so that a multi-party engine can
//! replace the [`Generator`] without the transaction pipeline noticing:
//!
//! - [`BlockProposer`] turns pending transactions into a signed block.
//! - [`BlockCommitter`] validates and commits a proposed block.

pub mod generator;
pub mod signer;

pub use generator::{Generator, GeneratorConfig, GeneratorError};
pub use signer::BlockSigner;

use crate::storage::{Block, BlockError, StateSnapshot};

/// A proposed block together with the state it was built on.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub block: Block,
    pub prior: StateSnapshot,
}

pub trait BlockProposer {
    /// Propose the next block at `time_ms` (unix millis). `None` means there
    /// was nothing worth proposing.
    fn propose(&self, time_ms: u64) -> Result<Option<Proposal>, GeneratorError>;
}

pub trait BlockCommitter {
    /// Commit `proposal`, returning the state after the block.
    fn commit(&self, proposal: &Proposal) -> Result<StateSnapshot, BlockError>;
}
