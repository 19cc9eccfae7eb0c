//! # Storage Module
//!
//! Ledger state and the chain of blocks that advances it.
//!
//! ## Architecture
//!
//! ```text
//! block.rs : Block structure, genesis block, header hash, tx Merkle root
//! state.rs : StateSnapshot: unspent outputs with a Merkle state root
//! store.rs : Store trait and the in-memory MemStore
//! chain.rs : Ledger: commit rules for transactions and blocks
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! finalize ──► Ledger::commit_transaction ──► Store (live view, pending)
//!                                                    │
//! generator ─► Ledger::commit_block ─────────► Store (confirmed state, blocks)
//! ```
//!
//! Persistent engines plug in behind [`Store`]; nothing above it knows
//! whether the bytes live in memory or on disk.

pub mod block;
pub mod chain;
pub mod state;
pub mod store;

pub use block::{compute_tx_root, new_genesis_block, Block, BlockError, BlockHeader};
pub use chain::Ledger;
pub use state::{StateError, StateSnapshot};
pub use store::{MemStore, Store, StoreError};
