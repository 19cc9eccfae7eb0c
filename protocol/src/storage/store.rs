//! Ledger store interface and the in-memory implementation.
//!
//! The store holds two views of the unspent set:
//!
//! - **confirmed**: the state after the last committed block. Only block
//!   commits change it.
//! - **live**: confirmed plus the effects of every finalized transaction
//!   still waiting for a block. Finalization checks against this view, so a
//!   second spend of an outpoint is refused even before any block includes
//!   the first.
//!
//! Every block commit rebuilds live from the new confirmed state by
//! replaying the transactions that are still pending, so the two views
//! never drift apart.
//!
//! Every mutation runs under one lock, which makes "is this unspent" and
//! "mark it spent" a single step. The lock is acquired with a timeout;
//! failing to get it is reported as [`StoreError::Contention`] and retried
//! by the ledger.

use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use super::block::{Block, BlockHeader};
use super::state::StateSnapshot;
use crate::config::DEFAULT_LOCK_TIMEOUT;
use crate::crypto::Hash;
use crate::transaction::{Outpoint, Output, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("output {0} is not unspent")]
    DoubleSpend(Outpoint),

    #[error("transaction {0} is already committed")]
    DuplicateTransaction(Hash),

    #[error("block at height {height} does not extend the tip (expected height {expected})")]
    NotExtendingTip { height: u64, expected: u64 },

    #[error("store lock contended")]
    Contention,
}

/// Storage backend for a [`Ledger`](super::Ledger).
///
/// `commit_transaction` and `commit_block` must be atomic: either every
/// effect is visible to other callers or none is.
pub trait Store: Send + Sync {
    fn is_unspent(&self, outpoint: &Outpoint) -> Result<bool, StoreError>;

    fn unspent_output(&self, outpoint: &Outpoint) -> Result<Option<Output>, StoreError>;

    /// Every live unspent output, in outpoint order.
    fn unspent_outputs(&self) -> Result<Vec<(Outpoint, Output)>, StoreError>;

    /// Check that none of `tx`'s outpoints are spent and mark them spent.
    fn commit_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Append `block` and make `post_state` the confirmed state.
    fn commit_block(&self, block: &Block, post_state: &StateSnapshot) -> Result<(), StoreError>;

    /// Height of the tip, `None` before genesis.
    fn current_height(&self) -> Result<Option<u64>, StoreError>;

    fn tip(&self) -> Result<Option<BlockHeader>, StoreError>;

    fn block(&self, height: u64) -> Result<Option<Block>, StoreError>;

    fn confirmed_state(&self) -> Result<StateSnapshot, StoreError>;

    /// Finalized transactions not yet in a block, oldest first.
    fn pending_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StoreError>;
}

// ---------------------------------------------------------------------------
// MemStore
// ---------------------------------------------------------------------------

type UtxoMap = BTreeMap<Outpoint, Output>;

#[derive(Default)]
struct Inner {
    blocks: Vec<Block>,
    confirmed: StateSnapshot,
    live: UtxoMap,
    pending: Vec<Transaction>,
    known: HashSet<Hash>,
}

impl Inner {
    /// Apply `tx` to `live`, failing on the first outpoint that is not
    /// spendable. Does not consult the known-transaction set.
    fn spend_live(live: &mut UtxoMap, tx: &Transaction) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for outpoint in tx.spent_outpoints() {
            if !seen.insert(*outpoint) || !live.contains_key(outpoint) {
                return Err(StoreError::DoubleSpend(*outpoint));
            }
        }
        for outpoint in &seen {
            live.remove(outpoint);
        }
        for (outpoint, output) in tx.created_outputs() {
            live.insert(outpoint, output.clone());
        }
        Ok(())
    }

    fn utxo_map(state: &StateSnapshot) -> UtxoMap {
        state.iter().map(|(o, out)| (*o, out.clone())).collect()
    }
}

/// In-memory [`Store`].
pub struct MemStore {
    inner: Mutex<Inner>,
    lock_timeout: Duration,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// How long an operation waits for the lock before reporting contention.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .try_lock_for(self.lock_timeout)
            .ok_or(StoreError::Contention)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemStore {
    fn is_unspent(&self, outpoint: &Outpoint) -> Result<bool, StoreError> {
        Ok(self.lock()?.live.contains_key(outpoint))
    }

    fn unspent_output(&self, outpoint: &Outpoint) -> Result<Option<Output>, StoreError> {
        Ok(self.lock()?.live.get(outpoint).cloned())
    }

    fn unspent_outputs(&self) -> Result<Vec<(Outpoint, Output)>, StoreError> {
        Ok(self
            .lock()?
            .live
            .iter()
            .map(|(o, out)| (*o, out.clone()))
            .collect())
    }

    fn commit_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.known.contains(&tx.hash()) {
            return Err(StoreError::DuplicateTransaction(tx.hash()));
        }
        Inner::spend_live(&mut inner.live, tx)?;
        inner.known.insert(tx.hash());
        inner.pending.push(tx.clone());
        Ok(())
    }

    fn commit_block(&self, block: &Block, post_state: &StateSnapshot) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        let expected = inner.blocks.last().map_or(0, |tip| tip.height() + 1);
        let extends_tip = match inner.blocks.last() {
            Some(tip) => block.header.parent_hash == tip.hash(),
            None => true,
        };
        if block.height() != expected || !extends_tip {
            return Err(StoreError::NotExtendingTip {
                height: block.height(),
                expected,
            });
        }

        // Block transactions nobody finalized here must not conflict with
        // the live view. Checked on a scratch copy.
        let mut scratch = if block.height() == 0 {
            Inner::utxo_map(post_state)
        } else {
            inner.live.clone()
        };
        let pending: HashSet<Hash> = inner.pending.iter().map(Transaction::hash).collect();
        let mut included = HashSet::new();

        for tx in &block.transactions {
            if pending.contains(&tx.hash()) {
                included.insert(tx.hash());
                continue;
            }
            if inner.known.contains(&tx.hash()) || !included.insert(tx.hash()) {
                return Err(StoreError::DuplicateTransaction(tx.hash()));
            }
            Inner::spend_live(&mut scratch, tx)?;
        }

        // Live = new confirmed state + replay of what is still pending.
        let mut live = Inner::utxo_map(post_state);
        let mut still_pending = Vec::new();
        let mut dropped = Vec::new();
        for tx in inner.pending.iter().filter(|tx| !included.contains(&tx.hash())) {
            match Inner::spend_live(&mut live, tx) {
                Ok(()) => still_pending.push(tx.clone()),
                Err(e) => {
                    warn!(tx_id = %tx.hash(), error = %e, "pending transaction dropped");
                    dropped.push(tx.hash());
                }
            }
        }

        inner.live = live;
        inner.confirmed = post_state.clone();
        inner.pending = still_pending;
        for hash in &dropped {
            inner.known.remove(hash);
        }
        inner.known.extend(included);
        inner.blocks.push(block.clone());
        Ok(())
    }

    fn current_height(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.lock()?.blocks.last().map(Block::height))
    }

    fn tip(&self) -> Result<Option<BlockHeader>, StoreError> {
        Ok(self.lock()?.blocks.last().map(|b| b.header.clone()))
    }

    fn block(&self, height: u64) -> Result<Option<Block>, StoreError> {
        let inner = self.lock()?;
        Ok(usize::try_from(height)
            .ok()
            .and_then(|h| inner.blocks.get(h))
            .cloned())
    }

    fn confirmed_state(&self) -> Result<StateSnapshot, StoreError> {
        Ok(self.lock()?.confirmed.clone())
    }

    fn pending_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.lock()?.pending.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block::new_genesis_block;
    use std::sync::Arc;

    #[test]
    fn genesis_seeds_live_view() {
        let store = MemStore::new();
        let genesis = new_genesis_block(&StateSnapshot::new(), 0);
        store.commit_block(&genesis, &StateSnapshot::new()).unwrap();
        assert_eq!(store.current_height().unwrap(), Some(0));
        assert_eq!(store.tip().unwrap().map(|h| h.hash), Some(genesis.hash()));
        assert!(store.unspent_outputs().unwrap().is_empty());
    }

    #[test]
    fn block_must_extend_tip() {
        let store = MemStore::new();
        let genesis = new_genesis_block(&StateSnapshot::new(), 0);
        let orphan = Block::new(&genesis.header, vec![], Hash::ZERO, 1, None);
        assert_eq!(
            store.commit_block(&orphan, &StateSnapshot::new()),
            Err(StoreError::NotExtendingTip { height: 1, expected: 0 })
        );
        assert_eq!(store.current_height().unwrap(), None);
    }

    #[test]
    fn held_lock_reports_contention() {
        let store = Arc::new(MemStore::new().with_lock_timeout(Duration::from_millis(10)));
        let guard = store.inner.lock();
        let other = Arc::clone(&store);
        let result = std::thread::spawn(move || other.current_height())
            .join()
            .unwrap();
        drop(guard);
        assert_eq!(result, Err(StoreError::Contention));
        assert!(store.current_height().is_ok());
    }
}
