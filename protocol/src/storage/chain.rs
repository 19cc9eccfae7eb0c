//! Chain management: the [`Ledger`] in front of a [`Store`].
//!
//! The ledger owns the rules; the store owns the bytes. Everything that
//! mutates state goes through here:
//!
//! - `commit_transaction` for the finalizer, with bounded retry on lock
//!   contention and mapping of store conflicts onto finalize errors.
//! - `commit_block` for block producers: integrity, linkage, authority
//!   signature, full transaction verification, replay against the prior
//!   state, state-root check, then one atomic store commit.
//!
//! A rejected block changes nothing: not the height, not the state.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::block::{Block, BlockError, BlockHeader};
use super::state::StateSnapshot;
use super::store::{Store, StoreError};
use crate::config::LedgerConfig;
use crate::transaction::{verify_transaction, FinalizeError, Outpoint, Output, Transaction};

enum RetryError {
    Exhausted(u32),
    Store(StoreError),
}

/// Ledger front-end shared by the finalizer and the block generator.
pub struct Ledger {
    store: Arc<dyn Store>,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    pub fn with_config(store: Arc<dyn Store>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn is_unspent(&self, outpoint: &Outpoint) -> Result<bool, StoreError> {
        self.store.is_unspent(outpoint)
    }

    pub fn unspent_output(&self, outpoint: &Outpoint) -> Result<Option<Output>, StoreError> {
        self.store.unspent_output(outpoint)
    }

    pub fn unspent_outputs(&self) -> Result<Vec<(Outpoint, Output)>, StoreError> {
        self.store.unspent_outputs()
    }

    pub fn current_height(&self) -> Result<Option<u64>, StoreError> {
        self.store.current_height()
    }

    pub fn tip(&self) -> Result<Option<BlockHeader>, StoreError> {
        self.store.tip()
    }

    pub fn block(&self, height: u64) -> Result<Option<Block>, StoreError> {
        self.store.block(height)
    }

    pub fn confirmed_state(&self) -> Result<StateSnapshot, StoreError> {
        self.store.confirmed_state()
    }

    pub fn pending_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StoreError> {
        self.store.pending_transactions(limit)
    }

    /// Run `op`, retrying only on [`StoreError::Contention`].
    fn with_retry<T>(
        &self,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, RetryError> {
        let policy = self.config.retry;
        let attempts = policy.attempts();
        for attempt in 1..=attempts {
            match op() {
                Err(StoreError::Contention) if attempt < attempts => {
                    debug!(attempt, "store contended, retrying");
                    std::thread::sleep(policy.delay_after(attempt));
                }
                Err(StoreError::Contention) => return Err(RetryError::Exhausted(attempts)),
                Err(e) => return Err(RetryError::Store(e)),
                Ok(value) => return Ok(value),
            }
        }
        Err(RetryError::Exhausted(attempts))
    }

    /// Atomically check that `tx`'s outpoints are unspent and spend them.
    pub fn commit_transaction(&self, tx: &Transaction) -> Result<(), FinalizeError> {
        self.with_retry(|| self.store.commit_transaction(tx))
            .map_err(|e| match e {
                RetryError::Exhausted(attempts) => FinalizeError::Contention { attempts },
                RetryError::Store(StoreError::DoubleSpend(outpoint)) => {
                    FinalizeError::DoubleSpend { outpoint }
                }
                RetryError::Store(StoreError::DuplicateTransaction(hash)) => {
                    FinalizeError::DuplicateTransaction { hash }
                }
                RetryError::Store(other) => FinalizeError::Store(other),
            })
    }

    /// Validate `block` against `prior` and commit it. Returns the state
    /// after the block.
    ///
    /// `prior` must be the confirmed state the block builds on; for genesis
    /// it is the initial unspent set.
    pub fn commit_block(
        &self,
        block: &Block,
        prior: &StateSnapshot,
    ) -> Result<StateSnapshot, BlockError> {
        let result = self
            .validate_block(block, prior)
            .and_then(|post| self.store_block(block, post));

        match &result {
            Ok(_) => info!(
                height = block.height(),
                hash = %block.hash(),
                tx_count = block.tx_count(),
                "block committed"
            ),
            Err(e) => warn!(height = block.height(), error = %e, "block rejected"),
        }
        result
    }

    fn validate_block(
        &self,
        block: &Block,
        prior: &StateSnapshot,
    ) -> Result<StateSnapshot, BlockError> {
        let height = block.height();
        block.verify()?;

        match self.store.tip()? {
            None if height != 0 => {
                return Err(BlockError::invalid(height, "ledger has no genesis block"));
            }
            None => {}
            Some(tip) => {
                if height != tip.height + 1 || block.header.parent_hash != tip.hash {
                    return Err(BlockError::invalid(
                        height,
                        format!("does not extend tip {} at height {}", tip.hash, tip.height),
                    ));
                }
                if prior.root() != tip.state_root {
                    return Err(BlockError::invalid(
                        height,
                        "prior state is not the confirmed state",
                    ));
                }
            }
        }

        if height > 0 {
            if let Some(authority) = &self.config.block_authority {
                if !block.is_signed_by(authority) {
                    return Err(BlockError::invalid(
                        height,
                        "missing or invalid authority signature",
                    ));
                }
            }
        }

        let mut post = prior.clone();
        for (index, tx) in block.transactions.iter().enumerate() {
            verify_transaction(tx)
                .map_err(|e| BlockError::invalid(height, format!("transaction {index}: {e}")))?;
            post.apply(tx)
                .map_err(|e| BlockError::invalid(height, format!("transaction {index}: {e}")))?;
        }

        if post.root() != block.header.state_root {
            return Err(BlockError::invalid(height, "state root mismatch"));
        }
        Ok(post)
    }

    fn store_block(&self, block: &Block, post: StateSnapshot) -> Result<StateSnapshot, BlockError> {
        let height = block.height();
        self.with_retry(|| self.store.commit_block(block, &post))
            .map_err(|e| match e {
                RetryError::Exhausted(attempts) => BlockError::Contention { attempts },
                RetryError::Store(e) => BlockError::invalid(height, e.to_string()),
            })?;
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::crypto::{Hash, Keypair};
    use crate::identity::Registry;
    use crate::storage::{new_genesis_block, MemStore};
    use crate::transaction::{
        seal, sign_template, Action, AssetAmount, ReferenceData, TemplateBuilder,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Store wrapper that reports contention a fixed number of times.
    struct FlakyStore {
        inner: MemStore,
        failures: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemStore::new(),
                failures: AtomicU32::new(failures),
            }
        }

        fn trip(&self) -> Result<(), StoreError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Contention);
            }
            Ok(())
        }
    }

    impl Store for FlakyStore {
        fn is_unspent(&self, o: &Outpoint) -> Result<bool, StoreError> {
            self.inner.is_unspent(o)
        }
        fn unspent_output(&self, o: &Outpoint) -> Result<Option<Output>, StoreError> {
            self.inner.unspent_output(o)
        }
        fn unspent_outputs(&self) -> Result<Vec<(Outpoint, Output)>, StoreError> {
            self.inner.unspent_outputs()
        }
        fn commit_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
            self.trip()?;
            self.inner.commit_transaction(tx)
        }
        fn commit_block(&self, b: &Block, s: &StateSnapshot) -> Result<(), StoreError> {
            self.inner.commit_block(b, s)
        }
        fn current_height(&self) -> Result<Option<u64>, StoreError> {
            self.inner.current_height()
        }
        fn tip(&self) -> Result<Option<BlockHeader>, StoreError> {
            self.inner.tip()
        }
        fn block(&self, h: u64) -> Result<Option<Block>, StoreError> {
            self.inner.block(h)
        }
        fn confirmed_state(&self) -> Result<StateSnapshot, StoreError> {
            self.inner.confirmed_state()
        }
        fn pending_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StoreError> {
            self.inner.pending_transactions(limit)
        }
    }

    fn signed_issue(
        registry: &Registry,
        ledger: &Ledger,
        key: &Keypair,
        amount: u64,
    ) -> Transaction {
        let asset = registry
            .create_asset(vec![key.public_key()], 1, ReferenceData::empty(), Hash::ZERO, None)
            .unwrap();
        let account = registry.create_account(vec![key.public_key()], 1, None).unwrap();
        let mut template = TemplateBuilder::new(registry, ledger)
            .build(&[
                Action::issue(AssetAmount::new(asset, amount)),
                Action::control(AssetAmount::new(asset, amount), account),
            ])
            .unwrap();
        sign_template(&mut template, &[key.clone()]);
        seal(&template).unwrap()
    }

    fn ledger_with(store: Arc<dyn Store>, retry: RetryPolicy) -> Ledger {
        Ledger::with_config(
            store,
            LedgerConfig {
                retry,
                block_authority: None,
            },
        )
    }

    #[test]
    fn contention_is_retried_then_succeeds() {
        let ledger = ledger_with(
            Arc::new(FlakyStore::new(2)),
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(1),
            },
        );
        let tx = signed_issue(&Registry::new(), &ledger, &Keypair::generate(), 5);
        assert!(ledger.commit_transaction(&tx).is_ok());
    }

    #[test]
    fn contention_gives_up_after_max_attempts() {
        let ledger = ledger_with(
            Arc::new(FlakyStore::new(10)),
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
        );
        let tx = signed_issue(&Registry::new(), &ledger, &Keypair::generate(), 5);
        assert!(matches!(
            ledger.commit_transaction(&tx),
            Err(FinalizeError::Contention { attempts: 3 })
        ));
        assert!(ledger.pending_transactions(10).unwrap().is_empty());
    }

    #[test]
    fn genesis_then_block_with_pending_transaction() {
        let ledger = Ledger::new(Arc::new(MemStore::new()));
        let initial = StateSnapshot::new();
        let genesis = new_genesis_block(&initial, 0);
        let confirmed = ledger.commit_block(&genesis, &initial).unwrap();
        assert_eq!(ledger.current_height().unwrap(), Some(0));

        let tx = signed_issue(&Registry::new(), &ledger, &Keypair::generate(), 5);
        ledger.commit_transaction(&tx).unwrap();

        let mut post = confirmed.clone();
        post.apply(&tx).unwrap();
        let block = Block::new(&genesis.header, vec![tx], post.root(), 1, None);
        let after = ledger.commit_block(&block, &confirmed).unwrap();

        assert_eq!(after, post);
        assert_eq!(ledger.current_height().unwrap(), Some(1));
        assert!(ledger.pending_transactions(10).unwrap().is_empty());
        assert_eq!(ledger.confirmed_state().unwrap(), post);
    }

    #[test]
    fn wrong_state_root_is_rejected() {
        let ledger = Ledger::new(Arc::new(MemStore::new()));
        let initial = StateSnapshot::new();
        let genesis = new_genesis_block(&initial, 0);
        ledger.commit_block(&genesis, &initial).unwrap();

        let block = Block::new(&genesis.header, vec![], Hash([1u8; 32]), 1, None);
        assert!(matches!(
            ledger.commit_block(&block, &initial),
            Err(BlockError::InvalidBlock { height: 1, .. })
        ));
        assert_eq!(ledger.current_height().unwrap(), Some(0));
    }

    #[test]
    fn authority_signature_is_required() {
        let authority = Keypair::generate();
        let ledger = Ledger::with_config(
            Arc::new(MemStore::new()),
            LedgerConfig {
                block_authority: Some(authority.public_key()),
                ..LedgerConfig::default()
            },
        );
        let initial = StateSnapshot::new();
        let genesis = new_genesis_block(&initial, 0);
        ledger.commit_block(&genesis, &initial).unwrap();

        let mut block = Block::new(
            &genesis.header,
            vec![],
            initial.root(),
            1,
            Some(authority.public_key()),
        );
        assert!(ledger.commit_block(&block, &initial).is_err());

        block.header.signature = Some(authority.sign(block.hash().as_bytes()));
        assert!(ledger.commit_block(&block, &initial).is_ok());
    }

    #[test]
    fn second_genesis_is_rejected() {
        let ledger = Ledger::new(Arc::new(MemStore::new()));
        let initial = StateSnapshot::new();
        ledger
            .commit_block(&new_genesis_block(&initial, 0), &initial)
            .unwrap();
        assert!(ledger
            .commit_block(&new_genesis_block(&initial, 1), &initial)
            .is_err());
    }
}
