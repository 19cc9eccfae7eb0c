//! # Single-Authority Block Generator
//!
//! The generator is the only block producer on a bootstrap ledger. Each
//! round it:
//!
//! ```text
//! 1. SELECT  : oldest pending transactions, up to max_txs_per_block
//! 2. EXECUTE : apply each to the confirmed state; drop failures
//! 3. BUILD   : block on the tip with the post-execution state root
//! 4. SIGN    : authority signature over the header hash
//! 5. COMMIT  : Ledger::commit_block against the confirmed state
//! ```
//!
//! ## Shutdown
//!
//! [`Generator::run`] watches a `tokio::sync::watch` channel and exits after
//! the current round when it flips to `true` or the sender is dropped.
//! Each round runs on the blocking pool, off the async workers.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::signer::BlockSigner;
use super::{BlockCommitter, BlockProposer, Proposal};
use crate::config::{DEFAULT_BLOCK_PERIOD, DEFAULT_MAX_TXS_PER_BLOCK};
use crate::crypto::PublicKey;
use crate::identity::KeyServiceError;
use crate::storage::{new_genesis_block, Block, BlockError, Ledger, StateSnapshot, StoreError};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("signer is not the ledger's block authority")]
    NotAuthority,

    #[error("ledger has no genesis block")]
    NoGenesis,

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("block signing failed: {0}")]
    Signing(#[from] KeyServiceError),
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub max_txs_per_block: usize,
    /// Commit a block even when nothing is pending.
    pub produce_empty_blocks: bool,
    pub block_period: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_txs_per_block: DEFAULT_MAX_TXS_PER_BLOCK,
            produce_empty_blocks: false,
            block_period: DEFAULT_BLOCK_PERIOD,
        }
    }
}

pub struct Generator {
    ledger: Arc<Ledger>,
    signer: BlockSigner,
    config: GeneratorConfig,
}

impl Generator {
    /// Attach a generator to `ledger`, committing a genesis block over
    /// `initial` if the ledger has none yet.
    ///
    /// Fails with [`GeneratorError::NotAuthority`] when the ledger is
    /// configured with a different block authority than `signer`.
    pub fn bootstrap(
        ledger: Arc<Ledger>,
        signer: BlockSigner,
        initial: &StateSnapshot,
        time_ms: u64,
        config: GeneratorConfig,
    ) -> Result<Self, GeneratorError> {
        if let Some(authority) = &ledger.config().block_authority {
            if *authority != signer.public_key() {
                return Err(GeneratorError::NotAuthority);
            }
        }

        if ledger.current_height()?.is_none() {
            let genesis = new_genesis_block(initial, time_ms);
            ledger.commit_block(&genesis, initial)?;
            info!(
                hash = %genesis.hash(),
                utxos = initial.len(),
                "genesis block committed"
            );
        }

        Ok(Self {
            ledger,
            signer,
            config,
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn authority(&self) -> PublicKey {
        self.signer.public_key()
    }

    /// Propose and commit one block stamped `time_ms`. Returns the committed
    /// block, or `None` if nothing was pending and empty blocks are off.
    pub fn make_block_at(&self, time_ms: u64) -> Result<Option<Block>, GeneratorError> {
        let Some(proposal) = self.propose(time_ms)? else {
            return Ok(None);
        };
        self.commit(&proposal)?;
        Ok(Some(proposal.block))
    }

    /// [`make_block_at`](Self::make_block_at) with the current wall clock.
    pub fn make_block(&self) -> Result<Option<Block>, GeneratorError> {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        self.make_block_at(now)
    }

    /// Produce blocks every `block_period` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            authority = %self.signer.public_key(),
            period_ms = self.config.block_period.as_millis() as u64,
            "block generator starting"
        );

        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }

            // Store locks and retry backoff block the thread.
            let round = tokio::task::spawn_blocking({
                let generator = Arc::clone(&self);
                move || generator.make_block()
            })
            .await;
            match round {
                Ok(Ok(Some(block))) => debug!(height = block.height(), "round produced a block"),
                Ok(Ok(None)) => debug!("nothing pending, skipping round"),
                Ok(Err(e)) => warn!(error = %e, "block round failed"),
                Err(e) => {
                    warn!(error = %e, "block round task failed, stopping");
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.block_period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("block generator stopped");
    }
}

impl BlockProposer for Generator {
    fn propose(&self, time_ms: u64) -> Result<Option<Proposal>, GeneratorError> {
        let tip = self.ledger.tip()?.ok_or(GeneratorError::NoGenesis)?;
        let prior = self.ledger.confirmed_state()?;
        let pending = self
            .ledger
            .pending_transactions(self.config.max_txs_per_block)?;

        if pending.is_empty() && !self.config.produce_empty_blocks {
            return Ok(None);
        }

        let mut post = prior.clone();
        let mut included = Vec::with_capacity(pending.len());
        for tx in pending {
            match post.apply(&tx) {
                Ok(()) => included.push(tx),
                Err(e) => warn!(tx_id = %tx.hash(), error = %e, "dropping pending transaction"),
            }
        }

        let mut block = Block::new(
            &tip,
            included,
            post.root(),
            time_ms.max(tip.timestamp),
            Some(self.signer.public_key()),
        );
        self.signer.sign(&mut block)?;

        debug!(
            height = block.height(),
            tx_count = block.tx_count(),
            "block proposed"
        );
        Ok(Some(Proposal { block, prior }))
    }
}

impl BlockCommitter for Generator {
    fn commit(&self, proposal: &Proposal) -> Result<StateSnapshot, BlockError> {
        self.ledger.commit_block(&proposal.block, &proposal.prior)
    }
}
