//! # Protocol Configuration & Constants
//!
//! Every magic number in Strata lives here: hash domain tags, encoding
//! versions, template limits, and the tunables for the ledger and the
//! block generator.
//!
//! The domain tags and encoding versions are identity-critical. Changing any
//! of them changes every transaction hash, asset ID and control program
//! derived after the change.

use std::time::Duration;

use crate::crypto::PublicKey;

// ---------------------------------------------------------------------------
// Hash Domains
// ---------------------------------------------------------------------------

/// Transaction identity (canonical body without signature material).
pub const DOMAIN_TX_ID: &str = "strata 2026 transaction id v1";

/// Transaction witness hash (canonical body including filled signature slots).
pub const DOMAIN_TX_WITNESS: &str = "strata 2026 transaction witness v1";

/// Per-input signature message.
pub const DOMAIN_SIGHASH: &str = "strata 2026 input sighash v1";

/// Asset identity derived from the issuance policy.
pub const DOMAIN_ASSET_ID: &str = "strata 2026 asset id v1";

/// Commitment to a (keys, quorum) signing policy.
pub const DOMAIN_POLICY: &str = "strata 2026 signing policy v1";

/// One-way derivation tag embedded in account control programs.
pub const DOMAIN_CONTROL_DERIVATION: &str = "strata 2026 control program derivation v1";

/// Block header hash.
pub const DOMAIN_BLOCK: &str = "strata 2026 block header v1";

/// State-tree leaf (one unspent output).
pub const DOMAIN_STATE_LEAF: &str = "strata 2026 state leaf v1";

/// Merkle tree leaf.
pub const DOMAIN_MERKLE_LEAF: &str = "strata 2026 merkle leaf v1";

/// Merkle tree interior node.
pub const DOMAIN_MERKLE_NODE: &str = "strata 2026 merkle node v1";

// ---------------------------------------------------------------------------
// Encoding Versions
// ---------------------------------------------------------------------------

/// Version prefix of the canonical transaction encoding.
pub const TX_VERSION: u16 = 1;

/// First byte of every control program produced by the registry.
pub const CONTROL_PROGRAM_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Template Limits
// ---------------------------------------------------------------------------

/// Maximum number of inputs a single template may carry.
pub const MAX_TEMPLATE_INPUTS: usize = 256;

/// Maximum number of outputs a single template may carry.
pub const MAX_TEMPLATE_OUTPUTS: usize = 256;

/// Maximum number of keys in one signing policy.
pub const MAX_POLICY_KEYS: usize = 32;

// ---------------------------------------------------------------------------
// Ledger & Generator Defaults
// ---------------------------------------------------------------------------

/// How long a ledger commit waits for the store lock before reporting
/// transient contention.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Attempts made on transient contention before giving up.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;

/// Linear backoff step between retries.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Target time between generator blocks.
pub const DEFAULT_BLOCK_PERIOD: Duration = Duration::from_secs(1);

/// Upper bound on transactions the generator packs into one block.
pub const DEFAULT_MAX_TXS_PER_BLOCK: usize = 10_000;

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Bounded optimistic retry for transient store contention.
///
/// Only contention is retried. Semantic conflicts such as a double spend
/// are returned to the caller immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Sleep between attempt `n` and `n + 1` is `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Settings for a [`crate::storage::Ledger`].
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Retry policy for store contention on transaction and block commits.
    pub retry: RetryPolicy,

    /// When set, every non-genesis block must carry a valid signature from
    /// this key. This is the single-authority rule of the bootstrap.
    pub block_authority: Option<PublicKey>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            block_authority: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_are_distinct() {
        let domains = [
            DOMAIN_TX_ID,
            DOMAIN_TX_WITNESS,
            DOMAIN_SIGHASH,
            DOMAIN_ASSET_ID,
            DOMAIN_POLICY,
            DOMAIN_CONTROL_DERIVATION,
            DOMAIN_BLOCK,
            DOMAIN_STATE_LEAF,
            DOMAIN_MERKLE_LEAF,
            DOMAIN_MERKLE_NODE,
        ];
        for (i, a) in domains.iter().enumerate() {
            for b in &domains[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn retry_policy_backoff_is_linear() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(5),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(5));
        assert_eq!(policy.delay_after(3), Duration::from_millis(15));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            backoff: Duration::ZERO,
        };
        assert_eq!(policy.attempts(), 1);
        assert_eq!(RetryPolicy::no_retry().attempts(), 1);
    }

    #[test]
    fn defaults_are_sane() {
        assert!(DEFAULT_RETRY_ATTEMPTS > 1);
        assert!(DEFAULT_BLOCK_PERIOD > DEFAULT_LOCK_TIMEOUT);
        assert!(MAX_TEMPLATE_INPUTS > 0 && MAX_TEMPLATE_OUTPUTS > 0);
    }
}
