//! Signing policies and control programs.
//!
//! A [`SigningPolicy`] is an ordered set of public keys plus a quorum: "any
//! `quorum` of these `keys` may authorize". Accounts use one to guard their
//! outputs; assets use one to guard issuance.
//!
//! A [`ControlProgram`] is the predicate attached to an output. It commits
//! to the policy that may spend the output and carries a one-way derivation
//! tag, so one account can hand out any number of distinct programs and none
//! of them names the account.
//!
//! ```text
//! control program = version (1) || policy commitment (32) || derivation tag (32)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::config::{CONTROL_PROGRAM_VERSION, DOMAIN_POLICY, MAX_POLICY_KEYS};
use crate::crypto::{domain_separated_hash, Hash, PublicKey};

const CONTROL_PROGRAM_LEN: usize = 1 + 32 + 32;

/// Reasons a (keys, quorum) pair is not a usable policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("policy must contain at least one key")]
    NoKeys,

    #[error("quorum must be at least 1")]
    ZeroQuorum,

    #[error("quorum {quorum} exceeds key count {keys}")]
    QuorumExceedsKeys { quorum: u32, keys: usize },

    #[error("duplicate key {0} in policy")]
    DuplicateKey(PublicKey),

    #[error("policy has {0} keys, more than the allowed maximum")]
    TooManyKeys(usize),
}

// ---------------------------------------------------------------------------
// SigningPolicy
// ---------------------------------------------------------------------------

/// An m-of-n key policy. Immutable once constructed; `1 <= quorum <= keys`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningPolicy {
    keys: Vec<PublicKey>,
    quorum: u32,
}

impl SigningPolicy {
    /// Validate and construct a policy. Key order is preserved; it decides
    /// which signature slot belongs to which key.
    pub fn new(keys: Vec<PublicKey>, quorum: u32) -> Result<Self, PolicyError> {
        if keys.is_empty() {
            return Err(PolicyError::NoKeys);
        }
        if keys.len() > MAX_POLICY_KEYS {
            return Err(PolicyError::TooManyKeys(keys.len()));
        }
        if quorum == 0 {
            return Err(PolicyError::ZeroQuorum);
        }
        if quorum as usize > keys.len() {
            return Err(PolicyError::QuorumExceedsKeys {
                quorum,
                keys: keys.len(),
            });
        }

        let mut seen = BTreeSet::new();
        for key in &keys {
            if !seen.insert(*key) {
                return Err(PolicyError::DuplicateKey(*key));
            }
        }

        Ok(Self { keys, quorum })
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }

    pub fn quorum(&self) -> u32 {
        self.quorum
    }

    /// Position of `key` in the policy, i.e. the index of its signature slot.
    pub fn key_index(&self, key: &PublicKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Hash committing to the keys (in order) and the quorum.
    pub fn commitment(&self) -> Hash {
        let mut buf = Vec::with_capacity(8 + 32 * self.keys.len());
        self.encode_into(&mut buf);
        domain_separated_hash(DOMAIN_POLICY, &buf)
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.quorum.to_le_bytes());
        buf.extend_from_slice(&(self.keys.len() as u32).to_le_bytes());
        for key in &self.keys {
            buf.extend_from_slice(key.as_bytes());
        }
    }
}

// ---------------------------------------------------------------------------
// ControlProgram
// ---------------------------------------------------------------------------

/// Opaque spending predicate attached to an output.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlProgram(Vec<u8>);

impl ControlProgram {
    /// Build a program locking value to `policy`, distinguished from other
    /// programs of the same policy by `derivation_tag`.
    pub fn new(policy: &SigningPolicy, derivation_tag: &Hash) -> Self {
        let mut bytes = Vec::with_capacity(CONTROL_PROGRAM_LEN);
        bytes.push(CONTROL_PROGRAM_VERSION);
        bytes.extend_from_slice(policy.commitment().as_bytes());
        bytes.extend_from_slice(derivation_tag.as_bytes());
        Self(bytes)
    }

    /// Wrap raw program bytes received from elsewhere.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether an input authorized under `policy` may spend an output locked
    /// by this program. Unknown versions and malformed programs are never
    /// satisfiable.
    pub fn is_satisfied_by(&self, policy: &SigningPolicy) -> bool {
        self.0.len() == CONTROL_PROGRAM_LEN
            && self.0[0] == CONTROL_PROGRAM_VERSION
            && self.0[1..33] == policy.commitment().as_bytes()[..]
    }
}

impl fmt::Debug for ControlProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = hex::encode(&self.0);
        if hex_str.len() > 24 {
            write!(f, "ControlProgram({}..)", &hex_str[..24])
        } else {
            write!(f, "ControlProgram({})", hex_str)
        }
    }
}
