//! # Hashing Utilities
//!
//! Every identity in Strata is content-addressed: transaction hashes, asset
//! IDs, policy commitments, block hashes and state roots are all BLAKE3
//! digests over a canonical byte encoding. Nothing is ever numbered from a
//! counter or drawn from an RNG, so the same inputs always give the same ID.
//!
//! Different kinds of object are hashed under different `derive_key`
//! contexts (see the `DOMAIN_*` constants in [`crate::config`]). A
//! transaction body and an asset definition that happen to share bytes can
//! never produce the same identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{DOMAIN_MERKLE_LEAF, DOMAIN_MERKLE_NODE};

/// A 32-byte BLAKE3 digest.
///
/// Ordering is lexicographic over the raw bytes, which is what the builder's
/// smallest-outpoint-first selection relies on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash. Used as the parent of the genesis block and as the
    /// root of an empty tree.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded representation. 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Hash(out))
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight bytes is plenty to tell hashes apart in test output.
        write!(f, "Hash({}..)", &self.to_hex()[..16])
    }
}

/// Compute the plain BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// `domain_separated_hash("a", data)` and `domain_separated_hash("b", data)`
/// never collide, because the context string selects a different IV.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    Hash(*hasher.finalize().as_bytes())
}

/// Hash multiple byte slices as if they had been concatenated.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(*hasher.finalize().as_bytes())
}

const PAIRED: u8 = 0;
const DUPLICATED: u8 = 1;

fn merkle_leaf(leaf: &Hash) -> Hash {
    domain_separated_hash(DOMAIN_MERKLE_LEAF, leaf.as_bytes())
}

fn merkle_node(tag: u8, left: &Hash, right: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new_derive_key(DOMAIN_MERKLE_NODE);
    hasher.update(&[tag]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash(*hasher.finalize().as_bytes())
}

/// Compute a binary Merkle root over a list of leaf hashes.
///
/// Leaves and interior nodes are hashed under separate domains. If a level
/// has an odd number of nodes, the last one is paired with itself, and that
/// node is tagged as a duplicate so `[a, b, c]` and `[a, b, c, c]` have
/// different roots. An empty list yields [`Hash::ZERO`]; a single leaf
/// still goes through one node hash, so the root is never a raw leaf.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }

    let mut level: Vec<Hash> = leaves.iter().map(merkle_leaf).collect();
    loop {
        level = level
            .chunks(2)
            .map(|pair| match pair.get(1) {
                Some(right) => merkle_node(PAIRED, &pair[0], right),
                None => merkle_node(DUPLICATED, &pair[0], &pair[0]),
            })
            .collect();
        if level.len() == 1 {
            return level[0];
        }
    }
}
