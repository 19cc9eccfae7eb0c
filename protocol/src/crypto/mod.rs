//! # Cryptographic Primitives
//!
//! Thin, typed wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for input and block signatures.
//! - **BLAKE3** for every content hash, domain-separated per object kind.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, domain_separated_hash, merkle_root, Hash};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
