// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strata Protocol: Core Library
//!
//! Transaction construction and settlement for a UTXO ledger with
//! quorum-controlled accounts and assets.
//!
//! A transaction goes through four hands before it is part of the ledger:
//!
//! ```text
//! Actions ──► TemplateBuilder ──► sign_template ──► finalize ──► Ledger
//!  (intent)     (draft, balanced)   (quorum slots)   (atomic commit)
//!                                                        │
//!                                   Generator ──► commit_block (height++)
//! ```
//!
//! ## Modules
//!
//! - **crypto**: Ed25519 keys, BLAKE3 hashing, Merkle roots.
//! - **identity**: Accounts, assets, signing policies, control programs,
//!   and the key service interface.
//! - **transaction**: Actions, templates, the builder, the signer and the
//!   finalizer.
//! - **storage**: Ledger state, blocks, the store interface and the
//!   in-memory store.
//! - **consensus**: The single-authority block generator.
//! - **config**: Hash domains, limits and runtime defaults.
//!
//! ## Ground Rules
//!
//! 1. Identities are content hashes. Nothing is numbered by a counter.
//! 2. Library code returns errors; it does not panic on caller input.
//! 3. A failed finalize or block commit leaves the ledger untouched.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod identity;
pub mod storage;
pub mod transaction;
