//! # Identity Module
//!
//! Who may move value, and under which rules.
//!
//! ```text
//! policy.rs    : SigningPolicy (keys + quorum) and ControlProgram
//! registry.rs  : Registry of accounts and assets, control-program derivation
//! keyservice.rs: KeyService trait and the in-memory MockHsm
//! ```
//!
//! Accounts and assets are both guarded by a [`SigningPolicy`]. Neither can
//! change its policy after creation; a new record is the only way to rotate
//! keys.

pub mod keyservice;
pub mod policy;
pub mod registry;

pub use keyservice::{KeyService, KeyServiceError, MockHsm};
pub use policy::{ControlProgram, PolicyError, SigningPolicy};
pub use registry::{compute_asset_id, Account, AccountId, Asset, Registry, RegistryError};
