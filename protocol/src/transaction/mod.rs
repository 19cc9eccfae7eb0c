//! # Transaction Module
//!
//! The build, sign and finalize pipeline.
//!
//! ```text
//! types.rs       : AssetId, AssetAmount, Outpoint, Output, ReferenceData
//! action.rs      : Issue / Spend / Control intents
//! template.rs    : Template, Input, canonical encoding, sighash
//! builder.rs     : TemplateBuilder: actions -> unsigned template
//! signing.rs     : fill signature slots from keypairs or a key service
//! verification.rs: quorum, signature and spend checks
//! finalize.rs    : seal / finalize, the immutable Transaction
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: [`TemplateBuilder::build`] turns actions into a template
//!    with one empty signature slot per policy key.
//! 2. **Sign**: [`sign_template`] or [`sign_template_with`] fill the slots
//!    they hold keys for. Any number of parties can sign, in any order.
//! 3. **Finalize**: [`finalize`] checks quorum coverage and per-asset
//!    balance, then commits against the ledger, atomically rejecting
//!    double spends.

pub mod action;
pub mod builder;
pub mod finalize;
pub mod signing;
pub mod template;
pub mod types;
pub mod verification;

pub use action::Action;
pub use builder::{BuildError, TemplateBuilder};
pub use finalize::{finalize, seal, FinalizeError, Transaction};
pub use signing::{sign_template, sign_template_with};
pub use template::{sighash, Input, InputSource, Template};
pub use types::{AssetAmount, AssetId, Outpoint, Output, ReferenceData};
pub use verification::{verify_balance, verify_inputs, verify_spend, verify_transaction};
