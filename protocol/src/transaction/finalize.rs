//! Finalization: from a signed template to a committed transaction.
//!
//! ```text
//! seal(template)            quorum per input, signature validity,
//!                           issuance asset IDs, per-asset balance,
//!                           content hashes
//! finalize(ledger, template) = seal
//!                           + spent outputs still unspent and owned
//!                           + atomic check-and-commit in the ledger
//! ```
//!
//! Nothing in `seal` touches the ledger, and a failed `finalize` leaves the
//! ledger exactly as it was. The template is only borrowed, so a caller who
//! hits `IncompleteSignatures` can collect more signatures and try again
//! with the same template.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::template::{Input, Template};
use super::types::{AssetId, Outpoint, Output, ReferenceData};
use super::verification::{verify_balance, verify_inputs, verify_spend};
use crate::crypto::Hash;
use crate::storage::{Ledger, StoreError};

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("transaction has no inputs")]
    NoInputs,

    #[error("input {input_index} has {have} of {need} required signatures")]
    IncompleteSignatures {
        input_index: usize,
        have: usize,
        need: usize,
    },

    #[error("input {input_index}: signature slot {key_index} does not verify")]
    InvalidSignature { input_index: usize, key_index: usize },

    #[error("input {input_index}: signature slots do not match the policy")]
    MalformedWitness { input_index: usize },

    #[error("input {input_index} is not authorized to spend or issue that value")]
    ProgramMismatch { input_index: usize },

    #[error("asset {asset_id}: inputs {inputs} != outputs {outputs}")]
    ImbalancedAssetFlow {
        asset_id: AssetId,
        inputs: u64,
        outputs: u64,
    },

    #[error("asset {asset_id}: amount sum overflows")]
    AmountOverflow { asset_id: AssetId },

    #[error("hash mismatch: claimed {claimed}, computed {computed}")]
    HashMismatch { claimed: Hash, computed: Hash },

    #[error("output {outpoint} is already spent")]
    DoubleSpend { outpoint: Outpoint },

    #[error("transaction {hash} is already committed")]
    DuplicateTransaction { hash: Hash },

    #[error("ledger still contended after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("ledger error: {0}")]
    Store(StoreError),
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A finalized, immutable transaction.
///
/// `hash` is the identity used in outpoints and excludes signatures;
/// `witness_hash` also covers every filled signature slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    hash: Hash,
    witness_hash: Hash,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    reference_data: ReferenceData,
}

impl Transaction {
    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn witness_hash(&self) -> Hash {
        self.witness_hash
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn reference_data(&self) -> &ReferenceData {
        &self.reference_data
    }

    /// Outpoints consumed by this transaction, in input order.
    pub fn spent_outpoints(&self) -> impl Iterator<Item = &Outpoint> {
        self.inputs.iter().filter_map(Input::outpoint)
    }

    /// Outputs created by this transaction, keyed by their new outpoints.
    pub fn created_outputs(&self) -> impl Iterator<Item = (Outpoint, &Output)> {
        let hash = self.hash;
        self.outputs
            .iter()
            .enumerate()
            .map(move |(i, output)| (Outpoint::new(hash, i as u32), output))
    }
}

// ---------------------------------------------------------------------------
// Seal / Finalize
// ---------------------------------------------------------------------------

/// Check signature coverage and value balance, and compute the
/// transaction's hashes.
pub fn seal(template: &Template) -> Result<Transaction, FinalizeError> {
    let hash = template.tx_hash();
    verify_inputs(&hash, template.inputs())?;
    verify_balance(template.inputs(), template.outputs())?;
    let witness_hash = template.witness_hash();

    let (inputs, outputs, reference_data) = template.clone().into_parts();
    Ok(Transaction {
        hash,
        witness_hash,
        inputs,
        outputs,
        reference_data,
    })
}

/// Seal `template` and commit it to `ledger`.
///
/// Two concurrent calls spending the same outpoint never both succeed; the
/// loser gets `DoubleSpend`.
pub fn finalize(ledger: &Ledger, template: &Template) -> Result<Transaction, FinalizeError> {
    let result = seal(template).and_then(|tx| {
        for (input_index, input) in tx.inputs().iter().enumerate() {
            let Some(outpoint) = input.outpoint() else {
                continue;
            };
            let spent = ledger
                .unspent_output(outpoint)
                .map_err(FinalizeError::Store)?
                .ok_or(FinalizeError::DoubleSpend { outpoint: *outpoint })?;
            verify_spend(input_index, input, &spent)?;
        }
        ledger.commit_transaction(&tx)?;
        Ok(tx)
    });

    match &result {
        Ok(tx) => info!(
            tx_id = %tx.hash(),
            inputs = tx.inputs().len(),
            outputs = tx.outputs().len(),
            "transaction finalized"
        ),
        Err(e) => warn!(error = %e, "finalize rejected"),
    }
    result
}
