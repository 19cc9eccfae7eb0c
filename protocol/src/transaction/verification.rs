//! Authorization and balance checks shared by the builder, the finalizer
//! and block validation.
//!
//! The checks are ordered from cheapest to most expensive: slot counts and
//! quorum arithmetic first, then hash recomputation, then Ed25519
//! verification of every filled slot.

use super::finalize::{FinalizeError, Transaction};
use super::template::{compute_tx_hash, compute_witness_hash, sighash, Input, InputSource};
use super::types::{AssetId, Output};
use crate::crypto::Hash;
use std::collections::BTreeMap;
use crate::identity::compute_asset_id;

/// Check that every input is authorized under its own policy for the
/// transaction identified by `tx_hash`.
///
/// - the slot array matches the policy's key count,
/// - at least `quorum` slots are filled,
/// - every filled slot is a valid signature by its key over the input's
///   sighash,
/// - issuance inputs reproduce the asset ID they claim to issue.
pub fn verify_inputs(tx_hash: &Hash, inputs: &[Input]) -> Result<(), FinalizeError> {
    if inputs.is_empty() {
        return Err(FinalizeError::NoInputs);
    }

    for (input_index, input) in inputs.iter().enumerate() {
        let policy = input.policy();
        if input.signatures().len() != policy.keys().len() {
            return Err(FinalizeError::MalformedWitness { input_index });
        }

        let have = input.filled_count();
        let need = policy.quorum() as usize;
        if have < need {
            return Err(FinalizeError::IncompleteSignatures {
                input_index,
                have,
                need,
            });
        }
    }

    for (input_index, input) in inputs.iter().enumerate() {
        if let InputSource::Issuance {
            genesis_hash,
            definition_hash,
        } = input.source()
        {
            let expected = compute_asset_id(input.policy(), definition_hash, genesis_hash);
            if expected != input.asset_amount().asset_id {
                return Err(FinalizeError::ProgramMismatch { input_index });
            }
        }

        let message = sighash(tx_hash, input_index);
        for (key_index, (key, slot)) in input
            .policy()
            .keys()
            .iter()
            .zip(input.signatures())
            .enumerate()
        {
            if let Some(sig) = slot {
                if !key.verify(message.as_bytes(), sig) {
                    return Err(FinalizeError::InvalidSignature {
                        input_index,
                        key_index,
                    });
                }
            }
        }
    }

    Ok(())
}

/// Per-asset `(input sum, output sum)`, in asset ID order. Fails with the
/// asset whose sum overflows.
pub(crate) fn asset_flows(
    inputs: &[Input],
    outputs: &[Output],
) -> Result<BTreeMap<AssetId, (u64, u64)>, AssetId> {
    let mut flows: BTreeMap<AssetId, (u64, u64)> = BTreeMap::new();
    for amount in inputs.iter().map(Input::asset_amount) {
        let entry = flows.entry(amount.asset_id).or_default();
        entry.0 = entry.0.checked_add(amount.amount).ok_or(amount.asset_id)?;
    }
    for amount in outputs.iter().map(|o| &o.asset_amount) {
        let entry = flows.entry(amount.asset_id).or_default();
        entry.1 = entry.1.checked_add(amount.amount).ok_or(amount.asset_id)?;
    }
    Ok(flows)
}

/// Value is conserved per asset: what the inputs bring in, the outputs
/// carry out, no more and no less.
pub fn verify_balance(inputs: &[Input], outputs: &[Output]) -> Result<(), FinalizeError> {
    let flows = asset_flows(inputs, outputs)
        .map_err(|asset_id| FinalizeError::AmountOverflow { asset_id })?;
    for (asset_id, (inputs, outputs)) in flows {
        if inputs != outputs {
            return Err(FinalizeError::ImbalancedAssetFlow {
                asset_id,
                inputs,
                outputs,
            });
        }
    }
    Ok(())
}

/// Check a spend input against the output it consumes: same asset and
/// amount, and the input's policy satisfies the output's control program.
pub fn verify_spend(
    input_index: usize,
    input: &Input,
    spent: &Output,
) -> Result<(), FinalizeError> {
    if spent.asset_amount != *input.asset_amount()
        || !spent.control_program.is_satisfied_by(input.policy())
    {
        return Err(FinalizeError::ProgramMismatch { input_index });
    }
    Ok(())
}

/// Full self-contained check of a transaction received from elsewhere:
/// both hashes recompute, every input is authorized and value balances.
pub fn verify_transaction(tx: &Transaction) -> Result<(), FinalizeError> {
    let hash = compute_tx_hash(tx.inputs(), tx.outputs(), tx.reference_data());
    if hash != tx.hash() {
        return Err(FinalizeError::HashMismatch {
            claimed: tx.hash(),
            computed: hash,
        });
    }
    let witness = compute_witness_hash(tx.inputs(), tx.outputs(), tx.reference_data());
    if witness != tx.witness_hash() {
        return Err(FinalizeError::HashMismatch {
            claimed: tx.witness_hash(),
            computed: witness,
        });
    }
    verify_inputs(&hash, tx.inputs())?;
    verify_balance(tx.inputs(), tx.outputs())
}
