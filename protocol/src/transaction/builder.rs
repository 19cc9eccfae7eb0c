//! Template construction from actions.
//!
//! [`TemplateBuilder`] walks the caller's actions in order and produces an
//! unsigned [`Template`]:
//!
//! - `Issue` appends an issuance input carrying the asset's policy.
//! - `Spend` appends one input per consumed output, either the one the
//!   caller named or the smallest outpoints the account holds, and queues a
//!   change output for any surplus.
//! - `Control` appends an output under a freshly derived control program.
//!
//! Change outputs go after every caller-requested output, so "output 0" of
//! a template always means the first `Control` action. The builder does no
//! cryptography and never writes to the ledger; it only reads the current
//! unspent set once per build.

use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::debug;

use super::action::Action;
use super::template::{Input, InputSource, Template};
use super::types::{AssetAmount, AssetId, Outpoint, Output, ReferenceData};
use super::verification::asset_flows;
use crate::config::{MAX_TEMPLATE_INPUTS, MAX_TEMPLATE_OUTPUTS};
use crate::identity::{AccountId, Registry, RegistryError};
use crate::storage::{Ledger, StoreError};

/// Reasons a list of actions cannot become a template.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("action {index} ({kind}) has a zero amount")]
    UnbalancedAction { index: usize, kind: &'static str },

    #[error("asset {asset_id} does not balance: inputs {inputs}, outputs {outputs}")]
    ImbalancedAssetFlow {
        asset_id: AssetId,
        inputs: u64,
        outputs: u64,
    },

    #[error("account {account} holds {available} of {asset_id}, {requested} requested")]
    InsufficientFunds {
        account: AccountId,
        asset_id: AssetId,
        requested: u64,
        available: u64,
    },

    #[error("output {outpoint} is not unspent")]
    OutputNotFound { outpoint: Outpoint },

    #[error("output {outpoint} does not hold that asset or is not controlled by the account")]
    OutputMismatch { outpoint: Outpoint },

    #[error("output {outpoint} is spent twice in one template")]
    OutpointReused { outpoint: Outpoint },

    #[error("amount overflow summing {asset_id}")]
    AmountOverflow { asset_id: AssetId },

    #[error("template has {0} inputs, more than the allowed maximum")]
    TooManyInputs(usize),

    #[error("template has {0} outputs, more than the allowed maximum")]
    TooManyOutputs(usize),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("ledger read failed: {0}")]
    Store(#[from] StoreError),
}

/// Compiles actions into a template against a registry and a ledger view.
pub struct TemplateBuilder<'a> {
    registry: &'a Registry,
    ledger: &'a Ledger,
    reference_data: ReferenceData,
}

/// Mutable state of one build.
struct Draft {
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    change: Vec<Output>,
    reserved: HashSet<Outpoint>,
}

impl<'a> TemplateBuilder<'a> {
    pub fn new(registry: &'a Registry, ledger: &'a Ledger) -> Self {
        Self {
            registry,
            ledger,
            reference_data: ReferenceData::empty(),
        }
    }

    /// Template-level reference data, carried into the transaction.
    pub fn reference_data(mut self, data: ReferenceData) -> Self {
        self.reference_data = data;
        self
    }

    /// Build a template from `actions`, preserving their order.
    pub fn build(&self, actions: &[Action]) -> Result<Template, BuildError> {
        let mut draft = Draft {
            inputs: Vec::new(),
            outputs: Vec::new(),
            change: Vec::new(),
            reserved: HashSet::new(),
        };

        let needs_ledger = actions.iter().any(|a| matches!(a, Action::Spend { .. }));
        let unspent: BTreeMap<Outpoint, Output> = if needs_ledger {
            self.ledger.unspent_outputs()?.into_iter().collect()
        } else {
            BTreeMap::new()
        };

        for (index, action) in actions.iter().enumerate() {
            if action.is_source() && action.asset_amount().is_zero() {
                return Err(BuildError::UnbalancedAction {
                    index,
                    kind: action.kind(),
                });
            }

            match action {
                Action::Issue {
                    asset_amount,
                    reference_data,
                } => {
                    let asset = self.registry.asset(&asset_amount.asset_id)?;
                    draft.inputs.push(Input::new(
                        InputSource::Issuance {
                            genesis_hash: asset.genesis_hash,
                            definition_hash: asset.definition_hash,
                        },
                        *asset_amount,
                        asset.policy,
                        reference_data.clone(),
                    ));
                }
                Action::Spend {
                    asset_amount,
                    account_id,
                    outpoint,
                    reference_data,
                } => {
                    self.add_spend(
                        &mut draft,
                        &unspent,
                        asset_amount,
                        account_id,
                        *outpoint,
                        reference_data,
                    )?;
                }
                Action::Control {
                    asset_amount,
                    account_id,
                    reference_data,
                } => {
                    let program = self.registry.derive_control_program(account_id)?;
                    draft
                        .outputs
                        .push(Output::new(*asset_amount, program, reference_data.clone()));
                }
            }
        }

        let Draft {
            inputs,
            mut outputs,
            change,
            ..
        } = draft;
        outputs.extend(change);

        if inputs.len() > MAX_TEMPLATE_INPUTS {
            return Err(BuildError::TooManyInputs(inputs.len()));
        }
        if outputs.len() > MAX_TEMPLATE_OUTPUTS {
            return Err(BuildError::TooManyOutputs(outputs.len()));
        }
        check_balance(&inputs, &outputs)?;

        debug!(
            actions = actions.len(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            "template built"
        );

        Ok(Template::new(inputs, outputs, self.reference_data.clone()))
    }

    fn add_spend(
        &self,
        draft: &mut Draft,
        unspent: &BTreeMap<Outpoint, Output>,
        asset_amount: &AssetAmount,
        account_id: &AccountId,
        outpoint: Option<Outpoint>,
        reference_data: &ReferenceData,
    ) -> Result<(), BuildError> {
        let policy = self.registry.account(account_id)?.policy;

        let selected: Vec<(Outpoint, u64)> = match outpoint {
            Some(outpoint) => {
                let output = unspent
                    .get(&outpoint)
                    .ok_or(BuildError::OutputNotFound { outpoint })?;
                if output.asset_amount.asset_id != asset_amount.asset_id
                    || !output.control_program.is_satisfied_by(&policy)
                {
                    return Err(BuildError::OutputMismatch { outpoint });
                }
                if draft.reserved.contains(&outpoint) {
                    return Err(BuildError::OutpointReused { outpoint });
                }
                if output.asset_amount.amount < asset_amount.amount {
                    return Err(BuildError::InsufficientFunds {
                        account: account_id.clone(),
                        asset_id: asset_amount.asset_id,
                        requested: asset_amount.amount,
                        available: output.asset_amount.amount,
                    });
                }
                vec![(outpoint, output.asset_amount.amount)]
            }
            None => self.select(unspent, &draft.reserved, asset_amount, account_id)?,
        };

        let mut covered: u64 = 0;
        for (outpoint, amount) in selected {
            draft.reserved.insert(outpoint);
            covered = covered
                .checked_add(amount)
                .ok_or(BuildError::AmountOverflow {
                    asset_id: asset_amount.asset_id,
                })?;
            draft.inputs.push(Input::new(
                InputSource::Spend { outpoint },
                AssetAmount::new(asset_amount.asset_id, amount),
                policy.clone(),
                reference_data.clone(),
            ));
        }

        let surplus = covered - asset_amount.amount;
        if surplus > 0 {
            let program = self.registry.derive_control_program(account_id)?;
            draft.change.push(Output::new(
                AssetAmount::new(asset_amount.asset_id, surplus),
                program,
                ReferenceData::empty(),
            ));
        }
        Ok(())
    }

    /// Smallest-outpoint-first selection over the account's unreserved
    /// outputs of the requested asset.
    fn select(
        &self,
        unspent: &BTreeMap<Outpoint, Output>,
        reserved: &HashSet<Outpoint>,
        asset_amount: &AssetAmount,
        account_id: &AccountId,
    ) -> Result<Vec<(Outpoint, u64)>, BuildError> {
        let mut selected = Vec::new();
        let mut total: u64 = 0;

        for (outpoint, output) in unspent {
            if total >= asset_amount.amount {
                break;
            }
            if output.asset_amount.asset_id != asset_amount.asset_id
                || reserved.contains(outpoint)
            {
                continue;
            }
            if self.registry.program_owner(&output.control_program).as_ref() != Some(account_id) {
                continue;
            }
            total = total.saturating_add(output.asset_amount.amount);
            selected.push((*outpoint, output.asset_amount.amount));
        }

        if total < asset_amount.amount {
            return Err(BuildError::InsufficientFunds {
                account: account_id.clone(),
                asset_id: asset_amount.asset_id,
                requested: asset_amount.amount,
                available: total,
            });
        }
        Ok(selected)
    }
}

/// Per-asset input sum must equal per-asset output sum. Assets are checked
/// in ID order so the reported asset is deterministic.
fn check_balance(inputs: &[Input], outputs: &[Output]) -> Result<(), BuildError> {
    let flows = asset_flows(inputs, outputs)
        .map_err(|asset_id| BuildError::AmountOverflow { asset_id })?;
    for (asset_id, (inputs, outputs)) in flows {
        if inputs != outputs {
            return Err(BuildError::ImbalancedAssetFlow {
                asset_id,
                inputs,
                outputs,
            });
        }
    }
    Ok(())
}
