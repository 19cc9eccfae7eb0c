//! Actions: what a caller wants a transaction to do.
//!
//! Actions are plain data with no signatures attached. The builder turns an
//! ordered list of them into a [`Template`](super::template::Template):
//! `Issue` and `Spend` become inputs, `Control` becomes an output, and
//! over-covering spends add a change output.

use serde::{Deserialize, Serialize};

use super::types::{AssetAmount, Outpoint, ReferenceData};
use crate::identity::{AccountId, Registry, RegistryError, SigningPolicy};

/// One intent in a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Create new units of an asset. Authorized by the asset's issuance policy.
    Issue {
        asset_amount: AssetAmount,
        reference_data: ReferenceData,
    },

    /// Consume value held by an account. Without an outpoint the builder
    /// picks the account's unspent outputs itself.
    Spend {
        asset_amount: AssetAmount,
        account_id: AccountId,
        outpoint: Option<Outpoint>,
        reference_data: ReferenceData,
    },

    /// Pay value to an account under a freshly derived control program.
    Control {
        asset_amount: AssetAmount,
        account_id: AccountId,
        reference_data: ReferenceData,
    },
}

impl Action {
    pub fn issue(asset_amount: AssetAmount) -> Self {
        Action::Issue {
            asset_amount,
            reference_data: ReferenceData::empty(),
        }
    }

    pub fn spend(asset_amount: AssetAmount, account_id: AccountId) -> Self {
        Action::Spend {
            asset_amount,
            account_id,
            outpoint: None,
            reference_data: ReferenceData::empty(),
        }
    }

    /// Spend a specific output. `asset_amount` is the amount to move; any
    /// remainder of the output comes back as change.
    pub fn spend_outpoint(
        asset_amount: AssetAmount,
        account_id: AccountId,
        outpoint: Outpoint,
    ) -> Self {
        Action::Spend {
            asset_amount,
            account_id,
            outpoint: Some(outpoint),
            reference_data: ReferenceData::empty(),
        }
    }

    pub fn control(asset_amount: AssetAmount, account_id: AccountId) -> Self {
        Action::Control {
            asset_amount,
            account_id,
            reference_data: ReferenceData::empty(),
        }
    }

    /// Replace the reference data carried by this action.
    pub fn with_reference_data(mut self, data: ReferenceData) -> Self {
        match &mut self {
            Action::Issue { reference_data, .. }
            | Action::Spend { reference_data, .. }
            | Action::Control { reference_data, .. } => *reference_data = data,
        }
        self
    }

    /// The asset amount this action contributes to the balance sheet.
    pub fn asset_amount(&self) -> &AssetAmount {
        match self {
            Action::Issue { asset_amount, .. }
            | Action::Spend { asset_amount, .. }
            | Action::Control { asset_amount, .. } => asset_amount,
        }
    }

    pub fn reference_data(&self) -> &ReferenceData {
        match self {
            Action::Issue { reference_data, .. }
            | Action::Spend { reference_data, .. }
            | Action::Control { reference_data, .. } => reference_data,
        }
    }

    /// True for actions that produce inputs.
    pub fn is_source(&self) -> bool {
        !matches!(self, Action::Control { .. })
    }

    /// Policy the inputs of this action must satisfy. `Control` produces no
    /// input and therefore requires none.
    pub fn required_policy(
        &self,
        registry: &Registry,
    ) -> Result<Option<SigningPolicy>, RegistryError> {
        match self {
            Action::Issue { asset_amount, .. } => {
                Ok(Some(registry.asset(&asset_amount.asset_id)?.policy))
            }
            Action::Spend { account_id, .. } => Ok(Some(registry.account(account_id)?.policy)),
            Action::Control { .. } => Ok(None),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Action::Issue { .. } => "issue",
            Action::Spend { .. } => "spend",
            Action::Control { .. } => "control",
        }
    }
}
