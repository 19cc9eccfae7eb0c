//! # Identity Registry
//!
//! Accounts and assets, each guarded by a [`SigningPolicy`].
//!
//! - An **account** gets an opaque random ID and can derive any number of
//!   control programs. The registry privately remembers which account each
//!   program came from so the builder can find an account's unspent outputs;
//!   the program bytes themselves do not reveal it.
//! - An **asset** gets a content-addressed ID computed from its issuance
//!   policy, its definition and a genesis hash. Registering the same triple
//!   twice yields the same ID.
//!
//! Every creation happens under one write lock, so other callers never see a
//! half-registered record (for example an alias pointing at nothing).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::policy::{ControlProgram, PolicyError, SigningPolicy};
use crate::config::{DOMAIN_ASSET_ID, DOMAIN_CONTROL_DERIVATION};
use crate::crypto::{blake3_hash, domain_separated_hash, Hash, PublicKey};
use crate::transaction::types::{AssetId, ReferenceData};

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid signing policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("no record with alias {0:?}")]
    AliasNotFound(String),

    #[error("alias {0:?} is already taken")]
    DuplicateAlias(String),
}

impl RegistryError {
    /// True for the unknown-reference family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound(_) | Self::AssetNotFound(_) | Self::AliasNotFound(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Opaque account identifier, `acc_<uuid>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    fn generate() -> Self {
        Self(format!("acc_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub alias: Option<String>,
    pub policy: SigningPolicy,
}

/// A registered asset. `genesis_hash` and `definition_hash` travel on every
/// issuance input so a verifier can recompute the ID without the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: AssetId,
    pub alias: Option<String>,
    pub policy: SigningPolicy,
    pub definition: ReferenceData,
    pub definition_hash: Hash,
    pub genesis_hash: Hash,
}

/// `H(asset id domain, genesis_hash || policy commitment || definition_hash)`.
pub fn compute_asset_id(
    policy: &SigningPolicy,
    definition_hash: &Hash,
    genesis_hash: &Hash,
) -> AssetId {
    let mut preimage = Vec::with_capacity(96);
    preimage.extend_from_slice(genesis_hash.as_bytes());
    preimage.extend_from_slice(policy.commitment().as_bytes());
    preimage.extend_from_slice(definition_hash.as_bytes());
    AssetId(domain_separated_hash(DOMAIN_ASSET_ID, &preimage))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RegistryState {
    accounts: HashMap<AccountId, Account>,
    assets: HashMap<AssetId, Asset>,
    account_aliases: HashMap<String, AccountId>,
    asset_aliases: HashMap<String, AssetId>,
    program_owners: HashMap<ControlProgram, AccountId>,
    next_derivation: HashMap<AccountId, u64>,
}

/// Thread-safe store of accounts and assets.
#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
    default_keys: Option<Vec<PublicKey>>,
}

impl Registry {
    /// A registry that requires explicit keys on every creation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that substitutes `keys` when a creation call passes an
    /// empty key list. Meant for test harnesses; quorum is still required.
    pub fn with_default_keys(keys: Vec<PublicKey>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            default_keys: Some(keys),
        }
    }

    fn resolve_policy(
        &self,
        keys: Vec<PublicKey>,
        quorum: u32,
    ) -> Result<SigningPolicy, PolicyError> {
        let keys = match (&self.default_keys, keys.is_empty()) {
            (Some(defaults), true) => defaults.clone(),
            _ => keys,
        };
        SigningPolicy::new(keys, quorum)
    }

    /// Register a new account guarded by `quorum` of `keys`.
    pub fn create_account(
        &self,
        keys: Vec<PublicKey>,
        quorum: u32,
        alias: Option<&str>,
    ) -> Result<AccountId, RegistryError> {
        let policy = self.resolve_policy(keys, quorum)?;

        let mut state = self.state.write();
        if let Some(alias) = alias {
            if state.account_aliases.contains_key(alias) {
                return Err(RegistryError::DuplicateAlias(alias.to_string()));
            }
        }

        let id = AccountId::generate();
        if let Some(alias) = alias {
            state.account_aliases.insert(alias.to_string(), id.clone());
        }
        state.accounts.insert(
            id.clone(),
            Account {
                id: id.clone(),
                alias: alias.map(str::to_string),
                policy,
            },
        );

        debug!(account = %id, alias = ?alias, "account created");
        Ok(id)
    }

    /// Register an asset and return its content-addressed ID.
    ///
    /// If an asset with the same policy, definition and genesis hash already
    /// exists its ID is returned and the stored record is left untouched.
    pub fn create_asset(
        &self,
        keys: Vec<PublicKey>,
        quorum: u32,
        definition: ReferenceData,
        genesis_hash: Hash,
        alias: Option<&str>,
    ) -> Result<AssetId, RegistryError> {
        let policy = self.resolve_policy(keys, quorum)?;
        let definition_hash = blake3_hash(definition.as_bytes());
        let id = compute_asset_id(&policy, &definition_hash, &genesis_hash);

        let mut state = self.state.write();
        if state.assets.contains_key(&id) {
            return Ok(id);
        }
        if let Some(alias) = alias {
            if state.asset_aliases.contains_key(alias) {
                return Err(RegistryError::DuplicateAlias(alias.to_string()));
            }
            state.asset_aliases.insert(alias.to_string(), id);
        }
        state.assets.insert(
            id,
            Asset {
                id,
                alias: alias.map(str::to_string),
                policy,
                definition,
                definition_hash,
                genesis_hash,
            },
        );

        debug!(asset = %id, alias = ?alias, "asset created");
        Ok(id)
    }

    /// Derive a fresh control program for `account_id`.
    ///
    /// Each call returns a different program; all of them are satisfied by
    /// the account's policy.
    pub fn derive_control_program(
        &self,
        account_id: &AccountId,
    ) -> Result<ControlProgram, RegistryError> {
        let mut state = self.state.write();
        let policy = state
            .accounts
            .get(account_id)
            .map(|account| account.policy.clone())
            .ok_or_else(|| RegistryError::AccountNotFound(account_id.clone()))?;

        let counter = state.next_derivation.entry(account_id.clone()).or_insert(0);
        let index = *counter;
        *counter += 1;

        let mut preimage = Vec::with_capacity(account_id.as_str().len() + 8);
        preimage.extend_from_slice(account_id.as_str().as_bytes());
        preimage.extend_from_slice(&index.to_le_bytes());
        let tag = domain_separated_hash(DOMAIN_CONTROL_DERIVATION, &preimage);

        let program = ControlProgram::new(&policy, &tag);
        state
            .program_owners
            .insert(program.clone(), account_id.clone());
        Ok(program)
    }

    pub fn account(&self, id: &AccountId) -> Result<Account, RegistryError> {
        self.state
            .read()
            .accounts
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::AccountNotFound(id.clone()))
    }

    pub fn asset(&self, id: &AssetId) -> Result<Asset, RegistryError> {
        self.state
            .read()
            .assets
            .get(id)
            .cloned()
            .ok_or(RegistryError::AssetNotFound(*id))
    }

    pub fn account_by_alias(&self, alias: &str) -> Result<Account, RegistryError> {
        let state = self.state.read();
        state
            .account_aliases
            .get(alias)
            .and_then(|id| state.accounts.get(id))
            .cloned()
            .ok_or_else(|| RegistryError::AliasNotFound(alias.to_string()))
    }

    pub fn asset_by_alias(&self, alias: &str) -> Result<Asset, RegistryError> {
        let state = self.state.read();
        state
            .asset_aliases
            .get(alias)
            .and_then(|id| state.assets.get(id))
            .cloned()
            .ok_or_else(|| RegistryError::AliasNotFound(alias.to_string()))
    }

    /// Account that derived `program`, if it came from this registry.
    pub(crate) fn program_owner(&self, program: &ControlProgram) -> Option<AccountId> {
        self.state.read().program_owners.get(program).cloned()
    }

    pub fn account_count(&self) -> usize {
        self.state.read().accounts.len()
    }

    pub fn asset_count(&self) -> usize {
        self.state.read().assets.len()
    }
}
