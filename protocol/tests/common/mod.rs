//! Shared fixtures for the integration tests.
//!
//! Every fixture that takes keys falls back to one fixed test key, and a
//! quorum of 0 means "all of the keys". That defaulting lives here only; the
//! registry itself rejects both.

#![allow(dead_code)]

use std::sync::Arc;

use strata_protocol::config::LedgerConfig;
use strata_protocol::consensus::{BlockSigner, Generator, GeneratorConfig, GeneratorError};
use strata_protocol::crypto::{Hash, Keypair, PublicKey};
use strata_protocol::identity::{AccountId, ControlProgram, KeyService, MockHsm, Registry};
use strata_protocol::storage::{Ledger, MemStore, StateSnapshot, Store};
use strata_protocol::transaction::{
    finalize, sign_template, Action, AssetAmount, AssetId, Outpoint, Output, ReferenceData,
    TemplateBuilder, Transaction,
};

/// The fixed key fixtures sign with.
pub fn test_keypair() -> Keypair {
    Keypair::from_seed(&[7u8; 32])
}

/// Everything a pipeline test needs: registry, ledger and the generator
/// that advances it.
pub struct Harness {
    pub registry: Registry,
    pub ledger: Arc<Ledger>,
    pub generator: Generator,
    pub hsm: Arc<MockHsm>,
}

impl Harness {
    pub fn new() -> Self {
        let (ledger, generator, hsm) =
            initialize_signing_generator(None, GeneratorConfig::default()).expect("generator");
        Self {
            registry: Registry::new(),
            ledger,
            generator,
            hsm,
        }
    }

    /// Block signer holding the ledger's authority key.
    pub fn block_signer(&self) -> BlockSigner {
        BlockSigner::with_service(self.hsm.clone(), self.generator.authority())
    }
}

/// Ledger with a single block authority held by a mock HSM, plus a
/// generator that has committed genesis over an empty state. `store` falls
/// back to a fresh [`MemStore`].
pub fn initialize_signing_generator(
    store: Option<Arc<dyn Store>>,
    config: GeneratorConfig,
) -> Result<(Arc<Ledger>, Generator, Arc<MockHsm>), GeneratorError> {
    let store = store.unwrap_or_else(|| Arc::new(MemStore::new()));
    let hsm = Arc::new(MockHsm::new());
    let authority = hsm.create_key()?;

    let ledger = Arc::new(Ledger::with_config(
        store,
        LedgerConfig {
            block_authority: Some(authority),
            ..LedgerConfig::default()
        },
    ));
    let signer = BlockSigner::with_service(hsm.clone(), authority);
    let generator = Generator::bootstrap(
        Arc::clone(&ledger),
        signer,
        &StateSnapshot::new(),
        0,
        config,
    )?;
    Ok((ledger, generator, hsm))
}

fn default_policy(keys: Option<Vec<PublicKey>>, quorum: u32) -> (Vec<PublicKey>, u32) {
    let keys = match keys {
        Some(keys) if !keys.is_empty() => keys,
        _ => vec![test_keypair().public_key()],
    };
    let quorum = if quorum == 0 { keys.len() as u32 } else { quorum };
    (keys, quorum)
}

pub fn create_account_fixture(
    registry: &Registry,
    keys: Option<Vec<PublicKey>>,
    quorum: u32,
    alias: Option<&str>,
) -> AccountId {
    let (keys, quorum) = default_policy(keys, quorum);
    registry
        .create_account(keys, quorum, alias)
        .expect("create account")
}

/// Asset with a zero genesis hash.
pub fn create_asset_fixture(
    registry: &Registry,
    keys: Option<Vec<PublicKey>>,
    quorum: u32,
    definition: ReferenceData,
    alias: Option<&str>,
) -> AssetId {
    let (keys, quorum) = default_policy(keys, quorum);
    registry
        .create_asset(keys, quorum, definition, Hash::ZERO, alias)
        .expect("create asset")
}

pub fn create_control_program_fixture(
    registry: &Registry,
    account: Option<&AccountId>,
) -> ControlProgram {
    let account = match account {
        Some(id) => id.clone(),
        None => create_account_fixture(registry, None, 0, None),
    };
    registry
        .derive_control_program(&account)
        .expect("derive control program")
}

/// Issue `amount` of `asset` to `account` (a fresh test account if `None`)
/// and return the new output.
pub fn issue_assets_fixture(
    h: &Harness,
    asset: AssetId,
    amount: u64,
    account: Option<AccountId>,
) -> (Outpoint, Output) {
    let account = account.unwrap_or_else(|| create_account_fixture(&h.registry, None, 0, None));
    let amt = AssetAmount::new(asset, amount);
    let tx = issue(h, asset, amount, vec![Action::control(amt, account)]);
    let outpoint = Outpoint::new(tx.hash(), 0);
    (outpoint, tx.outputs()[0].clone())
}

/// Append an issuance of `amount` to `actions`, then build, sign with the
/// test key and finalize.
pub fn issue(h: &Harness, asset: AssetId, amount: u64, mut actions: Vec<Action>) -> Transaction {
    actions.push(Action::issue(AssetAmount::new(asset, amount)));
    transfer(h, &actions)
}

/// Build, sign with the test key and finalize.
pub fn transfer(h: &Harness, actions: &[Action]) -> Transaction {
    let mut template = TemplateBuilder::new(&h.registry, &h.ledger)
        .build(actions)
        .expect("build");
    sign_template(&mut template, &[test_keypair()]);
    finalize(&h.ledger, &template).expect("finalize")
}
