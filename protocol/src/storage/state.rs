//! # Ledger State -- Unspent Output Set
//!
//! A [`StateSnapshot`] is the set of unspent outputs at one point in time,
//! keyed by outpoint. Block headers commit to it through a Merkle root.
//!
//! ## Root Computation
//!
//! ```text
//! leaf = H(state leaf domain, outpoint encoding || output encoding)
//! root = merkle_root(leaves in outpoint order)
//! ```
//!
//! The map is a `BTreeMap`, so iteration order, and therefore the root, is
//! independent of insertion order. An empty set has a root of all zeros.
//!
//! ## State Transition
//!
//! Applying a transaction `T`:
//!
//! 1. Every outpoint `T` spends must be present (and spent once).
//! 2. Each spend input must match the output it consumes and satisfy its
//!    control program.
//! 3. Remove the spent outpoints, insert `(T.hash, i)` for every output.
//!
//! A failed application leaves the snapshot untouched.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::config::DOMAIN_STATE_LEAF;
use crate::crypto::{domain_separated_hash, merkle_root, Hash};
use crate::transaction::{verify_spend, Outpoint, Output, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("outpoint {0} is spent or unknown")]
    MissingOutput(Outpoint),

    #[error("input {input_index} of {tx} does not satisfy the output it spends")]
    Unauthorized { tx: Hash, input_index: usize },

    #[error("outpoint {0} already exists")]
    OutputExists(Outpoint),
}

/// Unspent outputs at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    utxos: BTreeMap<Outpoint, Output>,
}

impl StateSnapshot {
    /// An empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state with caller-supplied outputs, e.g. a genesis allocation.
    pub fn from_outputs(outputs: impl IntoIterator<Item = (Outpoint, Output)>) -> Self {
        Self {
            utxos: outputs.into_iter().collect(),
        }
    }

    pub fn get(&self, outpoint: &Outpoint) -> Option<&Output> {
        self.utxos.get(outpoint)
    }

    pub fn contains(&self, outpoint: &Outpoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// Iterate in outpoint order.
    pub fn iter(&self) -> impl Iterator<Item = (&Outpoint, &Output)> {
        self.utxos.iter()
    }

    /// Merkle root over all unspent outputs.
    pub fn root(&self) -> Hash {
        let leaves: Vec<Hash> = self
            .utxos
            .iter()
            .map(|(outpoint, output)| {
                let mut preimage = Vec::with_capacity(160);
                outpoint.encode_into(&mut preimage);
                output.encode_into(&mut preimage);
                domain_separated_hash(DOMAIN_STATE_LEAF, &preimage)
            })
            .collect();
        merkle_root(&leaves)
    }

    /// Apply `tx`, checking spends and authorization first.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), StateError> {
        let mut spent = HashSet::new();
        for (input_index, input) in tx.inputs().iter().enumerate() {
            let Some(outpoint) = input.outpoint() else {
                continue;
            };
            let output = self
                .utxos
                .get(outpoint)
                .ok_or(StateError::MissingOutput(*outpoint))?;
            if !spent.insert(*outpoint) {
                return Err(StateError::MissingOutput(*outpoint));
            }
            verify_spend(input_index, input, output).map_err(|_| StateError::Unauthorized {
                tx: tx.hash(),
                input_index,
            })?;
        }
        for (outpoint, _) in tx.created_outputs() {
            if self.utxos.contains_key(&outpoint) {
                return Err(StateError::OutputExists(outpoint));
            }
        }

        for outpoint in &spent {
            self.utxos.remove(outpoint);
        }
        for (outpoint, output) in tx.created_outputs() {
            self.utxos.insert(outpoint, output.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{blake3_hash, Keypair};
    use crate::identity::{ControlProgram, Registry, SigningPolicy};
    use crate::storage::{Ledger, MemStore};
    use crate::transaction::{
        seal, sign_template, Action, AssetAmount, AssetId, ReferenceData, TemplateBuilder,
    };
    use std::sync::Arc;

    fn output(amount: u64) -> Output {
        let policy = SigningPolicy::new(vec![Keypair::generate().public_key()], 1).unwrap();
        Output::new(
            AssetAmount::new(AssetId(blake3_hash(b"asset")), amount),
            ControlProgram::new(&policy, &blake3_hash(b"tag")),
            ReferenceData::empty(),
        )
    }

    #[test]
    fn empty_state_root_is_zero() {
        assert_eq!(StateSnapshot::new().root(), Hash::ZERO);
    }

    #[test]
    fn root_is_insertion_order_independent() {
        let a = (Outpoint::new(blake3_hash(b"a"), 0), output(1));
        let b = (Outpoint::new(blake3_hash(b"b"), 0), output(2));
        let s1 = StateSnapshot::from_outputs(vec![a.clone(), b.clone()]);
        let s2 = StateSnapshot::from_outputs(vec![b, a]);
        assert_eq!(s1.root(), s2.root());
    }

    #[test]
    fn different_states_different_roots() {
        let op = Outpoint::new(blake3_hash(b"a"), 0);
        let s1 = StateSnapshot::from_outputs(vec![(op, output(1))]);
        let s2 = StateSnapshot::from_outputs(vec![(op, output(2))]);
        assert_ne!(s1.root(), s2.root());
    }

    #[test]
    fn apply_moves_value_and_rejects_replay() {
        let registry = Registry::new();
        let ledger = Ledger::new(Arc::new(MemStore::new()));
        let key = Keypair::generate();
        let asset = registry
            .create_asset(vec![key.public_key()], 1, ReferenceData::empty(), Hash::ZERO, None)
            .unwrap();
        let account = registry.create_account(vec![key.public_key()], 1, None).unwrap();

        let mut template = TemplateBuilder::new(&registry, &ledger)
            .build(&[
                Action::issue(AssetAmount::new(asset, 10)),
                Action::control(AssetAmount::new(asset, 10), account),
            ])
            .unwrap();
        sign_template(&mut template, &[key]);
        let tx = seal(&template).unwrap();

        let mut state = StateSnapshot::new();
        state.apply(&tx).unwrap();
        assert!(state.contains(&Outpoint::new(tx.hash(), 0)));

        let before = state.clone();
        assert_eq!(
            state.apply(&tx),
            Err(StateError::OutputExists(Outpoint::new(tx.hash(), 0)))
        );
        assert_eq!(state, before);
    }
}
