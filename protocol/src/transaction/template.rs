//! Draft transactions and their canonical encoding.
//!
//! A [`Template`] is what the builder produces and the signer fills in. It
//! is ledger-invisible until finalized; dropping one leaves no trace.
//!
//! ## Canonical encoding
//!
//! ```text
//! body    = TX_VERSION u16
//!           || input count u32  || input*
//!           || output count u32 || output*
//!           || len-prefixed template reference data
//! input   = source tag u8 (0 issuance, 1 spend)
//!           || issuance: genesis hash (32) || definition hash (32)
//!              spend:    outpoint hash (32) || index u32
//!           || asset id (32) || amount u64
//!           || policy: quorum u32 || key count u32 || keys (32 each)
//!           || len-prefixed reference data
//! output  = asset id (32) || amount u64 || len-prefixed program || len-prefixed reference data
//! witness = body || per input: slot count u32 || per slot: 0 | 1 || signature (64)
//! ```
//!
//! All integers are little-endian. The transaction ID hashes `body`, so it
//! does not move as signatures arrive; the witness hash covers the filled
//! slots as well.

use serde::{Deserialize, Serialize};

use super::types::{put_bytes, AssetAmount, Outpoint, Output, ReferenceData};
use crate::config::{DOMAIN_SIGHASH, DOMAIN_TX_ID, DOMAIN_TX_WITNESS, TX_VERSION};
use crate::crypto::{domain_separated_hash, Hash, Signature};
use crate::identity::SigningPolicy;

const SOURCE_ISSUANCE: u8 = 0;
const SOURCE_SPEND: u8 = 1;

/// Where an input's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    /// New units. The hashes let a verifier recompute the asset ID from the
    /// input's policy alone.
    Issuance {
        genesis_hash: Hash,
        definition_hash: Hash,
    },
    /// An existing unspent output.
    Spend { outpoint: Outpoint },
}

/// One input with its policy and signature slots.
///
/// `signatures[i]` belongs to `policy.keys()[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    source: InputSource,
    asset_amount: AssetAmount,
    policy: SigningPolicy,
    reference_data: ReferenceData,
    signatures: Vec<Option<Signature>>,
}

impl Input {
    pub(crate) fn new(
        source: InputSource,
        asset_amount: AssetAmount,
        policy: SigningPolicy,
        reference_data: ReferenceData,
    ) -> Self {
        let slots = policy.keys().len();
        Self {
            source,
            asset_amount,
            policy,
            reference_data,
            signatures: vec![None; slots],
        }
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn asset_amount(&self) -> &AssetAmount {
        &self.asset_amount
    }

    pub fn policy(&self) -> &SigningPolicy {
        &self.policy
    }

    pub fn reference_data(&self) -> &ReferenceData {
        &self.reference_data
    }

    pub fn signatures(&self) -> &[Option<Signature>] {
        &self.signatures
    }

    /// The spent outpoint, or `None` for issuance.
    pub fn outpoint(&self) -> Option<&Outpoint> {
        match &self.source {
            InputSource::Spend { outpoint } => Some(outpoint),
            InputSource::Issuance { .. } => None,
        }
    }

    pub fn is_issuance(&self) -> bool {
        matches!(self.source, InputSource::Issuance { .. })
    }

    pub fn filled_count(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }

    pub fn meets_quorum(&self) -> bool {
        self.filled_count() >= self.policy.quorum() as usize
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut Option<Signature>> {
        self.signatures.get_mut(index)
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match &self.source {
            InputSource::Issuance {
                genesis_hash,
                definition_hash,
            } => {
                buf.push(SOURCE_ISSUANCE);
                buf.extend_from_slice(genesis_hash.as_bytes());
                buf.extend_from_slice(definition_hash.as_bytes());
            }
            InputSource::Spend { outpoint } => {
                buf.push(SOURCE_SPEND);
                outpoint.encode_into(buf);
            }
        }
        self.asset_amount.encode_into(buf);
        self.policy.encode_into(buf);
        put_bytes(buf, self.reference_data.as_bytes());
    }

    fn encode_witness_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.signatures.len() as u32).to_le_bytes());
        for slot in &self.signatures {
            match slot {
                Some(sig) => {
                    buf.push(1);
                    put_bytes(buf, sig.as_bytes());
                }
                None => buf.push(0),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

pub(crate) fn encode_body(
    inputs: &[Input],
    outputs: &[Output],
    reference_data: &ReferenceData,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + 160 * (inputs.len() + outputs.len()));
    buf.extend_from_slice(&TX_VERSION.to_le_bytes());
    buf.extend_from_slice(&(inputs.len() as u32).to_le_bytes());
    for input in inputs {
        input.encode_into(&mut buf);
    }
    buf.extend_from_slice(&(outputs.len() as u32).to_le_bytes());
    for output in outputs {
        output.encode_into(&mut buf);
    }
    put_bytes(&mut buf, reference_data.as_bytes());
    buf
}

/// Transaction identity: hash of the body without signature material.
pub(crate) fn compute_tx_hash(
    inputs: &[Input],
    outputs: &[Output],
    reference_data: &ReferenceData,
) -> Hash {
    domain_separated_hash(DOMAIN_TX_ID, &encode_body(inputs, outputs, reference_data))
}

/// Hash of the body plus every signature slot.
pub(crate) fn compute_witness_hash(
    inputs: &[Input],
    outputs: &[Output],
    reference_data: &ReferenceData,
) -> Hash {
    let mut buf = encode_body(inputs, outputs, reference_data);
    for input in inputs {
        input.encode_witness_into(&mut buf);
    }
    domain_separated_hash(DOMAIN_TX_WITNESS, &buf)
}

/// Message signed for input `index`: `H(sighash, tx_hash || index u32)`.
pub fn sighash(tx_hash: &Hash, index: usize) -> Hash {
    let mut buf = Vec::with_capacity(36);
    buf.extend_from_slice(tx_hash.as_bytes());
    buf.extend_from_slice(&(index as u32).to_le_bytes());
    domain_separated_hash(DOMAIN_SIGHASH, &buf)
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// An unsigned or partially signed transaction.
///
/// Serializable so it can be handed from one co-signer to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    reference_data: ReferenceData,
}

impl Template {
    pub(crate) fn new(
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        reference_data: ReferenceData,
    ) -> Self {
        Self {
            inputs,
            outputs,
            reference_data,
        }
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

    pub(crate) fn inputs_mut(&mut self) -> &mut [Input] {
        &mut self.inputs
    }

    /// The ID the transaction will have once finalized.
    pub fn tx_hash(&self) -> Hash {
        compute_tx_hash(&self.inputs, &self.outputs, &self.reference_data)
    }

    pub fn witness_hash(&self) -> Hash {
        compute_witness_hash(&self.inputs, &self.outputs, &self.reference_data)
    }

    /// Signature message for input `index`.
    pub fn sighash(&self, index: usize) -> Hash {
        sighash(&self.tx_hash(), index)
    }

    /// True once every input has at least its quorum of filled slots.
    pub fn is_fully_signed(&self) -> bool {
        self.inputs.iter().all(Input::meets_quorum)
    }

    pub(crate) fn into_parts(self) -> (Vec<Input>, Vec<Output>, ReferenceData) {
        (self.inputs, self.outputs, self.reference_data)
    }
}
