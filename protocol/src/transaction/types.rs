//! Core value types shared by templates, transactions and the ledger.
//!
//! Every type here knows how to write itself into the canonical byte
//! encoding (`encode_into`). The encoding is fixed-width little-endian for
//! integers, length-prefixed for variable data, and follows declaration
//! order field by field. No serde format is involved, so hashes do not
//! depend on map ordering or serializer versions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Hash;
use crate::identity::ControlProgram;

/// Append a `u32` length prefix followed by the bytes themselves.
pub(crate) fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

// ---------------------------------------------------------------------------
// AssetId / AssetAmount
// ---------------------------------------------------------------------------

/// Content-addressed asset identity.
///
/// Computed by the identity registry from the issuance policy, the
/// definition and the genesis hash. Callers never choose it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub Hash);

impl AssetId {
    pub fn as_hash(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({}..)", &self.0.to_hex()[..16])
    }
}

/// A quantity of one asset. Amounts are integers in the asset's smallest
/// unit; there is no floating point anywhere near value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetAmount {
    pub asset_id: AssetId,
    pub amount: u64,
}

impl AssetAmount {
    pub fn new(asset_id: AssetId, amount: u64) -> Self {
        Self { asset_id, amount }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.asset_id.0.as_bytes());
        buf.extend_from_slice(&self.amount.to_le_bytes());
    }
}

impl fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.amount, self.asset_id)
    }
}

// ---------------------------------------------------------------------------
// Outpoint / Output
// ---------------------------------------------------------------------------

/// Reference to one output of a committed transaction.
///
/// Ordered by transaction hash, then index. The builder's automatic coin
/// selection walks unspent outputs in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    pub hash: Hash,
    pub index: u32,
}

impl Outpoint {
    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.hash.as_bytes());
        buf.extend_from_slice(&self.index.to_le_bytes());
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.index)
    }
}

/// A transaction output: value locked by a control program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub asset_amount: AssetAmount,
    pub control_program: ControlProgram,
    pub reference_data: ReferenceData,
}

impl Output {
    pub fn new(
        asset_amount: AssetAmount,
        control_program: ControlProgram,
        reference_data: ReferenceData,
    ) -> Self {
        Self {
            asset_amount,
            control_program,
            reference_data,
        }
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        self.asset_amount.encode_into(buf);
        put_bytes(buf, self.control_program.as_bytes());
        put_bytes(buf, self.reference_data.as_bytes());
    }
}

// ---------------------------------------------------------------------------
// ReferenceData
// ---------------------------------------------------------------------------

/// Opaque caller metadata carried on inputs, outputs and whole templates.
///
/// Stored as raw bytes and never interpreted by the builder, signer or
/// finalizer, so whatever goes in comes back out byte for byte. The
/// `from_map`/`to_map` helpers exist for callers that want to use JSON
/// objects; `serde_json::Map` keeps keys sorted, so equal maps encode to
/// equal bytes.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ReferenceData(Vec<u8>);

impl ReferenceData {
    /// No reference data.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Encode a JSON object as reference data.
    pub fn from_map(
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        serde_json::to_vec(map).map(Self)
    }

    /// Decode the bytes as a JSON object. Empty data decodes to an empty map.
    pub fn to_map(&self) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        if self.0.is_empty() {
            return Ok(serde_json::Map::new());
        }
        serde_json::from_slice(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ReferenceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "ReferenceData({:?})", s),
            Err(_) => write!(f, "ReferenceData(0x{})", hex::encode(&self.0)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::blake3_hash;
    use serde_json::json;

    #[test]
    fn outpoints_order_by_hash_then_index() {
        let low = blake3_hash(b"a").min(blake3_hash(b"b"));
        let high = blake3_hash(b"a").max(blake3_hash(b"b"));

        let mut points = vec![
            Outpoint::new(high, 0),
            Outpoint::new(low, 2),
            Outpoint::new(low, 1),
        ];
        points.sort();
        assert_eq!(
            points,
            vec![
                Outpoint::new(low, 1),
                Outpoint::new(low, 2),
                Outpoint::new(high, 0)
            ]
        );
    }

    #[test]
    fn reference_data_map_is_order_independent() {
        let a = json!({"b": 1, "a": [1, 2]});
        let b = json!({"a": [1, 2], "b": 1});
        let ra = ReferenceData::from_map(a.as_object().unwrap()).unwrap();
        let rb = ReferenceData::from_map(b.as_object().unwrap()).unwrap();
        assert_eq!(ra, rb);
        assert_eq!(ra.to_map().unwrap(), *a.as_object().unwrap());
    }

    #[test]
    fn empty_reference_data_decodes_to_empty_map() {
        assert!(ReferenceData::empty().to_map().unwrap().is_empty());
        assert!(ReferenceData::from_bytes(b"not json".to_vec()).to_map().is_err());
    }

    #[test]
    fn length_prefix_separates_fields() {
        let mut one = Vec::new();
        put_bytes(&mut one, b"ab");
        put_bytes(&mut one, b"c");
        let mut two = Vec::new();
        put_bytes(&mut two, b"a");
        put_bytes(&mut two, b"bc");
        assert_ne!(one, two);
    }
}
