//! Filling signature slots.
//!
//! Each input is signed over its sighash, `H(tx_hash || input index)`. The
//! transaction hash excludes signature material, so signatures can be added
//! in any order, by any number of parties, without invalidating each other.
//!
//! Signing only ever fills empty slots. Running it again with the same keys
//! changes nothing, and Ed25519 is deterministic anyway, so the same key
//! would produce the same bytes.

use std::convert::Infallible;
use tracing::debug;

use super::template::{sighash, Template};
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::identity::{KeyService, KeyServiceError};

/// Sign every slot whose key is among `keys`. Returns the number of slots
/// newly filled. Keys that no input asks for are ignored.
pub fn sign_template(template: &mut Template, keys: &[Keypair]) -> usize {
    let publics: Vec<PublicKey> = keys.iter().map(Keypair::public_key).collect();
    let result: Result<usize, Infallible> = fill_slots(template, |key, message| {
        Ok(publics
            .iter()
            .position(|p| p == key)
            .map(|i| keys[i].sign(message)))
    });
    match result {
        Ok(filled) => filled,
        Err(never) => match never {},
    }
}

/// Sign through a key service. Keys the service does not hold are skipped;
/// any other service failure aborts and is returned. Slots filled before the
/// failure stay filled.
pub fn sign_template_with(
    template: &mut Template,
    service: &dyn KeyService,
) -> Result<usize, KeyServiceError> {
    fill_slots(template, |key, message| match service.sign_with_key(key, message) {
        Ok(sig) => Ok(Some(sig)),
        Err(KeyServiceError::KeyNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    })
}

fn fill_slots<E, F>(template: &mut Template, mut sign: F) -> Result<usize, E>
where
    F: FnMut(&PublicKey, &[u8]) -> Result<Option<Signature>, E>,
{
    let tx_hash = template.tx_hash();
    let mut filled = 0;

    for (index, input) in template.inputs_mut().iter_mut().enumerate() {
        let message = sighash(&tx_hash, index);
        let keys = input.policy().keys().to_vec();

        for (slot_index, key) in keys.iter().enumerate() {
            let Some(slot) = input.slot_mut(slot_index) else {
                continue;
            };
            if slot.is_some() {
                continue;
            }
            if let Some(sig) = sign(key, message.as_bytes())? {
                *slot = Some(sig);
                filled += 1;
            }
        }
    }

    debug!(tx_id = %tx_hash, filled, "template signed");
    Ok(filled)
}
