//! Owner-signed mutable records: sign, verify, and track the highest
//! sequence number seen per owner so stale writes cannot overwrite fresh
//! ones (spec.md §3 "Mutable records", §4.6).

use std::collections::HashMap;

use lib_crypto::{ed25519_sign, ed25519_verify};
use parking_lot::RwLock;

use crate::error::NetworkError;
use crate::framing::MutableRecordWire;

/// Sign `value` at `sequence` with the owner's Ed25519 identity secret key,
/// producing the wire form ready to PUT into the DHT.
pub fn sign_record(
    owner_pub: [u8; 32],
    sequence: u64,
    value: Vec<u8>,
    identity_secret_key: &[u8],
) -> Result<MutableRecordWire, NetworkError> {
    let mut record = MutableRecordWire { owner_pub, sequence, signature: [0u8; 64], value };
    let signable = record.signable();
    let signature = ed25519_sign(&signable, identity_secret_key)
        .map_err(|_| NetworkError::MalformedFrame("failed to sign mutable record".into()))?;
    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(&signature);
    record.signature = sig_bytes;
    Ok(record)
}

/// Verify that `record.signature` is a valid Ed25519 signature over
/// `sequence || value` by the declared `owner_pub`.
pub fn verify_record(record: &MutableRecordWire) -> bool {
    let signable = record.signable();
    ed25519_verify(&signable, &record.signature, &record.owner_pub)
}

/// Tracks, per owner, the highest-sequence record accepted so far. A PUT
/// with a sequence number at or below what is already stored is rejected;
/// this is what lets concurrent writers converge without coordination.
pub struct MutableRecordStore {
    records: RwLock<HashMap<[u8; 32], MutableRecordWire>>,
}

impl MutableRecordStore {
    pub fn new() -> Self {
        Self { records: RwLock::new(HashMap::new()) }
    }

    /// Accept `record` if its signature verifies and its sequence number is
    /// strictly greater than any previously accepted for this owner.
    pub fn put(&self, record: MutableRecordWire) -> Result<(), NetworkError> {
        if !verify_record(&record) {
            return Err(NetworkError::InvalidSignature);
        }
        let mut records = self.records.write();
        if let Some(existing) = records.get(&record.owner_pub) {
            if record.sequence <= existing.sequence {
                return Err(NetworkError::StaleSequence { sequence: record.sequence });
            }
        }
        records.insert(record.owner_pub, record);
        Ok(())
    }

    pub fn get(&self, owner_pub: &[u8; 32]) -> Option<MutableRecordWire> {
        self.records.read().get(owner_pub).cloned()
    }
}

impl Default for MutableRecordStore {
    fn default() -> Self {
        Self::new()
    }
}
