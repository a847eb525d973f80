//! `NodeId` — the 32-byte address space peers and DHT keys live in.
//!
//! A node's own `NodeId` is the SHA-256 of its onion (X25519) public key,
//! the same rule the DHT uses to derive a `NodeId` for any peer it has only
//! ever seen the onion key of.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId([u8; 32]);

impl NodeId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the `NodeId` for an onion public key, per spec.
    pub fn from_onion_public_key(onion_public_key: &[u8; 32]) -> Self {
        Self(lib_crypto::sha256(onion_public_key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn xor_distance(&self, other: &NodeId) -> [u8; 32] {
        let mut out = [0u8; 32];
        for i in 0..32 {
            out[i] = self.0[i] ^ other.0[i];
        }
        out
    }

    /// Index of the k-bucket `other` falls into relative to `self`: the
    /// position of the highest set bit in the XOR distance, counting from 0
    /// at the least significant bit. Equal IDs have no bucket (`None`).
    pub fn bucket_index(&self, other: &NodeId) -> Option<u32> {
        let distance = self.xor_distance(other);
        for (i, byte) in distance.iter().enumerate() {
            if *byte != 0 {
                let bit_in_byte = 7 - byte.leading_zeros();
                return Some((31 - i) as u32 * 8 + bit_in_byte);
            }
        }
        None
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut array = [0u8; 32];
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        array.copy_from_slice(&bytes);
        Ok(Self(array))
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self([0u8; 32])
    }
}
