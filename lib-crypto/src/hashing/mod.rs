//! Content hashing (SHA-256) and frame checksums (CRC32).

use sha2::{Digest, Sha256};

/// SHA-256 digest, used for content addressing and for deriving a peer's
/// node ID from its onion public key.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 over multiple segments without concatenating them first.
pub fn sha256_multiple(segments: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for segment in segments {
        hasher.update(segment);
    }
    hasher.finalize().into()
}

/// CRC32 (IEEE) checksum used by the wire frame header.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
