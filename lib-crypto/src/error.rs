//! Crate-wide error type for operations that cross a module boundary.
//!
//! Internal helpers still return `anyhow::Result` the way the rest of this
//! crate always has; `CryptoError` is for callers in other crates that need
//! to match on a specific failure kind.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("signature must be 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("AEAD encryption failed")]
    EncryptFailed,

    #[error("AEAD decryption failed")]
    DecryptFailed,

    #[error("HKDF expand failed: output too long for the hash")]
    HkdfExpandFailed,

    #[error("malformed key bytes")]
    MalformedKey,
}
