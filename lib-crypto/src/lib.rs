//! Cryptographic primitives shared by the rest of the node: Ed25519
//! signatures, X25519 key agreement, ChaCha20-Poly1305 AEAD, HKDF-SHA256
//! key derivation, SHA-256 content hashing, and CRC32 frame checksums.

pub mod classical;
pub mod error;
pub mod hashing;
pub mod kdf;
pub mod random;
pub mod symmetric;
pub mod traits;

pub use classical::{
    ed25519_keypair, ed25519_keypair_from_seed, ed25519_sign, ed25519_verify, X25519KeyPair,
};
pub use error::CryptoError;
pub use hashing::{crc32, sha256, sha256_multiple};
pub use kdf::derive_keys;
pub use random::{generate_nonce, SecureRng};
pub use symmetric::{
    decrypt_data, decrypt_data_with_ad, decrypt_with_nonce, encrypt_data, encrypt_data_with_ad,
    encrypt_with_nonce,
};
pub use traits::{SecureKey, ZeroizingKey};
