//! Ed25519 signatures used for identity keys and mutable-record authorship.

use crate::error::CryptoError;
use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// Generate a new Ed25519 keypair. Returns `(public_key, secret_key)`, both 32 bytes.
pub fn ed25519_keypair() -> (Vec<u8>, Vec<u8>) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (verifying_key.as_bytes().to_vec(), signing_key.as_bytes().to_vec())
}

/// Derive an Ed25519 keypair from a 32-byte seed, for persisted identity keys.
pub fn ed25519_keypair_from_seed(seed: &[u8; 32]) -> (Vec<u8>, Vec<u8>) {
    let signing_key = SigningKey::from_bytes(seed);
    let verifying_key = signing_key.verifying_key();
    (verifying_key.as_bytes().to_vec(), signing_key.as_bytes().to_vec())
}

pub fn ed25519_sign(message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if secret_key.len() != 32 {
        return Err(CryptoError::InvalidKeyLength { expected: 32, actual: secret_key.len() });
    }
    let mut sk_bytes = [0u8; 32];
    sk_bytes.copy_from_slice(secret_key);
    let signing_key = SigningKey::from_bytes(&sk_bytes);
    Ok(signing_key.sign(message).to_bytes().to_vec())
}

/// Verify an Ed25519 signature. Malformed inputs return `Ok(false)` rather
/// than an error — signature verification is a predicate, not a fallible op.
pub fn ed25519_verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    if signature.len() != 64 || public_key.len() != 32 {
        return false;
    }
    let sig = match Ed25519Signature::try_from(signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let mut pk_bytes = [0u8; 32];
    pk_bytes.copy_from_slice(public_key);
    let verifying_key = match VerifyingKey::from_bytes(&pk_bytes) {
        Ok(key) => key,
        Err(_) => return false,
    };
    verifying_key.verify(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let (pk, sk) = ed25519_keypair();
        let message = b"overlay node test message";
        let signature = ed25519_sign(message, &sk).unwrap();
        assert!(ed25519_verify(message, &signature, &pk));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let (pk, sk) = ed25519_keypair();
        let signature = ed25519_sign(b"message", &sk).unwrap();
        assert!(!ed25519_verify(b"different message", &signature, &pk));
    }

    #[test]
    fn seed_derivation_is_deterministic() {
        let seed = [7u8; 32];
        let (pk1, sk1) = ed25519_keypair_from_seed(&seed);
        let (pk2, sk2) = ed25519_keypair_from_seed(&seed);
        assert_eq!(pk1, pk2);
        assert_eq!(sk1, sk2);
    }

    #[test]
    fn malformed_signature_is_rejected_not_panicked() {
        let (pk, _) = ed25519_keypair();
        assert!(!ed25519_verify(b"msg", &[0u8; 10], &pk));
        assert!(!ed25519_verify(b"msg", &[0u8; 64], &[0u8; 10]));
    }
}
