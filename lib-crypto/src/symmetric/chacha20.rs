//! ChaCha20-Poly1305 AEAD encryption.
//!
//! `encrypt_data`/`decrypt_data` generate and prepend their own nonce for
//! callers that don't need control over nonce placement (e.g. the blob
//! store). `encrypt_with_nonce`/`decrypt_with_nonce` take an explicit nonce
//! for wire formats that place the nonce at a fixed header offset.

use crate::error::CryptoError;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::random::generate_nonce;

fn cipher(key: &[u8]) -> Result<ChaCha20Poly1305, CryptoError> {
    if key.len() != 32 {
        return Err(CryptoError::InvalidKeyLength { expected: 32, actual: key.len() });
    }
    Ok(ChaCha20Poly1305::new(Key::from_slice(key)))
}

/// Encrypt with a freshly generated nonce, prepended to the returned ciphertext.
pub fn encrypt_data(data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    encrypt_data_with_ad(data, key, &[])
}

/// Decrypt data produced by [`encrypt_data`] (nonce-prefixed ciphertext).
pub fn decrypt_data(encrypted_data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    decrypt_data_with_ad(encrypted_data, key, &[])
}

pub fn encrypt_data_with_ad(
    data: &[u8],
    key: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher(key)?;
    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: data, aad: associated_data })
        .map_err(|_| CryptoError::EncryptFailed)?;

    let mut result = nonce.to_vec();
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

pub fn decrypt_data_with_ad(
    encrypted_data: &[u8],
    key: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if encrypted_data.len() < 12 {
        return Err(CryptoError::DecryptFailed);
    }
    let cipher = cipher(key)?;
    let nonce = Nonce::from_slice(&encrypted_data[..12]);
    let ciphertext = &encrypted_data[12..];

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad: associated_data })
        .map_err(|_| CryptoError::DecryptFailed)
}

/// Encrypt with an explicit 12-byte nonce — no nonce is prepended to the output.
pub fn encrypt_with_nonce(
    data: &[u8],
    key: &[u8],
    nonce: &[u8; 12],
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher(key)?;
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: data, aad: associated_data })
        .map_err(|_| CryptoError::EncryptFailed)
}

/// Decrypt a ciphertext produced by [`encrypt_with_nonce`] given the same nonce.
pub fn decrypt_with_nonce(
    ciphertext: &[u8],
    key: &[u8],
    nonce: &[u8; 12],
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher(key)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad: associated_data })
        .map_err(|_| CryptoError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::OsRng, RngCore};

    fn random_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn roundtrip_without_ad() {
        let key = random_key();
        let plaintext = b"overlay node symmetric encryption test";
        let ciphertext = encrypt_data(plaintext, &key).unwrap();
        let decrypted = decrypt_data(&ciphertext, &key).unwrap();
        assert_eq!(plaintext.as_slice(), decrypted);
        assert_ne!(plaintext.as_slice(), &ciphertext[12..]);
    }

    #[test]
    fn roundtrip_with_ad_and_ad_mismatch_fails() {
        let key = random_key();
        let plaintext = b"aead test data";
        let ad = b"frame-header";
        let ciphertext = encrypt_data_with_ad(plaintext, &key, ad).unwrap();
        let decrypted = decrypt_data_with_ad(&ciphertext, &key, ad).unwrap();
        assert_eq!(plaintext.as_slice(), decrypted);

        assert!(decrypt_data_with_ad(&ciphertext, &key, b"wrong-ad").is_err());
    }

    #[test]
    fn explicit_nonce_roundtrip() {
        let key = random_key();
        let nonce = [3u8; 12];
        let plaintext = b"fixed-offset nonce payload";
        let ciphertext = encrypt_with_nonce(plaintext, &key, &nonce, b"ad").unwrap();
        let decrypted = decrypt_with_nonce(&ciphertext, &key, &nonce, b"ad").unwrap();
        assert_eq!(plaintext.as_slice(), decrypted);
    }

    #[test]
    fn wrong_key_length_rejected() {
        let plaintext = b"x";
        assert!(encrypt_data(plaintext, &[0u8; 16]).is_err());
    }
}
