//! HKDF-SHA256 key derivation for onion session keys and record signing keys.

use crate::error::CryptoError;
use hkdf::Hkdf;
use sha2::Sha256;

/// Derive `output_len` bytes from `master_key` using HKDF-SHA256 with no salt
/// and the given `info` context string.
pub fn derive_keys(master_key: &[u8], info: &[u8], output_len: usize) -> Result<Vec<u8>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, master_key);
    let mut output = vec![0u8; output_len];
    hk.expand(info, &mut output).map_err(|_| CryptoError::HkdfExpandFailed)?;
    Ok(output)
}
