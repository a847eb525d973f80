//! Content-addressed, AEAD-encrypted local blob persistence.
//!
//! Files are named by the lowercase hex of the SHA-256 of their *plaintext*,
//! so storing the same content twice is idempotent and deduplicable. On
//! disk, a blob is `nonce (12) | ciphertext | tag (16)`, written to a
//! `.tmp` sibling and atomically renamed into place so a file present at the
//! final path is always complete and authenticated.

use std::path::{Path, PathBuf};

use lib_crypto::{decrypt_with_nonce, encrypt_with_nonce, sha256};
use rand::RngCore;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::StorageError;

pub struct BlobStore {
    dir: PathBuf,
    storage_key: [u8; 32],
}

impl BlobStore {
    /// `dir` is created if it does not already exist.
    pub async fn open(dir: impl Into<PathBuf>, storage_key: [u8; 32]) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir, storage_key })
    }

    fn path_for(&self, digest: &[u8; 32]) -> PathBuf {
        self.dir.join(hex::encode(digest))
    }

    /// Store `plaintext`, returning its SHA-256 digest. Idempotent: storing
    /// the same bytes twice returns the same digest and leaves one file.
    pub async fn store(&self, plaintext: &[u8]) -> Result<[u8; 32], StorageError> {
        let digest = sha256(plaintext);
        let final_path = self.path_for(&digest);

        if fs::try_exists(&final_path).await.unwrap_or(false) {
            debug!(digest = %hex::encode(digest), "blob already present, skipping write");
            return Ok(digest);
        }

        let mut nonce = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let ciphertext = encrypt_with_nonce(plaintext, &self.storage_key, &nonce, &[])
            .map_err(|_| StorageError::DecryptFailure(hex::encode(digest)))?;

        let mut record = Vec::with_capacity(12 + ciphertext.len());
        record.extend_from_slice(&nonce);
        record.extend_from_slice(&ciphertext);

        let tmp_path = final_path.with_extension("tmp");
        {
            let mut tmp_file = fs::File::create(&tmp_path).await?;
            tmp_file.write_all(&record).await?;
            tmp_file.sync_all().await?;
        }

        match fs::rename(&tmp_path, &final_path).await {
            Ok(()) => {}
            Err(err) => {
                // Another writer may have won the race to the same digest.
                if fs::try_exists(&final_path).await.unwrap_or(false) {
                    let _ = fs::remove_file(&tmp_path).await;
                } else {
                    return Err(err.into());
                }
            }
        }

        if let Ok(dir_file) = fs::File::open(&self.dir).await {
            let _ = dir_file.sync_all().await;
        }

        Ok(digest)
    }

    /// Read and decrypt an entire blob. Intended for small blobs (manifests).
    pub async fn retrieve_bytes(&self, digest: &[u8; 32]) -> Option<Vec<u8>> {
        let path = self.path_for(digest);
        let record = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };
        self.decrypt_record(digest, &record)
    }

    /// Decrypt a blob and write the plaintext into `writer`. Whole-file
    /// decrypt in memory; a true streaming AEAD format is out of scope.
    pub async fn retrieve_to_stream(
        &self,
        digest: &[u8; 32],
        writer: &mut (impl AsyncWrite + Unpin),
    ) -> Result<(), StorageError> {
        match self.retrieve_bytes(digest).await {
            Some(plaintext) => {
                writer.write_all(&plaintext).await?;
                Ok(())
            }
            None => Err(StorageError::BlobNotFound(hex::encode(digest))),
        }
    }

    /// Decrypt directly into `dest`, returning the number of bytes written,
    /// or `0` if the blob is absent or fails authentication.
    pub async fn retrieve_to_buffer(&self, digest: &[u8; 32], dest: &mut [u8]) -> usize {
        match self.retrieve_bytes(digest).await {
            Some(plaintext) if plaintext.len() <= dest.len() => {
                dest[..plaintext.len()].copy_from_slice(&plaintext);
                plaintext.len()
            }
            _ => 0,
        }
    }

    pub async fn has_blob(&self, digest: &[u8; 32]) -> bool {
        fs::try_exists(self.path_for(digest)).await.unwrap_or(false)
    }

    /// Plaintext size, or `None` if the blob is absent.
    pub async fn blob_size(&self, digest: &[u8; 32]) -> Option<u64> {
        let meta = fs::metadata(self.path_for(digest)).await.ok()?;
        meta.len().checked_sub(28)
    }

    fn decrypt_record(&self, digest: &[u8; 32], record: &[u8]) -> Option<Vec<u8>> {
        if record.len() < 28 {
            warn!(digest = %hex::encode(digest), "blob file shorter than AEAD overhead");
            return None;
        }
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&record[..12]);
        let ciphertext = &record[12..];
        match decrypt_with_nonce(ciphertext, &self.storage_key, &nonce, &[]) {
            Ok(plaintext) => Some(plaintext),
            Err(_) => {
                warn!(digest = %hex::encode(digest), "blob failed authentication on decrypt");
                None
            }
        }
    }
}

/// Read up to `chunk_size` bytes; used by the ingestor to chunk a stream.
pub async fn read_chunk(
    reader: &mut (impl tokio::io::AsyncRead + Unpin),
    chunk_size: usize,
) -> Result<Vec<u8>, StorageError> {
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

pub fn blobs_subdir(data_dir: &Path) -> PathBuf {
    data_dir.join("blobs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key() -> [u8; 32] {
        [0x11u8; 32]
    }

    #[tokio::test]
    async fn store_then_retrieve_roundtrips() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path(), key()).await.unwrap();
        let digest = store.store(b"duplicate test").await.unwrap();

        assert!(store.has_blob(&digest).await);
        assert_eq!(store.blob_size(&digest).await, Some(14));
        assert_eq!(store.retrieve_bytes(&digest).await.unwrap(), b"duplicate test");
    }

    #[tokio::test]
    async fn storing_same_plaintext_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path(), key()).await.unwrap();
        let first = store.store(b"duplicate test").await.unwrap();
        let second = store.store(b"duplicate test").await.unwrap();
        assert_eq!(first, second);

        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        assert_eq!(entries.by_ref().count(), 1);
    }

    #[tokio::test]
    async fn retrieve_to_buffer_matches_retrieve_bytes() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path(), key()).await.unwrap();
        let digest = store.store(b"buffer test payload").await.unwrap();

        let mut dest = [0u8; 32];
        let written = store.retrieve_to_buffer(&digest, &mut dest).await;
        assert_eq!(&dest[..written], b"buffer test payload");
    }

    #[tokio::test]
    async fn missing_blob_retrieval_returns_none() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path(), key()).await.unwrap();
        assert!(!store.has_blob(&[7u8; 32]).await);
        assert!(store.retrieve_bytes(&[7u8; 32]).await.is_none());
    }

    #[tokio::test]
    async fn corrupted_ciphertext_fails_authentication() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path(), key()).await.unwrap();
        let digest = store.store(b"tamper test").await.unwrap();

        let path = store.path_for(&digest);
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        assert!(store.retrieve_bytes(&digest).await.is_none());
    }
}
