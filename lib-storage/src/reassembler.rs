//! Reassembles a file from its manifest, preferring local blobs and falling
//! back to the DHT via a [`ChunkFetcher`] for chunks this node doesn't hold.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::blob_store::BlobStore;
use crate::dht_bridge::ChunkFetcher;
use crate::error::StorageError;
use crate::manifest::FileManifest;

pub struct Reassembler {
    blob_store: Arc<BlobStore>,
    fetcher: Arc<dyn ChunkFetcher>,
}

impl Reassembler {
    pub fn new(blob_store: Arc<BlobStore>, fetcher: Arc<dyn ChunkFetcher>) -> Self {
        Self { blob_store, fetcher }
    }

    pub async fn reassemble_file_async(
        &self,
        manifest_hex: &str,
        output: &mut (impl AsyncWrite + Unpin),
    ) -> Result<(), StorageError> {
        let manifest_digest = decode_digest(manifest_hex)?;
        let manifest_bytes = self
            .blob_store
            .retrieve_bytes(&manifest_digest)
            .await
            .ok_or_else(|| StorageError::BlobNotFound(manifest_hex.to_string()))?;
        let manifest = FileManifest::from_json_bytes(&manifest_bytes)?;

        for chunk_hex in &manifest.chunks {
            let digest = decode_digest(chunk_hex)?;
            if let Some(plaintext) = self.blob_store.retrieve_bytes(&digest).await {
                output.write_all(&plaintext).await?;
                continue;
            }

            warn!(chunk = %chunk_hex, "chunk absent locally, falling back to DHT");
            match self.fetcher.fetch_chunk(digest).await {
                Some(plaintext) => {
                    // cache it locally so future reassembly and other
                    // requesters can be served without another DHT round trip.
                    let _ = self.blob_store.store(&plaintext).await;
                    output.write_all(&plaintext).await?;
                }
                None => return Err(StorageError::ChunkUnavailable(chunk_hex.clone())),
            }
        }

        Ok(())
    }
}

fn decode_digest(hex_str: &str) -> Result<[u8; 32], StorageError> {
    let bytes = hex::decode(hex_str).map_err(|_| StorageError::InvalidDigest(hex_str.to_string()))?;
    bytes.try_into().map_err(|_| StorageError::InvalidDigest(hex_str.to_string()))
}
