//! Chunks a file stream into 256 KiB pieces, stores each through the blob
//! store, and propagates them to the DHT via a [`ChunkPublisher`].

use std::sync::Arc;

use tokio::io::AsyncRead;
use tracing::info;

use crate::blob_store::{read_chunk, BlobStore};
use crate::dht_bridge::ChunkPublisher;
use crate::error::StorageError;
use crate::manifest::FileManifest;

pub const CHUNK_SIZE: usize = 262_144;

pub struct Ingestor {
    blob_store: Arc<BlobStore>,
    publisher: Arc<dyn ChunkPublisher>,
}

impl Ingestor {
    pub fn new(blob_store: Arc<BlobStore>, publisher: Arc<dyn ChunkPublisher>) -> Self {
        Self { blob_store, publisher }
    }

    /// Read `stream` to completion in [`CHUNK_SIZE`] pieces, store and
    /// publish each chunk, then store and publish the manifest. Returns the
    /// hex digest of the manifest.
    pub async fn ingest_async(
        &self,
        mut stream: impl AsyncRead + Unpin,
        file_name: String,
        content_type: String,
    ) -> Result<String, StorageError> {
        let mut chunks = Vec::new();
        let mut total_size: u64 = 0;

        loop {
            let chunk = read_chunk(&mut stream, CHUNK_SIZE).await?;
            if chunk.is_empty() {
                break;
            }
            total_size += chunk.len() as u64;

            let digest = self.blob_store.store(&chunk).await?;
            self.publisher.publish_chunk(digest, &chunk).await;
            chunks.push(hex::encode(digest));

            if chunk.len() < CHUNK_SIZE {
                break;
            }
        }

        let manifest = FileManifest { file_name, content_type, total_size, chunks };
        let manifest_bytes = manifest.to_json_bytes();
        let manifest_digest = self.blob_store.store(&manifest_bytes).await?;
        self.publisher.publish_chunk(manifest_digest, &manifest_bytes).await;

        info!(
            manifest = %hex::encode(manifest_digest),
            chunks = manifest.chunks.len(),
            total_size,
            "ingested file"
        );
        Ok(hex::encode(manifest_digest))
    }
}
