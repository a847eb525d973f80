//! Trait seam between storage and the DHT.
//!
//! The ingestor and reassembler need to push newly-stored chunks to the
//! network and pull missing ones from it, but `lib-storage` cannot depend on
//! `lib-network` — the DHT service itself depends on the blob store. These
//! traits let `lib-network` implement the DHT side and hand the
//! implementation to the ingestor/reassembler, keeping the dependency graph
//! a DAG.

use async_trait::async_trait;

#[async_trait]
pub trait ChunkPublisher: Send + Sync {
    /// Propagate a just-stored chunk (or manifest) to the closest nodes in
    /// the DHT as a fire-and-forget STORE.
    async fn publish_chunk(&self, digest: [u8; 32], plaintext: &[u8]);
}

#[async_trait]
pub trait ChunkFetcher: Send + Sync {
    /// Look up and FETCH a chunk from the DHT. Returns the plaintext if any
    /// candidate served it.
    async fn fetch_chunk(&self, digest: [u8; 32]) -> Option<Vec<u8>>;
}
