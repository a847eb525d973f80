//! Content-addressed encrypted blob storage, file chunking, and
//! reassembly. The DHT is reached only through the [`dht_bridge`] trait
//! seam so this crate never depends on `lib-network`.

pub mod blob_store;
pub mod dht_bridge;
pub mod error;
pub mod ingestor;
pub mod manifest;
pub mod reassembler;

pub use blob_store::{blobs_subdir, BlobStore};
pub use dht_bridge::{ChunkFetcher, ChunkPublisher};
pub use error::StorageError;
pub use ingestor::{Ingestor, CHUNK_SIZE};
pub use manifest::FileManifest;
pub use reassembler::Reassembler;
