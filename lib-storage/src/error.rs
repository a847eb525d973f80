use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob {0} not found")]
    BlobNotFound(String),

    #[error("blob exceeds the allowed size")]
    BlobTooLarge,

    #[error("failed to decrypt blob {0}: authentication failed")]
    DecryptFailure(String),

    #[error("manifest could not be parsed: {0}")]
    ManifestParseError(#[from] serde_json::Error),

    #[error("invalid hex digest: {0}")]
    InvalidDigest(String),

    #[error("chunk {0} unavailable locally and via every DHT candidate")]
    ChunkUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
