use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("checksum mismatch: header declared {declared:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { declared: u32, computed: u32 },

    #[error("stale handshake: timestamp {timestamp_ms} differs from local clock by more than the allowed skew")]
    StaleHandshake { timestamp_ms: u64 },

    #[error("handshake signature does not verify")]
    InvalidSignature,

    #[error("malformed onion payload: {0}")]
    MalformedOnion(String),

    #[error("mutable record sequence {sequence} does not exceed the stored value for this owner")]
    StaleSequence { sequence: u64 },

    #[error("AEAD decryption failed")]
    DecryptFailure,

    #[error("blob {0} not found")]
    BlobNotFound(String),

    #[error("blob exceeds the allowed size")]
    BlobTooLarge,

    #[error("request {0} timed out")]
    RequestTimeout(u32),

    #[error("manifest could not be parsed: {0}")]
    ManifestParseError(String),

    #[error("chunk {0} unavailable locally and via every DHT candidate")]
    ChunkUnavailable(String),

    #[error("outbound queue closed")]
    QueueClosed,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<lib_storage::StorageError> for NetworkError {
    fn from(err: lib_storage::StorageError) -> Self {
        match err {
            lib_storage::StorageError::BlobNotFound(digest) => NetworkError::BlobNotFound(digest),
            lib_storage::StorageError::BlobTooLarge => NetworkError::BlobTooLarge,
            lib_storage::StorageError::ChunkUnavailable(digest) => NetworkError::ChunkUnavailable(digest),
            lib_storage::StorageError::ManifestParseError(source) => {
                NetworkError::ManifestParseError(source.to_string())
            }
            other => NetworkError::ManifestParseError(other.to_string()),
        }
    }
}
