use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read identity key from {path}: {source}")]
    ReadFailed { path: String, source: std::io::Error },

    #[error("failed to persist identity key to {path}: {source}")]
    WriteFailed { path: String, source: std::io::Error },

    #[error("identity.key at {path} is malformed: expected 32 bytes, got {actual}")]
    MalformedKeyFile { path: String, actual: usize },
}
