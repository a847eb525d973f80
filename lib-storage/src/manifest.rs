//! The small JSON object that enumerates a file's ordered chunk digests.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifest {
    pub file_name: String,
    pub content_type: String,
    pub total_size: u64,
    pub chunks: Vec<String>,
}

impl FileManifest {
    pub fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("FileManifest always serializes")
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
