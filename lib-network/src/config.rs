//! Node configuration surface (spec.md §6 "Configuration"). The listener,
//! seed dial, and interactive shell that consume `port`/`seed_port`/`debug`
//! are external collaborators; this struct only exposes the settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub port: u16,
    pub seed_port: Option<u16>,
    pub debug: bool,
    pub data_dir: PathBuf,

    pub aead_nonce_length: usize,
    pub aead_tag_length: usize,
    pub chunk_size: usize,
    pub k: usize,
    pub alpha: usize,
    pub replication: usize,
    pub dht_replication_for_records: usize,
    pub handshake_clock_skew_ms: u64,
    pub max_payload_bytes: usize,
    pub fetch_max_payload_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: 0,
            seed_port: None,
            debug: false,
            data_dir: PathBuf::from("."),

            aead_nonce_length: 12,
            aead_tag_length: 16,
            chunk_size: 262_144,
            k: 20,
            alpha: 3,
            replication: 3,
            dht_replication_for_records: 5,
            handshake_clock_skew_ms: 60_000,
            max_payload_bytes: 5 * 1024 * 1024,
            fetch_max_payload_bytes: 10 * 1024 * 1024,
        }
    }
}
