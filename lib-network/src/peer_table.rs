//! Authenticated peer registry keyed by network endpoint (spec.md §3 "Peer
//! table"). Only peers that completed a valid handshake carry key material.

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

const INITIAL_REPUTATION: u8 = 50;

#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub last_seen: u64,
    pub reputation: u8,
    pub onion_key: Option<[u8; 32]>,
    pub identity_key: Option<[u8; 32]>,
}

fn now_unix_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

pub struct PeerTable {
    peers: DashMap<SocketAddr, PeerEntry>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self { peers: DashMap::new() }
    }

    /// Upsert a peer that just completed a valid handshake. Reputation is
    /// initialized to 50 only the first time a peer is seen; later
    /// handshakes from the same endpoint only refresh keys and `last_seen`.
    pub fn upsert_authenticated(&self, endpoint: SocketAddr, identity_key: [u8; 32], onion_key: [u8; 32]) {
        self.peers
            .entry(endpoint)
            .and_modify(|entry| {
                entry.identity_key = Some(identity_key);
                entry.onion_key = Some(onion_key);
                entry.last_seen = now_unix_ms();
            })
            .or_insert_with(|| PeerEntry {
                last_seen: now_unix_ms(),
                reputation: INITIAL_REPUTATION,
                onion_key: Some(onion_key),
                identity_key: Some(identity_key),
            });
    }

    pub fn get(&self, endpoint: &SocketAddr) -> Option<PeerEntry> {
        self.peers.get(endpoint).map(|entry| entry.clone())
    }

    pub fn is_authenticated(&self, endpoint: &SocketAddr) -> bool {
        self.peers.get(endpoint).map(|entry| entry.identity_key.is_some()).unwrap_or(false)
    }

    pub fn try_get_onion_key(&self, endpoint: &SocketAddr) -> Option<[u8; 32]> {
        self.peers.get(endpoint).and_then(|entry| entry.onion_key)
    }

    pub fn touch(&self, endpoint: &SocketAddr) {
        if let Some(mut entry) = self.peers.get_mut(endpoint) {
            entry.last_seen = now_unix_ms();
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}
