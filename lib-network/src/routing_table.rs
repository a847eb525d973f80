//! Kademlia-style routing table: 256 k-buckets (k=20) indexed by the
//! position of the highest differing bit, LRU ordered within a bucket
//! (spec.md §3 "Routing table", §4.7).

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use lib_identity::NodeId;
use parking_lot::RwLock;

pub const BUCKET_COUNT: usize = 256;
pub const BUCKET_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub node_id: NodeId,
    pub endpoint: SocketAddr,
    pub last_seen: u64,
}

fn now_unix_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

pub struct RoutingTable {
    local_id: NodeId,
    buckets: Vec<RwLock<VecDeque<Contact>>>,
}

impl RoutingTable {
    pub fn new(local_id: NodeId) -> Self {
        let buckets = (0..BUCKET_COUNT).map(|_| RwLock::new(VecDeque::new())).collect();
        Self { local_id, buckets }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    /// Insert or refresh a contact. A bucket at capacity discards the new
    /// contact (spec.md §9 open question 3: the MVP is permitted to do
    /// this rather than pinging the head over a live transport, which is
    /// out of scope here). [`mark_stale`] lets an external transport layer
    /// evict a head contact once it can confirm liveness itself.
    pub fn add_contact(&self, node_id: NodeId, endpoint: SocketAddr) {
        if node_id == self.local_id {
            return;
        }
        let Some(index) = self.local_id.bucket_index(&node_id) else { return };
        let mut bucket = self.buckets[index as usize].write();
        if let Some(pos) = bucket.iter().position(|c| c.node_id == node_id) {
            let mut contact = bucket.remove(pos).unwrap();
            contact.endpoint = endpoint;
            contact.last_seen = now_unix_ms();
            bucket.push_back(contact);
            return;
        }
        if bucket.len() < BUCKET_CAPACITY {
            bucket.push_back(Contact { node_id, endpoint, last_seen: now_unix_ms() });
        }
        // bucket full: discard, per the MVP eviction policy.
    }

    /// Evict the head (oldest) contact of the bucket `node_id` would fall
    /// into, for use by a transport that has independently confirmed it is
    /// unresponsive. A no-op if the bucket is empty or `node_id` is local.
    pub fn mark_stale(&self, node_id: &NodeId) {
        let Some(index) = self.local_id.bucket_index(node_id) else { return };
        let mut bucket = self.buckets[index as usize].write();
        bucket.pop_front();
    }

    pub fn find_closest(&self, target: &NodeId, n: usize) -> Vec<Contact> {
        let mut all: Vec<Contact> = Vec::new();
        for bucket in &self.buckets {
            all.extend(bucket.read().iter().cloned());
        }
        all.sort_by_key(|contact| contact.node_id.xor_distance(target));
        all.truncate(n);
        all
    }

    pub fn contact_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.read().len()).sum()
    }
}
