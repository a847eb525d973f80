//! Kademlia DHT service: FIND_NODE handler, iterative parallel lookup,
//! PUT_VALUE/GET_VALUE of signed mutable records, bootstrap, and the
//! STORE/FETCH handlers that bridge into the blob store (spec.md §4.9-§4.10,
//! §4.12 "DHT service").

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use lib_identity::NodeId;
use lib_storage::{BlobStore, ChunkFetcher, ChunkPublisher};
use tracing::{debug, warn};

use crate::config::NodeConfig;
use crate::framing::{ContactRecord, FindNodeResponse, MessageType, MutableRecordWire};
use crate::mutable_record::{verify_record, MutableRecordStore};
use crate::onion::{decode_ip, encode_ip};
use crate::peer_table::PeerTable;
use crate::request_ledger::RequestLedger;
use crate::routing_table::{Contact, RoutingTable};
use crate::NetworkError;

const FIND_NODE_TIMEOUT: Duration = Duration::from_secs(5);
const GET_VALUE_TIMEOUT: Duration = Duration::from_secs(3);

/// Seam to the outgoing-message queue the transport collaborator drains.
/// Implemented by whatever owns the QUIC connection pool; the DHT service
/// only ever enqueues framed bytes addressed to an endpoint.
#[async_trait]
pub trait OutgoingSink: Send + Sync {
    async fn send(&self, endpoint: SocketAddr, frame: Vec<u8>);
}

pub struct DhtService {
    local_id: NodeId,
    routing_table: Arc<RoutingTable>,
    peer_table: Arc<PeerTable>,
    request_ledger: Arc<RequestLedger>,
    mutable_records: Arc<MutableRecordStore>,
    blob_store: Arc<BlobStore>,
    outgoing: Arc<dyn OutgoingSink>,
    config: NodeConfig,
}

impl DhtService {
    pub fn new(
        local_id: NodeId,
        routing_table: Arc<RoutingTable>,
        peer_table: Arc<PeerTable>,
        request_ledger: Arc<RequestLedger>,
        mutable_records: Arc<MutableRecordStore>,
        blob_store: Arc<BlobStore>,
        outgoing: Arc<dyn OutgoingSink>,
        config: NodeConfig,
    ) -> Self {
        Self { local_id, routing_table, peer_table, request_ledger, mutable_records, blob_store, outgoing, config }
    }

    /// Handle an inbound FIND_NODE request (0x03). `origin`'s node is added
    /// to the routing table if it is an authenticated peer. Returns the
    /// encoded FIND_NODE response (0x04) payload.
    pub fn handle_find_node_request(&self, origin: SocketAddr, target: [u8; 32]) -> Result<Vec<u8>, NetworkError> {
        if let Some(onion_key) = self.peer_table.try_get_onion_key(&origin) {
            let origin_id = NodeId::from_onion_public_key(&onion_key);
            self.routing_table.add_contact(origin_id, origin);
        }

        let target_id = NodeId::from_bytes(target);
        let closest = self.routing_table.find_closest(&target_id, self.config.k);
        let contacts = closest.into_iter().map(contact_to_record).collect();
        FindNodeResponse { contacts }.encode()
    }

    /// Exposes the routing table for pre-populating test fixtures; outside
    /// `#[cfg(test)]` callers go through the handlers above.
    #[doc(hidden)]
    pub fn routing_table_for_test(&self) -> &RoutingTable {
        &self.routing_table
    }

    /// Issue a FIND_NODE request to `endpoint` and await its response,
    /// decoding the returned contact list.
    async fn request_find_node(&self, endpoint: SocketAddr, target: &NodeId) -> Result<Vec<Contact>, NetworkError> {
        let request_id = self.request_ledger.next_id();
        let frame = crate::framing::encode_frame(MessageType::FindNodeRequest, request_id, target.as_bytes());
        self.outgoing.send(endpoint, frame).await;
        let response_payload = self.request_ledger.register(request_id, FIND_NODE_TIMEOUT).await?;
        let response = FindNodeResponse::decode(&response_payload)?;
        Ok(response
            .contacts
            .into_iter()
            .filter_map(|record| record_to_contact(&record))
            .collect())
    }

    /// Iterative parallel lookup toward `target`: seed with the closest
    /// locally-known contacts, then repeatedly query the three closest
    /// unvisited contacts in parallel, absorbing newly-seen contacts, until
    /// no further progress is possible.
    pub async fn lookup(&self, target: NodeId) -> Vec<Contact> {
        let mut shortlist = self.routing_table.find_closest(&target, self.config.k);
        let mut visited: HashSet<NodeId> = HashSet::new();

        loop {
            let candidates: Vec<Contact> = shortlist
                .iter()
                .filter(|c| !visited.contains(&c.node_id))
                .take(self.config.alpha)
                .cloned()
                .collect();
            if candidates.is_empty() {
                break;
            }
            for candidate in &candidates {
                visited.insert(candidate.node_id);
            }

            let responses = join_all(candidates.iter().map(|c| self.request_find_node(c.endpoint, &target))).await;

            let mut discovered_any = false;
            for result in responses {
                let Ok(contacts) = result else { continue };
                for contact in contacts {
                    if contact.node_id == self.local_id {
                        continue;
                    }
                    if !shortlist.iter().any(|existing| existing.node_id == contact.node_id) {
                        shortlist.push(contact);
                        discovered_any = true;
                    }
                }
            }

            shortlist.sort_by_key(|c| c.node_id.xor_distance(&target));
            shortlist.truncate(self.config.k);

            if !discovered_any {
                break;
            }
        }

        shortlist
    }

    /// Sign and publish a mutable record: lookup the owner's target ID, PUT
    /// to the closest `dht_replication_for_records` nodes fire-and-forget.
    pub async fn put_value(&self, record: MutableRecordWire) -> Result<(), NetworkError> {
        if !verify_record(&record) {
            return Err(NetworkError::InvalidSignature);
        }
        let target = NodeId::from_bytes(lib_crypto::sha256(&record.owner_pub));
        let closest = self.lookup(target).await;
        let payload = record.encode()?;

        for contact in closest.into_iter().take(self.config.dht_replication_for_records) {
            let frame = crate::framing::encode_frame(MessageType::PutValue, 0, &payload);
            self.outgoing.send(contact.endpoint, frame).await;
        }
        Ok(())
    }

    /// Look up the closest nodes to `owner_pub`'s target ID and GET the
    /// record from each sequentially, returning the highest valid sequence.
    pub async fn get_value(&self, owner_pub: [u8; 32]) -> Option<MutableRecordWire> {
        let target = NodeId::from_bytes(lib_crypto::sha256(&owner_pub));
        let closest = self.lookup(target).await;

        let mut best: Option<MutableRecordWire> = None;
        for contact in closest {
            let request_id = self.request_ledger.next_id();
            let frame = crate::framing::encode_frame(MessageType::GetValueRequest, request_id, &owner_pub);
            self.outgoing.send(contact.endpoint, frame).await;
            let Ok(response_payload) = self.request_ledger.register(request_id, GET_VALUE_TIMEOUT).await else {
                continue;
            };
            let Ok(record) = MutableRecordWire::decode(&response_payload) else { continue };
            if !verify_record(&record) {
                continue;
            }
            if best.as_ref().map(|b| record.sequence > b.sequence).unwrap_or(true) {
                best = Some(record);
            }
        }
        best
    }

    /// Bootstrap the routing table once at least one externally-injected
    /// contact is known: look up the local node ID.
    pub async fn bootstrap(&self) {
        let local_id = self.local_id;
        self.lookup(local_id).await;
    }

    /// Handle an inbound PUT_VALUE (0x10): verify and, on success, upsert
    /// into the local mutable record store. Failures are dropped silently.
    pub fn handle_put_value(&self, payload: &[u8]) {
        let Ok(record) = MutableRecordWire::decode(payload) else {
            warn!("dropping malformed PUT_VALUE payload");
            return;
        };
        if let Err(err) = self.mutable_records.put(record) {
            debug!(error = %err, "dropping PUT_VALUE");
        }
    }

    /// Handle an inbound GET_VALUE request (0x11): payload is a 32-byte
    /// owner public key. Returns the encoded GET_VALUE response payload.
    pub fn handle_get_value_request(&self, payload: &[u8]) -> Result<Option<Vec<u8>>, NetworkError> {
        if payload.len() != 32 {
            return Err(NetworkError::MalformedFrame("GET_VALUE request payload must be 32 bytes".into()));
        }
        let mut owner_pub = [0u8; 32];
        owner_pub.copy_from_slice(payload);
        match self.mutable_records.get(&owner_pub) {
            Some(record) => Ok(Some(record.encode()?)),
            None => Ok(None),
        }
    }

    /// Handle an inbound STORE request (0x05): payload is the plaintext to
    /// store. Returns the 32-byte digest for the STORE response.
    pub async fn handle_store_request(&self, payload: &[u8]) -> Result<[u8; 32], NetworkError> {
        Ok(self.blob_store.store(payload).await?)
    }

    /// Handle an inbound FETCH request (0x07): payload is a 32-byte digest.
    pub async fn handle_fetch_request(&self, payload: &[u8]) -> Result<FetchOutcome, NetworkError> {
        if payload.len() != 32 {
            return Err(NetworkError::MalformedFrame("FETCH request payload must be 32 bytes".into()));
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(payload);

        if !self.blob_store.has_blob(&digest).await {
            return Ok(FetchOutcome::NotFound(digest));
        }
        match self.blob_store.blob_size(&digest).await {
            Some(size) if size <= self.config.fetch_max_payload_bytes as u64 => {
                match self.blob_store.retrieve_bytes(&digest).await {
                    Some(plaintext) => Ok(FetchOutcome::Found(plaintext)),
                    None => Ok(FetchOutcome::NotFound(digest)),
                }
            }
            _ => Ok(FetchOutcome::TooLarge),
        }
    }

    /// Propagate a chunk (or manifest) to the closest `replication` nodes
    /// as a fire-and-forget STORE, per spec.md §4.9.
    async fn propagate_chunk(&self, digest: [u8; 32], plaintext: &[u8]) {
        let target = NodeId::from_bytes(digest);
        let closest = self.lookup(target).await;
        for contact in closest.into_iter().take(self.config.replication) {
            let frame = crate::framing::encode_frame(MessageType::StoreRequest, 0, plaintext);
            self.outgoing.send(contact.endpoint, frame).await;
        }
    }

    /// Fetch a chunk from the DHT: lookup candidates holding `digest`,
    /// issue FETCH to each in turn until one serves it.
    async fn fetch_remote_chunk(&self, digest: [u8; 32]) -> Option<Vec<u8>> {
        let target = NodeId::from_bytes(digest);
        let closest = self.lookup(target).await;
        for contact in closest {
            let request_id = self.request_ledger.next_id();
            let frame = crate::framing::encode_frame(MessageType::FetchRequest, request_id, &digest);
            self.outgoing.send(contact.endpoint, frame).await;
            if let Ok(response_payload) = self.request_ledger.register(request_id, FIND_NODE_TIMEOUT).await {
                return Some(response_payload);
            }
        }
        None
    }
}

/// Outcome of an inbound FETCH request, before the dispatcher frames it.
pub enum FetchOutcome {
    Found(Vec<u8>),
    NotFound([u8; 32]),
    /// Blob exists but exceeds `fetch_max_payload_bytes`; spec.md leaves the
    /// response for this case undefined, so the dispatcher logs and drops.
    TooLarge,
}

#[async_trait]
impl ChunkPublisher for DhtService {
    async fn publish_chunk(&self, digest: [u8; 32], plaintext: &[u8]) {
        self.propagate_chunk(digest, plaintext).await;
    }
}

#[async_trait]
impl ChunkFetcher for DhtService {
    async fn fetch_chunk(&self, digest: [u8; 32]) -> Option<Vec<u8>> {
        self.fetch_remote_chunk(digest).await
    }
}

fn contact_to_record(contact: Contact) -> ContactRecord {
    ContactRecord { node_id: *contact.node_id.as_bytes(), ip: encode_ip(contact.endpoint.ip()), port: contact.endpoint.port() }
}

fn record_to_contact(record: &ContactRecord) -> Option<Contact> {
    let ip = decode_ip(&record.ip).ok()?;
    Some(Contact {
        node_id: NodeId::from_bytes(record.node_id),
        endpoint: SocketAddr::new(ip, record.port),
        last_seen: 0,
    })
}
