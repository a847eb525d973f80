//! Central packet state machine: parse the header, verify the checksum,
//! dispatch by message type to the relevant handler, and always return the
//! rented buffer to the pool (spec.md §4.2).

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::buffer_pool::BufferPool;
use crate::dht::{DhtService, FetchOutcome};
use crate::error::NetworkError;
use crate::framing::{encode_frame, Header, MessageType};
use crate::handshake::HandshakeHandler;
use crate::onion::{peel_layer, PeelOutcome};
use crate::peer_table::PeerTable;
use crate::request_ledger::RequestLedger;
use lib_crypto::X25519KeyPair;

/// An inbound packet as read from the transport collaborator: the origin
/// endpoint and the buffer-pool-owned bytes (header followed by payload).
pub struct InboundPacket {
    pub origin: SocketAddr,
    pub bytes: Vec<u8>,
}

/// A framed message ready to hand back to the transport collaborator for
/// delivery to `destination`.
pub struct OutboundPacket {
    pub destination: SocketAddr,
    pub frame: Vec<u8>,
}

pub struct PacketDispatcher {
    buffer_pool: Arc<BufferPool>,
    peer_table: Arc<PeerTable>,
    request_ledger: Arc<RequestLedger>,
    dht: Arc<DhtService>,
    local_onion_key: Arc<X25519KeyPair>,
    clock_skew_ms: u64,
}

impl PacketDispatcher {
    pub fn new(
        buffer_pool: Arc<BufferPool>,
        peer_table: Arc<PeerTable>,
        request_ledger: Arc<RequestLedger>,
        dht: Arc<DhtService>,
        local_onion_key: Arc<X25519KeyPair>,
        clock_skew_ms: u64,
    ) -> Self {
        Self { buffer_pool, peer_table, request_ledger, dht, local_onion_key, clock_skew_ms }
    }

    /// Process one inbound packet, returning zero or more outbound packets
    /// produced in response. The incoming buffer is always released back to
    /// the pool before returning, even when handling fails.
    pub async fn handle_packet(&self, packet: InboundPacket) -> Vec<OutboundPacket> {
        let outcome = self.dispatch(packet.origin, &packet.bytes).await;
        self.buffer_pool.release(packet.bytes);
        match outcome {
            Ok(outbound) => outbound,
            Err(err) => {
                warn!(origin = %packet.origin, error = %err, "dropping inbound packet");
                Vec::new()
            }
        }
    }

    async fn dispatch(&self, origin: SocketAddr, bytes: &[u8]) -> Result<Vec<OutboundPacket>, NetworkError> {
        let header = Header::decode(bytes)?;
        let payload = &bytes[crate::framing::HEADER_LEN..];
        header.verify_payload(payload)?;

        match header.message_type {
            MessageType::Handshake => self.handle_handshake(origin, payload),
            MessageType::OnionLayer => self.handle_onion(payload).await,
            MessageType::FindNodeRequest => self.handle_find_node_request(origin, header.request_id, payload),
            MessageType::FindNodeResponse | MessageType::GetValueResponse | MessageType::FetchResponse | MessageType::FetchNotFound => {
                self.request_ledger.complete(header.request_id, payload.to_vec());
                Ok(Vec::new())
            }
            MessageType::StoreRequest => self.handle_store_request(origin, header.request_id, payload).await,
            MessageType::StoreResponse => {
                self.request_ledger.complete(header.request_id, payload.to_vec());
                Ok(Vec::new())
            }
            MessageType::FetchRequest => self.handle_fetch_request(origin, header.request_id, payload).await,
            MessageType::PutValue => {
                self.dht.handle_put_value(payload);
                Ok(Vec::new())
            }
            MessageType::GetValueRequest => self.handle_get_value_request(origin, header.request_id, payload),
        }
    }

    fn handle_handshake(&self, origin: SocketAddr, payload: &[u8]) -> Result<Vec<OutboundPacket>, NetworkError> {
        let handshake_payload = crate::framing::HandshakePayload::decode(payload)?;
        let handler = HandshakeHandler::new(&self.peer_table, self.clock_skew_ms);
        handler.handle(origin, &handshake_payload)?;
        Ok(Vec::new())
    }

    async fn handle_onion(&self, payload: &[u8]) -> Result<Vec<OutboundPacket>, NetworkError> {
        match peel_layer(&self.local_onion_key, payload)? {
            PeelOutcome::Terminal(message) => {
                debug!(len = message.len(), "onion circuit terminated at this node");
                Ok(Vec::new())
            }
            PeelOutcome::Relay { next_hop, payload } => {
                let frame = encode_frame(MessageType::OnionLayer, 0, &payload);
                Ok(vec![OutboundPacket { destination: next_hop, frame }])
            }
        }
    }

    fn handle_find_node_request(
        &self,
        origin: SocketAddr,
        request_id: u32,
        payload: &[u8],
    ) -> Result<Vec<OutboundPacket>, NetworkError> {
        if payload.len() != 32 {
            return Err(NetworkError::MalformedFrame("FIND_NODE request payload must be 32 bytes".into()));
        }
        let mut target = [0u8; 32];
        target.copy_from_slice(payload);
        let response_payload = self.dht.handle_find_node_request(origin, target)?;
        let frame = encode_frame(MessageType::FindNodeResponse, request_id, &response_payload);
        Ok(vec![OutboundPacket { destination: origin, frame }])
    }

    async fn handle_store_request(
        &self,
        origin: SocketAddr,
        request_id: u32,
        payload: &[u8],
    ) -> Result<Vec<OutboundPacket>, NetworkError> {
        let digest = self.dht.handle_store_request(payload).await?;
        let frame = encode_frame(MessageType::StoreResponse, request_id, &digest);
        Ok(vec![OutboundPacket { destination: origin, frame }])
    }

    async fn handle_fetch_request(
        &self,
        origin: SocketAddr,
        request_id: u32,
        payload: &[u8],
    ) -> Result<Vec<OutboundPacket>, NetworkError> {
        match self.dht.handle_fetch_request(payload).await? {
            FetchOutcome::Found(plaintext) => {
                let frame = encode_frame(MessageType::FetchResponse, request_id, &plaintext);
                Ok(vec![OutboundPacket { destination: origin, frame }])
            }
            FetchOutcome::NotFound(digest) => {
                let frame = encode_frame(MessageType::FetchNotFound, request_id, &digest);
                Ok(vec![OutboundPacket { destination: origin, frame }])
            }
            FetchOutcome::TooLarge => {
                warn!(origin = %origin, "FETCH matched a blob larger than fetch_max_payload_bytes, dropping");
                Ok(Vec::new())
            }
        }
    }

    fn handle_get_value_request(
        &self,
        origin: SocketAddr,
        request_id: u32,
        payload: &[u8],
    ) -> Result<Vec<OutboundPacket>, NetworkError> {
        match self.dht.handle_get_value_request(payload)? {
            Some(response_payload) => {
                let frame = encode_frame(MessageType::GetValueResponse, request_id, &response_payload);
                Ok(vec![OutboundPacket { destination: origin, frame }])
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::dht::OutgoingSink;
    use crate::framing::FindNodeResponse;
    use crate::mutable_record::MutableRecordStore;
    use crate::routing_table::RoutingTable;
    use async_trait::async_trait;
    use lib_identity::NodeId;
    use lib_storage::BlobStore;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct NullSink;
    #[async_trait]
    impl OutgoingSink for NullSink {
        async fn send(&self, _endpoint: SocketAddr, _frame: Vec<u8>) {}
    }

    async fn dispatcher() -> PacketDispatcher {
        let local_id = NodeId::from_bytes([0u8; 32]);
        let routing_table = Arc::new(RoutingTable::new(local_id));
        let peer_table = Arc::new(PeerTable::new());
        let request_ledger = Arc::new(RequestLedger::new());
        let mutable_records = Arc::new(MutableRecordStore::new());
        let dir = tempdir().unwrap();
        let blob_store = Arc::new(BlobStore::open(dir.path(), [0x33u8; 32]).await.unwrap());
        let dht = Arc::new(DhtService::new(
            local_id,
            routing_table,
            peer_table.clone(),
            request_ledger.clone(),
            mutable_records,
            blob_store,
            Arc::new(NullSink),
            NodeConfig::default(),
        ));
        PacketDispatcher::new(
            Arc::new(BufferPool::new()),
            peer_table,
            request_ledger,
            dht,
            Arc::new(X25519KeyPair::generate()),
            60_000,
        )
    }

    #[tokio::test]
    async fn scenario_handshake_registers_peer() {
        let dispatcher = dispatcher().await;
        let (identity_pub, identity_sec) = lib_crypto::ed25519_keypair();
        let onion = X25519KeyPair::generate();
        let mut identity_pub_arr = [0u8; 32];
        identity_pub_arr.copy_from_slice(&identity_pub);

        let handshake = crate::handshake::build_outgoing_handshake(identity_pub_arr, *onion.public.as_bytes(), &identity_sec).unwrap();
        let frame = encode_frame(MessageType::Handshake, 0, &handshake.encode());
        let origin: SocketAddr = "127.0.0.1:40321".parse().unwrap();

        let outbound = dispatcher.handle_packet(InboundPacket { origin, bytes: frame }).await;
        assert!(outbound.is_empty());
        assert!(dispatcher.peer_table.is_authenticated(&origin));
    }

    #[tokio::test]
    async fn scenario_find_node_elicits_0x04_response() {
        let dispatcher = dispatcher().await;
        let mut contact_bytes = [0u8; 32];
        contact_bytes[0] = 0x99;
        let contact_id = NodeId::from_bytes(contact_bytes);
        let contact_endpoint: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        dispatcher.dht.routing_table_for_test().add_contact(contact_id, contact_endpoint);

        let origin: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let frame = encode_frame(MessageType::FindNodeRequest, 0, &contact_bytes);

        let outbound = dispatcher.handle_packet(InboundPacket { origin, bytes: frame }).await;
        assert_eq!(outbound.len(), 1);
        let response_header = Header::decode(&outbound[0].frame).unwrap();
        assert_eq!(response_header.message_type, MessageType::FindNodeResponse);
        let response_payload = &outbound[0].frame[crate::framing::HEADER_LEN..];
        let decoded = FindNodeResponse::decode(response_payload).unwrap();
        assert_eq!(decoded.contacts[0].node_id, contact_bytes);
    }

    #[tokio::test]
    async fn fetch_request_for_unknown_digest_yields_fetch_not_found() {
        let dispatcher = dispatcher().await;
        let origin: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let frame = encode_frame(MessageType::FetchRequest, 7, &[5u8; 32]);
        let outbound = dispatcher.handle_packet(InboundPacket { origin, bytes: frame }).await;
        assert_eq!(outbound.len(), 1);
        let response_header = Header::decode(&outbound[0].frame).unwrap();
        assert_eq!(response_header.message_type, MessageType::FetchNotFound);
        assert_eq!(response_header.request_id, 7);
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_without_panicking() {
        let dispatcher = dispatcher().await;
        let origin: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let outbound = dispatcher.handle_packet(InboundPacket { origin, bytes: vec![0u8; 3] }).await;
        assert!(outbound.is_empty());
    }
}
