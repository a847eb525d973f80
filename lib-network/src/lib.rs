//! Wire framing, Kademlia routing, the onion relay transport, and the DHT
//! service for the overlay node (spec.md §3-§4). This crate owns the
//! protocol engine: the packet dispatcher that drives the node from wire
//! bytes through cryptographic verification, onion peeling, DHT routing,
//! and blob storage, together with the routing table, request ledger, peer
//! table, and buffer pool these handlers mutate.
//!
//! The QUIC transport listener and connection pool, TLS certificate
//! generation, the interactive shell, and process bootstrap are external
//! collaborators that consume and produce the [`dispatcher::InboundPacket`]
//! / [`dispatcher::OutboundPacket`] types this crate defines.

pub mod buffer_pool;
pub mod config;
pub mod dht;
pub mod dispatcher;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod mutable_record;
pub mod onion;
pub mod peer_table;
pub mod request_ledger;
pub mod routing_table;

pub use buffer_pool::BufferPool;
pub use config::NodeConfig;
pub use dht::{DhtService, FetchOutcome, OutgoingSink};
pub use dispatcher::{InboundPacket, OutboundPacket, PacketDispatcher};
pub use error::NetworkError;
pub use framing::{
    encode_frame, ContactRecord, FindNodeResponse, Header, HandshakePayload, MessageType, MutableRecordWire,
    HANDSHAKE_PAYLOAD_LEN, HANDSHAKE_SIGNABLE_LEN, HEADER_LEN, PROTOCOL_VERSION,
};
pub use handshake::{build_outgoing_handshake, HandshakeHandler};
pub use mutable_record::{sign_record, verify_record, MutableRecordStore};
pub use onion::{build_onion, peel_layer, Hop, PeelOutcome};
pub use peer_table::{PeerEntry, PeerTable};
pub use request_ledger::RequestLedger;
pub use routing_table::{Contact, RoutingTable};
