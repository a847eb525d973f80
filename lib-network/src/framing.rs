//! Fixed 16-byte frame header and the typed payload codecs (handshake,
//! FIND_NODE response, mutable record) defined in spec.md §4.1.

use crate::error::NetworkError;

pub const HEADER_LEN: usize = 16;
pub const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Handshake = 0x01,
    OnionLayer = 0x02,
    FindNodeRequest = 0x03,
    FindNodeResponse = 0x04,
    StoreRequest = 0x05,
    StoreResponse = 0x06,
    FetchRequest = 0x07,
    FetchResponse = 0x08,
    /// Not in spec.md's original opcode table: the negative FETCH response
    /// spec.md §9 open question 2 calls for, so a missing blob gets a
    /// reply instead of being silently dropped.
    FetchNotFound = 0x09,
    PutValue = 0x10,
    GetValueRequest = 0x11,
    GetValueResponse = 0x12,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use MessageType::*;
        match value {
            0x01 => Some(Handshake),
            0x02 => Some(OnionLayer),
            0x03 => Some(FindNodeRequest),
            0x04 => Some(FindNodeResponse),
            0x05 => Some(StoreRequest),
            0x06 => Some(StoreResponse),
            0x07 => Some(FetchRequest),
            0x08 => Some(FetchResponse),
            0x09 => Some(FetchNotFound),
            0x10 => Some(PutValue),
            0x11 => Some(GetValueRequest),
            0x12 => Some(GetValueResponse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub flags: u8,
    pub message_type: MessageType,
    pub reserved: u8,
    pub request_id: u32,
    pub payload_len: u32,
    pub checksum: u32,
}

impl Header {
    pub fn new(message_type: MessageType, request_id: u32, payload: &[u8]) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flags: 0,
            message_type,
            reserved: 0,
            request_id,
            payload_len: payload.len() as u32,
            checksum: lib_crypto::crc32(payload),
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.version;
        out[1] = self.flags;
        out[2] = self.message_type as u8;
        out[3] = self.reserved;
        out[4..8].copy_from_slice(&self.request_id.to_be_bytes());
        out[8..12].copy_from_slice(&self.payload_len.to_be_bytes());
        out[12..16].copy_from_slice(&self.checksum.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        if bytes.len() < HEADER_LEN {
            return Err(NetworkError::MalformedFrame(format!(
                "header requires {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let message_type = MessageType::from_u8(bytes[2])
            .ok_or_else(|| NetworkError::MalformedFrame(format!("unknown message type {:#04x}", bytes[2])))?;
        Ok(Self {
            version: bytes[0],
            flags: bytes[1],
            message_type,
            reserved: bytes[3],
            request_id: u32::from_be_bytes(bytes[4..8].try_into().unwrap()),
            payload_len: u32::from_be_bytes(bytes[8..12].try_into().unwrap()),
            checksum: u32::from_be_bytes(bytes[12..16].try_into().unwrap()),
        })
    }

    /// Verify `payload` against this header's declared length and checksum.
    pub fn verify_payload(&self, payload: &[u8]) -> Result<(), NetworkError> {
        if payload.len() != self.payload_len as usize {
            return Err(NetworkError::MalformedFrame(format!(
                "declared payload length {} does not match actual {}",
                self.payload_len,
                payload.len()
            )));
        }
        let computed = lib_crypto::crc32(payload);
        if computed != self.checksum {
            return Err(NetworkError::ChecksumMismatch { declared: self.checksum, computed });
        }
        Ok(())
    }
}

/// Frame a header followed by its payload into one byte string.
pub fn encode_frame(message_type: MessageType, request_id: u32, payload: &[u8]) -> Vec<u8> {
    let header = Header::new(message_type, request_id, payload);
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    out
}

pub const HANDSHAKE_PAYLOAD_LEN: usize = 136;
pub const HANDSHAKE_SIGNABLE_LEN: usize = 72;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePayload {
    pub identity_key: [u8; 32],
    pub onion_key: [u8; 32],
    pub timestamp_ms: u64,
    pub signature: [u8; 64],
}

impl HandshakePayload {
    pub fn encode(&self) -> [u8; HANDSHAKE_PAYLOAD_LEN] {
        let mut out = [0u8; HANDSHAKE_PAYLOAD_LEN];
        out[0..32].copy_from_slice(&self.identity_key);
        out[32..64].copy_from_slice(&self.onion_key);
        out[64..72].copy_from_slice(&self.timestamp_ms.to_be_bytes());
        out[72..136].copy_from_slice(&self.signature);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        if bytes.len() != HANDSHAKE_PAYLOAD_LEN {
            return Err(NetworkError::MalformedFrame(format!(
                "handshake payload must be {HANDSHAKE_PAYLOAD_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut identity_key = [0u8; 32];
        identity_key.copy_from_slice(&bytes[0..32]);
        let mut onion_key = [0u8; 32];
        onion_key.copy_from_slice(&bytes[32..64]);
        let timestamp_ms = u64::from_be_bytes(bytes[64..72].try_into().unwrap());
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[72..136]);
        Ok(Self { identity_key, onion_key, timestamp_ms, signature })
    }

    /// The 72-byte prefix the signature covers.
    pub fn signable_prefix(&self) -> [u8; HANDSHAKE_SIGNABLE_LEN] {
        let mut out = [0u8; HANDSHAKE_SIGNABLE_LEN];
        out[0..32].copy_from_slice(&self.identity_key);
        out[32..64].copy_from_slice(&self.onion_key);
        out[64..72].copy_from_slice(&self.timestamp_ms.to_be_bytes());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub node_id: [u8; 32],
    pub ip: Vec<u8>,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindNodeResponse {
    pub contacts: Vec<ContactRecord>,
}

impl FindNodeResponse {
    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        if self.contacts.len() > u8::MAX as usize {
            return Err(NetworkError::MalformedFrame("too many contacts for a single FIND_NODE response".into()));
        }
        let mut out = Vec::new();
        out.push(self.contacts.len() as u8);
        for contact in &self.contacts {
            if contact.ip.len() > u8::MAX as usize {
                return Err(NetworkError::MalformedFrame("contact IP too long".into()));
            }
            out.extend_from_slice(&contact.node_id);
            out.push(contact.ip.len() as u8);
            out.extend_from_slice(&contact.ip);
            out.extend_from_slice(&contact.port.to_be_bytes());
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        if bytes.is_empty() {
            return Err(NetworkError::MalformedFrame("FIND_NODE response missing count byte".into()));
        }
        let count = bytes[0] as usize;
        let mut offset = 1;
        let mut contacts = Vec::with_capacity(count);
        for _ in 0..count {
            if bytes.len() < offset + 32 + 1 {
                return Err(NetworkError::MalformedFrame("truncated FIND_NODE response".into()));
            }
            let mut node_id = [0u8; 32];
            node_id.copy_from_slice(&bytes[offset..offset + 32]);
            offset += 32;
            let ip_len = bytes[offset] as usize;
            offset += 1;
            if bytes.len() < offset + ip_len + 2 {
                return Err(NetworkError::MalformedFrame("truncated FIND_NODE response contact".into()));
            }
            let ip = bytes[offset..offset + ip_len].to_vec();
            offset += ip_len;
            let port = u16::from_be_bytes(bytes[offset..offset + 2].try_into().unwrap());
            offset += 2;
            contacts.push(ContactRecord { node_id, ip, port });
        }
        Ok(Self { contacts })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutableRecordWire {
    pub owner_pub: [u8; 32],
    pub sequence: u64,
    pub signature: [u8; 64],
    pub value: Vec<u8>,
}

impl MutableRecordWire {
    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        if self.value.len() > u16::MAX as usize {
            return Err(NetworkError::MalformedFrame("mutable record value too long".into()));
        }
        let mut out = Vec::with_capacity(32 + 8 + 64 + 2 + self.value.len());
        out.extend_from_slice(&self.owner_pub);
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&(self.value.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.value);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        const FIXED_LEN: usize = 32 + 8 + 64 + 2;
        if bytes.len() < FIXED_LEN {
            return Err(NetworkError::MalformedFrame("truncated mutable record".into()));
        }
        let mut owner_pub = [0u8; 32];
        owner_pub.copy_from_slice(&bytes[0..32]);
        let sequence = u64::from_be_bytes(bytes[32..40].try_into().unwrap());
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[40..104]);
        let value_len = u16::from_be_bytes(bytes[104..106].try_into().unwrap()) as usize;
        if bytes.len() != FIXED_LEN + value_len {
            return Err(NetworkError::MalformedFrame("mutable record value length mismatch".into()));
        }
        let value = bytes[FIXED_LEN..].to_vec();
        Ok(Self { owner_pub, sequence, signature, value })
    }

    /// The bytes the owner's signature covers: `sequence (8 BE) || value`.
    pub fn signable(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.value.len());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.value);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_all_fields() {
        let payload = vec![1, 2, 3, 4, 5];
        let header = Header::new(MessageType::Handshake, 42, &payload);
        let encoded = header.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn scenario_header_round_trip_with_known_crc32() {
        let payload = [0x10u8, 0x20, 0x30, 0x40];
        let header = Header::new(MessageType::Handshake, 0x1234_5678, &payload);
        let encoded = header.encode();
        let expected: [u8; HEADER_LEN] = [
            0x01, 0x00, 0x01, 0x00, 0x12, 0x34, 0x56, 0x78, 0x00, 0x00, 0x00, 0x04, 0x3D, 0x4B, 0x1F, 0x52,
        ];
        assert_eq!(encoded, expected);
        assert_eq!(header.checksum, 0x3D4B_1F52);
    }

    #[test]
    fn checksum_mismatch_is_detected() {
        let payload = b"payload";
        let header = Header::new(MessageType::OnionLayer, 1, payload);
        assert!(header.verify_payload(b"tampered").is_err());
    }

    #[test]
    fn decode_rejects_truncated_header() {
        assert!(Header::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn decode_rejects_unknown_message_type() {
        let mut bytes = Header::new(MessageType::Handshake, 0, &[]).encode();
        bytes[2] = 0xFF;
        assert!(Header::decode(&bytes).is_err());
    }

    #[test]
    fn handshake_payload_round_trips_and_signable_prefix_is_72_bytes() {
        let payload = HandshakePayload {
            identity_key: [1u8; 32],
            onion_key: [2u8; 32],
            timestamp_ms: 1_700_000_000_000,
            signature: [3u8; 64],
        };
        let encoded = payload.encode();
        assert_eq!(encoded.len(), HANDSHAKE_PAYLOAD_LEN);
        let decoded = HandshakePayload::decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(payload.signable_prefix().len(), HANDSHAKE_SIGNABLE_LEN);
        assert_eq!(&encoded[0..72], &payload.signable_prefix()[..]);
    }

    #[test]
    fn find_node_response_round_trips() {
        let response = FindNodeResponse {
            contacts: vec![
                ContactRecord { node_id: [7u8; 32], ip: vec![127, 0, 0, 1], port: 12345 },
                ContactRecord { node_id: [9u8; 32], ip: vec![10, 0, 0, 2], port: 8080 },
            ],
        };
        let encoded = response.encode().unwrap();
        let decoded = FindNodeResponse::decode(&encoded).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn mutable_record_wire_round_trips() {
        let record = MutableRecordWire {
            owner_pub: [5u8; 32],
            sequence: 9,
            signature: [6u8; 64],
            value: b"manifest digest pointer".to_vec(),
        };
        let encoded = record.encode().unwrap();
        let decoded = MutableRecordWire::decode(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn mutable_record_rejects_value_length_mismatch() {
        let record = MutableRecordWire { owner_pub: [0u8; 32], sequence: 1, signature: [0u8; 64], value: vec![1, 2, 3] };
        let mut encoded = record.encode().unwrap();
        encoded.truncate(encoded.len() - 1);
        assert!(MutableRecordWire::decode(&encoded).is_err());
    }
}
