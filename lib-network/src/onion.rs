//! Layered source-routed onion transport: derive a per-layer session key via
//! X25519 + HKDF, decrypt exactly one layer, and either surface the final
//! message or relay the remainder onward (spec.md §4.4, §4.5).

use std::net::{IpAddr, SocketAddr};

use lib_crypto::{decrypt_data, encrypt_with_nonce, generate_nonce, X25519KeyPair};
use tracing::warn;

use crate::error::NetworkError;

const EPHEMERAL_KEY_LEN: usize = 32;
const MIN_ONION_PAYLOAD_LEN: usize = 32 + 12 + 16; // ephemeral key + nonce + tag, zero-length plaintext

const COMMAND_TERMINAL: u8 = 0x00;
const COMMAND_RELAY: u8 = 0x01;

/// What happened after peeling one onion layer.
pub enum PeelOutcome {
    /// This node was the final hop; the enclosed bytes are the delivered
    /// message, handed to an upstream collaborator out of this core's scope.
    Terminal(Vec<u8>),
    /// This node must relay on: the framed payload to send (already
    /// prefixed with the original client ephemeral key, per the relay
    /// convention below) and the endpoint to send it to.
    Relay { next_hop: SocketAddr, payload: Vec<u8> },
}

/// Derive the ChaCha20-Poly1305 session key for one onion layer: X25519
/// agreement between `local_onion` and `their_ephemeral_public`, expanded
/// through HKDF-SHA256 with empty salt and info.
fn derive_session_key(local_onion: &X25519KeyPair, their_ephemeral_public: &[u8; 32]) -> Result<[u8; 32], NetworkError> {
    let shared_secret = local_onion.agree(their_ephemeral_public);
    let derived = lib_crypto::derive_keys(&shared_secret, b"", 32)
        .map_err(|_| NetworkError::MalformedOnion("session key derivation failed".into()))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&derived);
    Ok(key)
}

/// Peel exactly one onion layer off `payload` (the bytes that followed the
/// `0x02` header on the wire), using this node's onion private key.
pub fn peel_layer(local_onion: &X25519KeyPair, payload: &[u8]) -> Result<PeelOutcome, NetworkError> {
    if payload.len() < MIN_ONION_PAYLOAD_LEN {
        return Err(NetworkError::MalformedOnion(format!(
            "onion payload shorter than the minimum {MIN_ONION_PAYLOAD_LEN} bytes"
        )));
    }
    let (ephemeral_bytes, encrypted_layer) = payload.split_at(EPHEMERAL_KEY_LEN);
    let mut sender_ephemeral = [0u8; 32];
    sender_ephemeral.copy_from_slice(ephemeral_bytes);

    let session_key = derive_session_key(local_onion, &sender_ephemeral)?;
    let plaintext = decrypt_data(encrypted_layer, &session_key).map_err(|_| {
        warn!("onion layer authentication failed, dropping");
        NetworkError::DecryptFailure
    })?;

    if plaintext.is_empty() {
        return Err(NetworkError::MalformedOnion("empty onion layer plaintext".into()));
    }

    match plaintext[0] {
        COMMAND_TERMINAL => Ok(PeelOutcome::Terminal(plaintext[1..].to_vec())),
        COMMAND_RELAY => parse_relay(&sender_ephemeral, &plaintext[1..]),
        other => Err(NetworkError::MalformedOnion(format!("unknown onion command byte {other:#04x}"))),
    }
}

fn parse_relay(sender_ephemeral: &[u8; 32], body: &[u8]) -> Result<PeelOutcome, NetworkError> {
    if body.is_empty() {
        return Err(NetworkError::MalformedOnion("relay layer missing ip_len".into()));
    }
    let ip_len = body[0] as usize;
    if body.len() < 1 + ip_len + 2 {
        return Err(NetworkError::MalformedOnion("truncated relay layer".into()));
    }
    let ip_bytes = &body[1..1 + ip_len];
    let port = u16::from_be_bytes(body[1 + ip_len..3 + ip_len].try_into().unwrap());
    let inner_payload = &body[3 + ip_len..];

    let ip = decode_ip(ip_bytes)?;
    let next_hop = SocketAddr::new(ip, port);

    // Open question 1 (resolved): the relay prepends the original client
    // ephemeral public key it observed on its own incoming packet, so the
    // next hop's decrypt has an ephemeral key to agree against.
    let mut forwarded = Vec::with_capacity(EPHEMERAL_KEY_LEN + inner_payload.len());
    forwarded.extend_from_slice(sender_ephemeral);
    forwarded.extend_from_slice(inner_payload);

    Ok(PeelOutcome::Relay { next_hop, payload: forwarded })
}

pub(crate) fn decode_ip(bytes: &[u8]) -> Result<IpAddr, NetworkError> {
    match bytes.len() {
        4 => Ok(IpAddr::from(<[u8; 4]>::try_from(bytes).unwrap())),
        16 => Ok(IpAddr::from(<[u8; 16]>::try_from(bytes).unwrap())),
        other => Err(NetworkError::MalformedOnion(format!("invalid IP length {other}"))),
    }
}

pub(crate) fn encode_ip(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

pub struct Hop {
    pub endpoint: SocketAddr,
    pub onion_public_key: [u8; 32],
}

/// Client-side construction of a source-routed onion (spec.md §4.5): wrap
/// `final_message` in one encrypted layer per hop, built in reverse so the
/// first hop in `hops` peels the outermost layer. Returns the bytes that
/// follow the client's own ephemeral public key in the wire payload; the
/// caller prepends `client_ephemeral.public` before framing.
pub fn build_onion(final_message: &[u8], hops: &[Hop], client_ephemeral: &X25519KeyPair) -> Result<Vec<u8>, NetworkError> {
    if hops.is_empty() {
        return Err(NetworkError::MalformedOnion("onion route must have at least one hop".into()));
    }

    let mut current = Vec::with_capacity(1 + final_message.len());
    current.push(COMMAND_TERMINAL);
    current.extend_from_slice(final_message);

    for (i, hop) in hops.iter().enumerate().rev() {
        let session_key = derive_session_key(client_ephemeral, &hop.onion_public_key)?;

        let layer_content = if i == hops.len() - 1 {
            current
        } else {
            let next_hop = &hops[i + 1];
            let ip_bytes = encode_ip(next_hop.endpoint.ip());
            let mut body = Vec::with_capacity(1 + 1 + ip_bytes.len() + 2 + current.len());
            body.push(COMMAND_RELAY);
            body.push(ip_bytes.len() as u8);
            body.extend_from_slice(&ip_bytes);
            body.extend_from_slice(&next_hop.endpoint.port().to_be_bytes());
            body.extend_from_slice(&current);
            body
        };

        let nonce = generate_nonce();
        let ciphertext = encrypt_with_nonce(&layer_content, &session_key, &nonce, &[])
            .map_err(|_| NetworkError::MalformedOnion("layer encryption failed".into()))?;
        let mut layer = Vec::with_capacity(12 + ciphertext.len());
        layer.extend_from_slice(&nonce);
        layer.extend_from_slice(&ciphertext);
        current = layer;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(port: u16, key: &X25519KeyPair) -> Hop {
        Hop { endpoint: format!("127.0.0.1:{port}").parse().unwrap(), onion_public_key: *key.public.as_bytes() }
    }

    #[test]
    fn scenario_single_hop_onion() {
        let hop_key = X25519KeyPair::generate();
        let client_ephemeral = X25519KeyPair::generate();
        let message = b"hello onion";

        let built = build_onion(message, &[hop(20000, &hop_key)], &client_ephemeral).unwrap();
        let mut payload = Vec::with_capacity(32 + built.len());
        payload.extend_from_slice(client_ephemeral.public.as_bytes());
        payload.extend_from_slice(&built);

        match peel_layer(&hop_key, &payload).unwrap() {
            PeelOutcome::Terminal(plaintext) => {
                assert_eq!(plaintext.len(), 1 + message.len());
                assert_eq!(plaintext[0], 0x00);
                assert_eq!(&plaintext[1..], message);
            }
            PeelOutcome::Relay { .. } => panic!("expected terminal outcome for single-hop route"),
        }
    }

    #[test]
    fn scenario_three_hop_onion_peeling() {
        let hop_keys = [X25519KeyPair::generate(), X25519KeyPair::generate(), X25519KeyPair::generate()];
        let client_ephemeral = X25519KeyPair::generate();
        let message = b"final content for multi-hop";

        let hops = [hop(20000, &hop_keys[0]), hop(20001, &hop_keys[1]), hop(20002, &hop_keys[2])];
        let built = build_onion(message, &hops, &client_ephemeral).unwrap();

        let mut payload = Vec::with_capacity(32 + built.len());
        payload.extend_from_slice(client_ephemeral.public.as_bytes());
        payload.extend_from_slice(&built);

        // first hop: expect a relay instruction to hop 1 (20001).
        let (next_hop_addr, relayed_payload) = match peel_layer(&hop_keys[0], &payload).unwrap() {
            PeelOutcome::Relay { next_hop, payload } => (next_hop, payload),
            PeelOutcome::Terminal(_) => panic!("hop 0 should relay"),
        };
        assert_eq!(next_hop_addr.port(), 20001);

        // second hop: same relay shape, addressed to hop 2 (20002).
        let (next_hop_addr, relayed_payload) = match peel_layer(&hop_keys[1], &relayed_payload).unwrap() {
            PeelOutcome::Relay { next_hop, payload } => (next_hop, payload),
            PeelOutcome::Terminal(_) => panic!("hop 1 should relay"),
        };
        assert_eq!(next_hop_addr.port(), 20002);

        // third hop: terminal, recovers the original message.
        match peel_layer(&hop_keys[2], &relayed_payload).unwrap() {
            PeelOutcome::Terminal(plaintext) => {
                assert_eq!(plaintext[0], 0x00);
                assert_eq!(&plaintext[1..], message);
            }
            PeelOutcome::Relay { .. } => panic!("hop 2 should be terminal"),
        }
    }

    #[test]
    fn payload_shorter_than_minimum_is_malformed() {
        let hop_key = X25519KeyPair::generate();
        assert!(peel_layer(&hop_key, &[0u8; 10]).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let hop_key = X25519KeyPair::generate();
        let client_ephemeral = X25519KeyPair::generate();
        let built = build_onion(b"hello onion", &[hop(20000, &hop_key)], &client_ephemeral).unwrap();
        let mut payload = Vec::new();
        payload.extend_from_slice(client_ephemeral.public.as_bytes());
        payload.extend_from_slice(&built);
        let last = payload.len() - 1;
        payload[last] ^= 0x01;

        assert!(matches!(peel_layer(&hop_key, &payload), Err(NetworkError::DecryptFailure)));
    }
}
