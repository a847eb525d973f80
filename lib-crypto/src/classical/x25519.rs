//! X25519 Diffie-Hellman key agreement for onion layer session keys.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

/// An ephemeral or static X25519 keypair.
pub struct X25519KeyPair {
    pub secret: StaticSecret,
    pub public: PublicKey,
}

impl X25519KeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn from_bytes(secret_bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(secret_bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Perform the Diffie-Hellman agreement against a peer's public key,
    /// producing the 32-byte shared secret that feeds HKDF.
    pub fn agree(&self, their_public: &[u8; 32]) -> [u8; 32] {
        let their_public = PublicKey::from(*their_public);
        self.secret.diffie_hellman(&their_public).to_bytes()
    }
}
