//! `NodeIdentity` bundles the keys a node needs for one process lifetime:
//! a persisted Ed25519 identity keypair, a fresh X25519 onion keypair, an
//! in-memory symmetric storage key, and the `NodeId` derived from the onion
//! public key.

use std::fs;
use std::path::{Path, PathBuf};

use lib_crypto::{ed25519_keypair_from_seed, X25519KeyPair};
use rand::RngCore;
use tracing::{info, warn};

use crate::error::IdentityError;
use crate::types::NodeId;

const IDENTITY_KEY_FILE: &str = "identity.key";

/// A symmetric key generated once per process, kept in memory only. Used to
/// encrypt locally-stored blobs at rest.
pub struct StorageKey(pub [u8; 32]);

impl StorageKey {
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }
}

/// Everything that identifies this node to the rest of the overlay:
/// a persisted signing identity, an ephemeral onion key, and the derived
/// `NodeId`.
pub struct NodeIdentity {
    pub node_id: NodeId,
    pub identity_public_key: [u8; 32],
    pub identity_secret_key: [u8; 32],
    pub onion: X25519KeyPair,
    pub storage_key: StorageKey,
}

impl NodeIdentity {
    /// Load the persisted Ed25519 identity key from `<data_dir>/identity.key`,
    /// generating and persisting a new one if the file is missing. The onion
    /// keypair and storage key are always freshly generated for this process.
    pub fn load_or_create(data_dir: &Path) -> Result<Self, IdentityError> {
        let key_path = data_dir.join(IDENTITY_KEY_FILE);
        let seed = match fs::read(&key_path) {
            Ok(bytes) => {
                if bytes.len() != 32 {
                    return Err(IdentityError::MalformedKeyFile {
                        path: key_path.display().to_string(),
                        actual: bytes.len(),
                    });
                }
                info!(path = %key_path.display(), "loaded existing identity key");
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                seed
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %key_path.display(), "no identity key found, generating one");
                let mut seed = [0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut seed);
                persist_identity_key(data_dir, &key_path, &seed)?;
                seed
            }
            Err(source) => {
                return Err(IdentityError::ReadFailed { path: key_path.display().to_string(), source })
            }
        };

        let (public_key, secret_key) = ed25519_keypair_from_seed(&seed);
        let mut identity_public_key = [0u8; 32];
        identity_public_key.copy_from_slice(&public_key);
        let mut identity_secret_key = [0u8; 32];
        identity_secret_key.copy_from_slice(&secret_key);

        let onion = X25519KeyPair::generate();
        let node_id = NodeId::from_onion_public_key(onion.public.as_bytes());

        Ok(Self {
            node_id,
            identity_public_key,
            identity_secret_key,
            onion,
            storage_key: StorageKey::generate(),
        })
    }
}

fn persist_identity_key(data_dir: &Path, key_path: &PathBuf, seed: &[u8; 32]) -> Result<(), IdentityError> {
    fs::create_dir_all(data_dir)
        .map_err(|source| IdentityError::WriteFailed { path: data_dir.display().to_string(), source })?;
    fs::write(key_path, seed)
        .map_err(|source| IdentityError::WriteFailed { path: key_path.display().to_string(), source })
}
