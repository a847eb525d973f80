//! Node identity: the persisted Ed25519 keypair, the per-process onion
//! (X25519) keypair, the in-memory storage key, and the `NodeId` derived
//! from the onion public key.

pub mod error;
pub mod identity;
pub mod types;

pub use error::IdentityError;
pub use identity::{NodeIdentity, StorageKey};
pub use types::NodeId;
