//! Classical (non-post-quantum) asymmetric cryptography: Ed25519 signatures
//! and X25519 key agreement.

pub mod ed25519;
pub mod x25519;

pub use ed25519::*;
pub use x25519::X25519KeyPair;
