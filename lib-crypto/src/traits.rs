//! Cryptographic traits for enforcing security properties
//!
//! This module defines marker traits and compile-time guarantees for
//! cryptographic key material handling.

use zeroize::Zeroize;

/// Marker trait for cryptographic key types that MUST be securely zeroized on drop.
///
/// # Purpose
///
/// This trait provides compile-time enforcement that all key types explicitly
/// declare their zeroization policy. It prevents:
///
/// - Forgetting to implement zeroization for new key types
/// - Implementing zeroization incorrectly (e.g., unsafe manual patterns)
/// - Silently introducing memory safety regressions
///
/// # Contract
///
/// Types implementing this trait MUST:
/// 1. Contain sensitive cryptographic material (private keys, seeds, secrets)
/// 2. Either derive `ZeroizeOnDrop` (preferred) OR implement `Drop` with explicit `zeroize()` calls
/// 3. Use `Vec<u8>` or `[u8; N]` for raw key material (not custom types)
///
/// # Usage
///
/// **For private/secret keys (MANDATORY automatic zeroization):**
/// ```rust
/// use zeroize::{Zeroize, ZeroizeOnDrop};
/// use lib_crypto::traits::ZeroizingKey;
///
/// #[derive(Zeroize, ZeroizeOnDrop)]
/// pub struct PrivateKey {
///     pub ed25519_secret: [u8; 32],
///     pub x25519_secret: [u8; 32],
/// }
///
/// impl ZeroizingKey for PrivateKey {}
/// ```
///
/// **For public keys (explicit opt-in for defense-in-depth):**
/// ```rust
/// use zeroize::Zeroize;
/// use lib_crypto::traits::ZeroizingKey;
///
/// pub struct PublicKey {
///     pub ed25519_public: [u8; 32],
///     pub x25519_public: [u8; 32],
/// }
///
/// impl Drop for PublicKey {
///     fn drop(&mut self) {
///         self.ed25519_public.zeroize();
///         self.x25519_public.zeroize();
///     }
/// }
///
/// impl ZeroizingKey for PublicKey {}
/// ```
///
/// # Compile-Time Enforcement
///
/// Use generic bounds to ensure only zeroizing keys are accepted:
/// ```rust
/// pub fn secure_store<K: ZeroizingKey>(key: K) {
///     // Guaranteed to be zeroized on drop
/// }
/// ```
///
/// # Anti-Patterns (FORBIDDEN)
///
/// ❌ **Manual unsafe Drop implementation:**
/// ```rust,ignore
/// impl Drop for BadKey {
///     fn drop(&mut self) {
///         unsafe {
///             std::ptr::write_volatile(&mut self.key, 0);  // DON'T DO THIS
///         }
///     }
/// }
/// ```
///
/// ✅ **Use Zeroize instead:**
/// ```rust
/// # use zeroize::{Zeroize, ZeroizeOnDrop};
/// #[derive(Zeroize, ZeroizeOnDrop)]
/// pub struct GoodKey {
///     key: Vec<u8>,
/// }
/// ```
pub trait ZeroizingKey {}

/// Helper trait for compile-time enforcement of zeroization in generic contexts.
///
/// This trait combines `ZeroizingKey` with `Zeroize` to enable both:
/// 1. Compile-time guarantee of zeroization policy declaration
/// 2. Runtime ability to explicitly zeroize if needed
///
/// # Usage
///
/// ```rust
/// use lib_crypto::traits::SecureKey;
///
/// pub fn process_and_destroy<K: SecureKey>(mut key: K) {
///     // ... use key ...
///
///     // Explicit zeroization before drop (defense in depth)
///     key.zeroize();
/// }
/// ```
pub trait SecureKey: ZeroizingKey + Zeroize {}

// Blanket implementation for any type that is both ZeroizingKey and Zeroize
impl<T: ZeroizingKey + Zeroize> SecureKey for T {}
