//! Cryptographic primitives for the Agent Network Protocol.
//!
//! Everything ANP signs, encrypts, or key-exchanges goes through this crate:
//!
//! - [`keys`] - tagged key pairs over secp256k1, P-256, Ed25519, and X25519,
//!   with SHA-256-prehashed ECDSA emitting fixed-width `R‖S` signatures
//! - [`ecdh`] - X25519 ephemeral Diffie-Hellman with contributory-behavior
//!   checks
//! - [`kdf`] - HKDF-SHA256 session-key derivation
//! - [`aead`] - AES-256-GCM message protection with detached tags
//! - [`codec`] - JWK and multibase public-key encodings used by DID
//!   verification methods
//!
//! The primitives never retry and never collapse error kinds: a malformed
//! signature is distinguishable from an invalid one, and an AEAD
//! authentication failure is distinguishable from everything else so callers
//! can tear down sessions.

pub mod aead;
pub mod codec;
pub mod ecdh;
mod error;
pub mod kdf;
pub mod keys;

pub use aead::{SealedMessage, SessionKey};
pub use error::CryptoError;
pub use keys::{KeyKind, KeyPair, PublicKey};
