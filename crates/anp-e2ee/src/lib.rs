//! End-to-end encrypted sessions between two DIDs.
//!
//! A session is established by an ECDHE handshake authenticated with the
//! peers' DID signing keys:
//!
//! 1. The initiator sends `hello` — an ephemeral X25519 key, a fresh nonce,
//!    and a signature over the hello body with its DID authentication key.
//! 2. The responder verifies the signature (key material resolved through
//!    the DID layer by the caller), generates its own ephemeral pair,
//!    computes the shared secret, derives
//!    `aead_key = HKDF-SHA256(ss, salt = nonce_i ‖ nonce_r,
//!    info = "ANP encryption key", 32)`, and answers with its own `hello`
//!    plus a `finished` record sealed under the derived key.
//! 3. The initiator derives the same key, checks the responder's `finished`,
//!    and answers with its own. Both sides are now `Active`.
//!
//! In `Active`, every message is AES-256-GCM sealed with a fresh random IV
//! and `aad = session_id ‖ direction`, so a ciphertext cannot be reflected
//! back to its sender. Re-keying runs the same handshake over the protected
//! channel and atomically swaps the key; two consecutive authentication
//! failures close the session.
//!
//! The session object never performs I/O and never resolves DIDs itself:
//! callers feed it peer messages plus the already-resolved peer public key,
//! and transport whatever it returns.

mod error;
mod handshake;
mod session;

pub use error::E2eeError;
pub use handshake::{Finished, Hello, HelloAck};
pub use session::{E2eeSession, E2eeState, Role, SessionConfig};
