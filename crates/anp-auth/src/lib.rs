//! `DIDWba` / `Bearer` HTTP authentication.
//!
//! ANP authentication is a two-phase scheme:
//!
//! 1. The first request carries `Authorization: DIDWba did="…", nonce="…",
//!    timestamp="…", verification_method="…", signature="…"`. The server
//!    resolves the caller's DID, checks the clock-skew window and the nonce
//!    replay window, and verifies the signature over the JCS hash of
//!    `{nonce, timestamp, service, did}`.
//! 2. On success the server may hand back a bearer token (a JWS over
//!    `{did, iat, exp}` under the server's token key). Subsequent requests
//!    present `Authorization: Bearer <jws>`; a rejected bearer sends the
//!    client back to phase 1.
//!
//! The replay window is a bounded in-memory structure by design; restarting
//! the server empties it, and the timestamp rule alone still bounds how far
//! in the past a replayed header can be.

pub mod header;
pub mod nonce;
pub mod token;

mod error;

pub use error::AuthError;
pub use header::{AuthConfig, DidWbaHeader, VerifiedIdentity, build_header, verify_header};
pub use nonce::NonceWindow;
pub use token::{issue_token, parse_bearer, verify_token};
