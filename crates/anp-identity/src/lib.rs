//! `did:wba` identity for the Agent Network Protocol.
//!
//! This crate turns web-hosted DID documents into usable key material:
//!
//! - [`wba`] - lexical syntax of `did:wba` identifiers (host, optional
//!   percent-encoded port, path segments) and the `.well-known/did.json`
//!   location they resolve to
//! - [`resolver`] - document fetch with bounded retry, positive/negative TTL
//!   caching, and verification-method key lookup
//! - [`proof`] - W3C Data-Integrity proofs over JCS and JWS compact
//!   serialization (RS256 / ES256K), the two signature families everything
//!   else in ANP builds on
//!
//! # Resolution at a glance
//!
//! ```text
//! did:wba:didhost.cc%3A8443:shop  →  https://didhost.cc:8443/shop/.well-known/did.json
//! ```

pub mod error;
pub mod proof;
pub mod resolver;
pub mod wba;

pub use error::IdentityError;
pub use proof::ProofError;
pub use resolver::{DidResolver, FetchDocument, HttpFetch, ResolverConfig, public_key_for};
pub use wba::WbaDid;
