//! Core types for the Agent Network Protocol (ANP).
//!
//! This crate provides the foundational types shared across the ANP ecosystem:
//! deterministic JSON serialization, decentralized identifiers, DID documents,
//! agent descriptions, and the wire envelopes exchanged between agents.
//!
//! # Overview
//!
//! ANP lets autonomous agents authenticate each other with `did:wba`
//! identifiers, describe their capabilities in machine-readable form, and
//! exchange signed, verifiable payloads. Everything signed in ANP is hashed
//! over its [JCS](jcs) canonical form, so canonicalization lives here at the
//! bottom of the dependency stack.
//!
//! # Modules
//!
//! - [`jcs`] - JSON Canonicalization Scheme (RFC 8785) serialization
//! - [`did`] - `did:wba` identifiers, DID documents, verification methods
//! - [`ad`] - Agent description (`ad.json`) model
//! - [`proto`] - Wire envelopes for agent-to-agent messages
//! - [`timestamp`] - RFC 3339 UTC timestamps used in headers and mandates
//! - [`util`] - Base64url helpers

pub mod ad;
pub mod did;
pub mod jcs;
pub mod proto;
pub mod timestamp;
pub mod util;

pub use did::{Did, DidDocument, DocumentError, Jwk, VerificationMethod};
pub use jcs::{CanonicalizeError, canonicalize, canonicalize_to_string};
pub use timestamp::UtcTimestamp;
pub use util::Base64UrlBytes;
