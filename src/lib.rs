//! ANP agent node.
//!
//! A runnable Agent Network Protocol node built on the `anp-*` crates. It
//! serves its own identity and capability documents, authenticates callers
//! with the `DIDWba` / `Bearer` scheme, and exposes the AP2 merchant
//! endpoints.
//!
//! # Endpoints
//!
//! | Route | Auth | Description |
//! |-------|------|-------------|
//! | `GET /.well-known/did.json` | none | this agent's DID document |
//! | `GET /ad.json` | none | agent description |
//! | `GET /health` | none | liveness |
//! | `POST /ap2/merchant/create_cart_mandate` | DIDWba/Bearer | build a signed cart mandate |
//! | `POST /ap2/merchant/send_payment_mandate` | DIDWba/Bearer | verify a chained payment mandate |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | CLI / environment configuration |
//! | [`identity`] | on-disk key material and the agent's own DID document |
//! | [`handlers`] | HTTP handlers |
//! | [`run`] | server assembly, runtime, and graceful shutdown |
//! | [`telemetry`] | tracing subscriber setup |

pub mod config;
pub mod handlers;
pub mod identity;
pub mod run;
pub mod telemetry;

pub use run::run;
