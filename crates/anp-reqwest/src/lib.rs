//! reqwest middleware for transparent ANP authentication.
//!
//! Wraps a `reqwest` client so every request to an ANP agent is
//! authenticated without the caller thinking about it:
//!
//! - the first request to a host carries a fresh `DIDWba` header;
//! - a bearer token returned in the response `Authorization` header is
//!   cached per `(host, port)` and attached to subsequent requests;
//! - a `401` invalidates the cached bearer and retries exactly once with a
//!   fresh `DIDWba` header.
//!
//! # Example
//!
//! ```ignore
//! use anp_reqwest::DidWbaAuth;
//! use reqwest_middleware::ClientBuilder;
//!
//! let auth = DidWbaAuth::new(my_did, my_key, "#key-1");
//! let client = ClientBuilder::new(reqwest::Client::new())
//!     .with(auth)
//!     .build();
//! let body = client.get("https://didhost.cc/ad.json").send().await?;
//! ```

pub mod middleware;

pub use middleware::{DidWbaAuth, DidWbaAuthError};
