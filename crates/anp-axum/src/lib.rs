//! Axum middleware enforcing `DIDWba` / `Bearer` authentication.
//!
//! Wraps protected routes with the two-phase ANP scheme: a `DIDWba` header
//! authenticates the first request (DID resolution, clock-skew and
//! nonce-replay checks, signature verification), after which the middleware
//! attaches a bearer token to the response `Authorization` header for the
//! client to cache. Subsequent requests present the bearer directly.
//!
//! Handlers read the caller through the [`CallerDid`] request extension.
//!
//! # Example
//!
//! ```ignore
//! use anp_axum::{AuthState, DidWbaLayer};
//!
//! let state = Arc::new(AuthState::new(resolver, signer, "didhost.cc"));
//! let app = Router::new()
//!     .route("/ap2/merchant/create_cart_mandate", post(create_cart))
//!     .layer(DidWbaLayer::new(state));
//! ```

pub mod layer;

pub use layer::{AuthState, CallerDid, DidWbaLayer, DidWbaMiddleware};
