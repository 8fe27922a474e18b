//! Helper types shared across the ANP crates.

pub mod b64;

pub use b64::Base64UrlBytes;
