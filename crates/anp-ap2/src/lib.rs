//! AP2 payment mandates for the Agent Network Protocol.
//!
//! Commerce flows between agents are authorized by two chained, signed
//! objects:
//!
//! - A [`CartMandate`](types::CartMandate): the merchant signs a JWS whose
//!   `cart_hash` claim commits to the exact cart contents.
//! - A [`PaymentMandate`](types::PaymentMandate): the user signs a JWS whose
//!   `transaction_data` claim binds the payment to that cart hash and to the
//!   hash of the payment contents themselves.
//!
//! Both hashes are `b64url(SHA-256(JCS(contents)))`, so any re-serialization
//! that survives JCS leaves the commitment intact, and any change to a line
//! item breaks it.
//!
//! # Flow
//!
//! ```text
//! merchant                                shopper
//!    │  CartMandate{contents, jws(cart_hash)}  │
//!    │──────────────────────────────────────-->│ verify, extract cart_hash
//!    │                                         │
//!    │  PaymentMandate{contents', jws([cart_hash, pmt_hash])}
//!    │<──────────────────────────────────────--│
//!    verify against expected cart_hash
//! ```

pub mod cart;
pub mod error;
pub mod payment;
pub mod types;
pub mod wire;

pub use cart::{CartMandateParams, build_cart_mandate, verify_cart_mandate};
pub use error::Ap2Error;
pub use payment::{PaymentMandateParams, build_payment_mandate, verify_payment_mandate};
pub use types::{CartContents, CartMandate, PaymentMandate, PaymentMandateContents};

use serde::Serialize;
use sha2::{Digest, Sha256};

use anp_types::jcs;
use anp_types::util::b64;

/// `b64url(SHA-256(JCS(value)))`, the commitment used for both cart and
/// payment hashes.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String, Ap2Error> {
    let json = serde_json::to_value(value)
        .map_err(|error| Ap2Error::PayloadSchemaInvalid(error.to_string()))?;
    let canonical = jcs::canonicalize(&json)?;
    Ok(b64::encode(Sha256::digest(canonical)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pinned_cart_hash_vector() {
        // JCS sorts keys and prints 120.0 as 120; the digest below is the
        // committed interop vector for these contents.
        let contents = json!({
            "id": "cart_1",
            "total": {"label": "Total", "amount": {"currency": "CNY", "value": 120.0}}
        });
        assert_eq!(
            content_hash(&contents).unwrap(),
            "hYco6djEBN6KPd0SDW1ZLrMgFY61pVSq0XSK2osI_GE"
        );
    }
}
