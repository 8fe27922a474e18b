use anp_identity::ProofError;
use anp_types::CanonicalizeError;

/// Errors raised while building or verifying AP2 mandates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ap2Error {
    /// The `cart_hash` claim does not match the cart contents (or the
    /// expected chain value).
    #[error("cart hash mismatch")]
    CartHashMismatch,
    /// The `pmt_hash` element does not match the payment mandate contents.
    #[error("payment hash mismatch")]
    PmtHashMismatch,
    /// `transaction_data` is not the expected `[cart_hash, pmt_hash]` pair.
    #[error("transaction_data malformed: {0}")]
    TransactionDataMalformed(String),
    /// Contents failed schema validation (negative quantity, empty currency…).
    #[error("payload schema invalid: {0}")]
    PayloadSchemaInvalid(String),
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Canonicalize(#[from] CanonicalizeError),
}
