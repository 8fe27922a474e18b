use anp_crypto::CryptoError;
use anp_identity::{IdentityError, ProofError};

/// Errors raised while issuing or verifying authentication material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header does not follow the `DIDWba` grammar.
    #[error("malformed DIDWba header: {0}")]
    HeaderMalformed(String),
    /// The header timestamp lies outside the tolerated clock skew.
    #[error("timestamp outside allowed clock skew")]
    TimestampOutsideSkew,
    /// The nonce was already seen inside the replay window.
    #[error("nonce replay detected")]
    NonceReplay,
    /// The header signature does not verify against the resolved key.
    #[error("DIDWba signature verification failed")]
    SignatureInvalid,
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
