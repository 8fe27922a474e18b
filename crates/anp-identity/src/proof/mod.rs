//! Proof generation and verification.
//!
//! Two signature families travel through ANP and must not be confused:
//!
//! - [`integrity`] - W3C Data-Integrity proofs: a `proof` object embedded
//!   next to the signed payload, with the signature computed over
//!   `SHA-256(JCS(options)) ‖ SHA-256(JCS(document without proof))`.
//! - [`jws`] - JWS compact serialization (`header.payload.signature`), used
//!   for bearer tokens and AP2 mandate authorizations with `RS256` or
//!   `ES256K`.

pub mod integrity;
pub mod jws;

pub use integrity::{ProofExpectations, ProofOptions, ProofType, sign_document, verify_document};
pub use jws::{ClaimPolicy, DecodedJws, JwsAlgorithm, JwsSigner, JwsVerifier};

use anp_crypto::CryptoError;
use anp_types::CanonicalizeError;

/// Errors raised while producing or checking proofs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    /// The algorithm named in the proof or header is outside the supported set.
    #[error("unsupported algorithm: {0}")]
    AlgorithmUnsupported(String),
    /// The stated algorithm does not match the supplied key.
    #[error("algorithm mismatch: proof says {proof}, key is {key}")]
    AlgorithmMismatch { proof: String, key: String },
    /// The proof or token is not structurally a signature.
    #[error("malformed signature material: {0}")]
    SignatureMalformed(String),
    /// A well-formed signature that does not verify.
    #[error("signature verification failed")]
    SignatureInvalid,
    /// `iat` lies further in the future than the allowed clock skew.
    #[error("timestamp outside allowed clock skew")]
    TimestampOutsideSkew,
    /// `exp` has passed (a token presented exactly at `exp` is expired).
    #[error("token expired")]
    TokenExpired,
    /// `aud` does not name the expected audience.
    #[error("audience mismatch: expected {expected}, got {actual}")]
    AudienceMismatch { expected: String, actual: String },
    /// `iss` does not name the expected issuer.
    #[error("issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch { expected: String, actual: String },
    /// Required claims are missing or of the wrong shape.
    #[error("payload schema invalid: {0}")]
    PayloadSchemaInvalid(String),
    /// The proof's `domain` does not match the verifier's expectation.
    #[error("proof domain mismatch")]
    DomainMismatch,
    /// The proof's `challenge` does not match the verifier's expectation.
    #[error("proof challenge mismatch")]
    ChallengeMismatch,
    #[error(transparent)]
    Canonicalize(#[from] CanonicalizeError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
