use crate::keys::KeyKind;

/// Errors produced by the ANP cryptographic primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// The requested algorithm is not in the supported set.
    #[error("unsupported algorithm: {0}")]
    AlgorithmUnsupported(String),
    /// A key of one kind was used in an operation bound to another kind.
    #[error("key algorithm mismatch: expected {expected}, got {actual}")]
    AlgorithmMismatch { expected: KeyKind, actual: KeyKind },
    /// Signature bytes do not parse as a signature of the expected shape.
    /// Distinct from a well-formed signature that fails verification.
    #[error("malformed signature: {0}")]
    SignatureMalformed(String),
    /// Public or private key bytes do not decode under the stated encoding.
    #[error("invalid key encoding: {0}")]
    KeyEncodingInvalid(String),
    /// X25519 produced an all-zero shared secret (non-contributory peer key).
    #[error("ECDH produced an invalid shared secret")]
    InvalidSharedSecret,
    /// HKDF requires a non-empty salt in ANP.
    #[error("HKDF salt must be non-empty")]
    EmptySalt,
    /// The requested HKDF output length is outside the HKDF-SHA256 bound.
    #[error("invalid HKDF output length")]
    InvalidOutputLength,
    /// AEAD encryption failed.
    #[error("AEAD encryption failed")]
    EncryptionFailed,
    /// AEAD tag verification failed. Callers treat this as a tamper signal.
    #[error("AEAD authentication failed")]
    AuthenticationFailed,
}
