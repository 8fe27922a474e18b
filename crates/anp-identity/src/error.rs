use anp_types::did::Did;

/// Errors raised while parsing or resolving `did:wba` identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The identifier does not follow `did:wba` lexical syntax.
    #[error("invalid did:wba syntax: {0}")]
    DidSyntax(String),
    /// Transport failure while fetching the DID document.
    #[error("DID resolution network failure: {0}")]
    Network(String),
    /// The server answered with a status other than 200 or 404.
    #[error("DID resolution failed with HTTP status {0}")]
    HttpStatus(u16),
    /// The host has no document for this DID (authoritative 404).
    #[error("DID document not found for {0}")]
    NotFound(Did),
    /// The fetched document failed parsing or structural validation.
    #[error("DID document invalid: {0}")]
    DocumentInvalid(String),
    /// The document's `id` differs from the DID that was resolved.
    #[error("resolved document id {found} does not match requested {requested}")]
    IdentifierMismatch { requested: Did, found: Did },
    /// No verification method matches the given DID URL.
    #[error("verification method not found: {0}")]
    MethodNotFound(String),
    /// The caller cancelled the resolution.
    #[error("DID resolution cancelled")]
    Cancelled,
    /// The per-attempt resolution timeout elapsed.
    #[error("DID resolution timed out")]
    Timeout,
    /// The verification method carries undecodable key material.
    #[error(transparent)]
    Key(#[from] anp_crypto::CryptoError),
}
