use anp_crypto::CryptoError;

use crate::session::E2eeState;

/// Errors raised by E2EE sessions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum E2eeError {
    /// The handshake could not be completed (bad signature, nonce reuse,
    /// undecodable ephemeral key, failed key confirmation).
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    /// A protected message failed tag verification. Two of these in a row
    /// close the session.
    #[error("message authentication failed")]
    AuthenticationFailed,
    /// The operation is not available in the session's current state.
    #[error("operation invalid in state {0:?}")]
    InvalidState(E2eeState),
    /// The session has been closed; no further traffic is possible.
    #[error("session closed")]
    SessionClosed,
    /// The peer declined a re-key or one is already in flight.
    #[error("re-key refused")]
    RekeyRefused,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
