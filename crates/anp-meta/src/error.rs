use crate::machine::{SessionEvent, SessionState};

/// Errors raised by the meta-protocol machine and codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetaError {
    /// The event is not legal in the current state. At the codec boundary
    /// this is swallowed and counted, never propagated to the peer.
    #[error("invalid transition: {event:?} in state {state:?}")]
    InvalidTransition {
        state: SessionState,
        event: SessionEvent,
    },
    /// The negotiation round counter passed its bound; the session is now
    /// `Rejected`.
    #[error("negotiation exceeded {0} rounds")]
    MaxRoundsExceeded(u32),
    /// The frame's leading byte is not a known protocol tag.
    #[error("unknown protocol tag {0:#04x}")]
    UnknownTag(u8),
    /// A frame must carry at least the tag byte.
    #[error("empty frame")]
    EmptyFrame,
    /// The frame body did not parse as UTF-8 JSON of the expected shape.
    #[error("frame body invalid: {0}")]
    BodyInvalid(String),
}
