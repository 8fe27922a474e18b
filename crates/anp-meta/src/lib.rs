//! Meta-protocol negotiation for the Agent Network Protocol.
//!
//! Before two agents can talk application traffic they agree on a protocol:
//! candidate exchange, code generation, test agreement, fixing, and finally
//! communication. [`machine`] holds the deterministic state machine driving
//! one such session; [`codec`] frames the messages (`[tag][json]`) and maps
//! inbound bodies onto machine events.
//!
//! The machine is strictly synchronous: it never performs I/O and never
//! suspends. Timers and transport sends are outbound effects the host loop
//! performs; expiry comes back in as a [`machine::SessionEvent::Timeout`].

pub mod codec;
pub mod error;
pub mod machine;

pub use codec::{
    CodeStatus, MetaMessage, NegotiationStatus, ProtocolTag, decode_frame, decode_meta,
    encode_frame, encode_meta,
};
pub use error::MetaError;
pub use machine::{NegotiationSession, SessionConfig, SessionEvent, SessionState};
