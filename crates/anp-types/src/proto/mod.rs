//! Wire envelopes for agent-to-agent messages.
//!
//! Application payloads (AP2 requests, mandates, negotiation bodies) travel
//! inside a common envelope identifying the sender and recipient DIDs:
//!
//! ```json
//! {
//!   "messageId": "5f0c6e64-…",
//!   "from": "did:wba:didhost.cc:shopper",
//!   "to": "did:wba:didhost.cc:merchant",
//!   "data": { … }
//! }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::did::Did;

/// The envelope wrapping every addressed ANP payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidMessage<T> {
    /// Opaque correlation id chosen by the sender.
    pub message_id: String,
    pub from: Did,
    pub to: Did,
    pub data: T,
}

impl<T> DidMessage<T> {
    /// Wraps a payload with a fresh random message id.
    pub fn new(from: Did, to: Did, data: T) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            from,
            to,
            data,
        }
    }

    /// Builds the reply envelope, swapping the addressing and keeping the
    /// correlation id.
    pub fn reply<R>(&self, data: R) -> DidMessage<R> {
        DidMessage {
            message_id: self.message_id.clone(),
            from: self.to.clone(),
            to: self.from.clone(),
            data,
        }
    }
}
