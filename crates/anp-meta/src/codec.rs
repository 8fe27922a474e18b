//! Frame codec for agent-to-agent messages.
//!
//! Every message is `[tag:1][json:utf-8]`. The tag selects the layer:
//!
//! | tag | layer |
//! |-----|-------|
//! | `0x01` | meta-protocol (negotiation) |
//! | `0x02` | application |
//! | `0x03` | natural language |
//! | `0x04` | verification |
//!
//! Meta-protocol bodies discriminate on their `action` member. Unknown
//! members inside a known action are ignored so peers can extend messages
//! without breaking older implementations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MetaError;

/// The one-byte protocol-layer tag leading every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolTag {
    MetaProtocol = 0x01,
    Application = 0x02,
    NaturalLanguage = 0x03,
    Verification = 0x04,
}

impl TryFrom<u8> for ProtocolTag {
    type Error = MetaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ProtocolTag::MetaProtocol),
            0x02 => Ok(ProtocolTag::Application),
            0x03 => Ok(ProtocolTag::NaturalLanguage),
            0x04 => Ok(ProtocolTag::Verification),
            other => Err(MetaError::UnknownTag(other)),
        }
    }
}

/// Outcome markers used across negotiation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NegotiationStatus {
    Negotiating,
    Accepted,
    Rejected,
}

/// Result markers for code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CodeStatus {
    Generated,
    Error,
}

/// A meta-protocol message body, discriminated by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum MetaMessage {
    /// Candidate-protocol exchange. `round` echoes the sender's view of the
    /// negotiation round.
    #[serde(rename = "protocolNegotiation", rename_all = "camelCase")]
    ProtocolNegotiation {
        sequence_id: u64,
        round: u32,
        candidate_protocols: String,
        status: NegotiationStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modification_summary: Option<String>,
    },
    #[serde(rename = "codeGeneration", rename_all = "camelCase")]
    CodeGeneration { sequence_id: u64, status: CodeStatus },
    #[serde(rename = "testCasesNegotiation", rename_all = "camelCase")]
    TestCasesNegotiation {
        sequence_id: u64,
        test_cases: String,
        status: NegotiationStatus,
    },
    #[serde(rename = "fixErrorNegotiation", rename_all = "camelCase")]
    FixErrorNegotiation {
        sequence_id: u64,
        error_description: String,
        status: NegotiationStatus,
    },
    /// Free-form negotiation text; the machine treats it as a synonym for
    /// `protocolNegotiation` with `status: negotiating`.
    #[serde(rename = "naturalLanguageNegotiation", rename_all = "camelCase")]
    NaturalLanguageNegotiation { sequence_id: u64, message: String },
}

impl MetaMessage {
    pub fn sequence_id(&self) -> u64 {
        match self {
            MetaMessage::ProtocolNegotiation { sequence_id, .. }
            | MetaMessage::CodeGeneration { sequence_id, .. }
            | MetaMessage::TestCasesNegotiation { sequence_id, .. }
            | MetaMessage::FixErrorNegotiation { sequence_id, .. }
            | MetaMessage::NaturalLanguageNegotiation { sequence_id, .. } => *sequence_id,
        }
    }
}

/// Encodes a frame: tag byte followed by the JSON body.
pub fn encode_frame<T: Serialize>(tag: ProtocolTag, body: &T) -> Result<Vec<u8>, MetaError> {
    let json = serde_json::to_vec(body).map_err(|error| MetaError::BodyInvalid(error.to_string()))?;
    let mut frame = Vec::with_capacity(1 + json.len());
    frame.push(tag as u8);
    frame.extend_from_slice(&json);
    Ok(frame)
}

/// Splits a frame into its tag and raw JSON body.
pub fn decode_frame(frame: &[u8]) -> Result<(ProtocolTag, Value), MetaError> {
    let (&tag, body) = frame.split_first().ok_or(MetaError::EmptyFrame)?;
    let tag = ProtocolTag::try_from(tag)?;
    let body: Value =
        serde_json::from_slice(body).map_err(|error| MetaError::BodyInvalid(error.to_string()))?;
    Ok((tag, body))
}

/// Encodes a meta-protocol message as a tagged frame.
pub fn encode_meta(message: &MetaMessage) -> Result<Vec<u8>, MetaError> {
    encode_frame(ProtocolTag::MetaProtocol, message)
}

/// Decodes a meta-protocol frame; other tags are [`MetaError::UnknownTag`]
/// at this layer only when outside the tag set, and [`MetaError::BodyInvalid`]
/// when the tag is valid but not meta-protocol.
pub fn decode_meta(frame: &[u8]) -> Result<MetaMessage, MetaError> {
    let (tag, body) = decode_frame(frame)?;
    if tag != ProtocolTag::MetaProtocol {
        return Err(MetaError::BodyInvalid(format!(
            "expected meta-protocol frame, got {tag:?}"
        )));
    }
    serde_json::from_value(body).map_err(|error| MetaError::BodyInvalid(error.to_string()))
}
