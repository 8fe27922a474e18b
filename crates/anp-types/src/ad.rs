//! Agent description (`ad.json`) model.
//!
//! Agents publish a JSON-LD description of themselves and the interfaces they
//! expose. Interface entries from unknown future versions are skipped rather
//! than failing the whole document.

use serde::{Deserialize, Serialize};
use serde_with::{VecSkipError, serde_as};

use crate::did::Did;

/// A machine-readable description of an agent and its interfaces.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescription {
    #[serde(rename = "@context")]
    pub context: serde_json::Value,
    /// The agent's DID.
    #[serde(rename = "@id")]
    pub id: Did,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Interfaces the agent serves. Entries that fail to deserialize are
    /// dropped so one malformed interface cannot hide the rest.
    #[serde_as(as = "VecSkipError<_>")]
    #[serde(default)]
    pub interfaces: Vec<AgentInterface>,
    /// Free-form supplementary entries.
    #[serde(rename = "Informations", default, skip_serializing_if = "Vec::is_empty")]
    pub informations: Vec<serde_json::Value>,
}

/// One interface entry in an agent description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInterface {
    /// Interface kind, e.g. `StructuredInterface`.
    #[serde(rename = "type")]
    pub interface_type: String,
    /// Protocol spoken at `url`, e.g. `openrpc`, `JSON-RPC 2.0`, `AP2/ANP`.
    pub protocol: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
