//! Wire protocol: one JSON object per request or response, tagged by `type`.
//!
//! Field names follow the deployed protocol (`node_id`, `known_nodes`,
//! `received`, ...), so the Rust-side names are mapped with `serde(rename)`
//! where they read better in code.

use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::identity::NodeId;
use crate::knowledge::KnowledgeItem;
use crate::peer::PeerRecord;
use crate::state::SurvivalLevel;

/// Every message a node sends or understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    // ── Requests ────────────────────────────────────────────────────
    /// Liveness probe.
    Ping,
    /// Ask for the peer's full state, offering a few recent items.
    Sync {
        node_id: NodeId,
        #[serde(default)]
        knowledge: Vec<KnowledgeItem>,
        port: u16,
    },
    /// Push items for the peer to merge.
    Learn {
        node_id: NodeId,
        #[serde(default)]
        knowledge: Vec<KnowledgeItem>,
    },

    // ── Responses ───────────────────────────────────────────────────
    Pong {
        node_id: NodeId,
        #[serde(rename = "knowledge")]
        knowledge_count: usize,
    },
    SyncResponse {
        node_id: NodeId,
        #[serde(default)]
        knowledge: Vec<KnowledgeItem>,
        #[serde(rename = "known_nodes", default)]
        known_peers: Vec<PeerRecord>,
        #[serde(default)]
        survival_level: SurvivalLevel,
    },
    LearnAck {
        #[serde(rename = "received")]
        received_count: usize,
    },
    /// Reply to anything not understood. Also what an unrecognised or
    /// missing `type` decodes to.
    #[serde(other)]
    Unknown,
}

impl Message {
    /// The `type` tag as it appears on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Sync { .. } => "SYNC",
            Self::Learn { .. } => "LEARN",
            Self::Pong { .. } => "PONG",
            Self::SyncResponse { .. } => "SYNC_RESPONSE",
            Self::LearnAck { .. } => "LEARN_ACK",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Serialize to the bytes of one frame.
    pub fn encode(&self) -> Result<Vec<u8>, NodeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse one frame.
    ///
    /// Empty input, invalid JSON, a non-object, a known type with bad
    /// fields, or an item whose complexity is out of range all fail with
    /// [`NodeError::MalformedMessage`]. An object without a recognised
    /// `type` is not an error: it decodes to [`Message::Unknown`].
    pub fn decode(bytes: &[u8]) -> Result<Self, NodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(NodeError::MalformedMessage("empty frame".into()));
        }

        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| NodeError::MalformedMessage(format!("invalid JSON: {e}")))?;

        let has_type = match value.as_object() {
            Some(map) => map.contains_key("type"),
            None => {
                return Err(NodeError::MalformedMessage(
                    "expected a JSON object".into(),
                ));
            }
        };
        if !has_type {
            return Ok(Self::Unknown);
        }

        let message: Self = serde_json::from_value(value)
            .map_err(|e| NodeError::MalformedMessage(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> Result<(), NodeError> {
        let items = match self {
            Self::Sync { knowledge, .. }
            | Self::Learn { knowledge, .. }
            | Self::SyncResponse { knowledge, .. } => knowledge.as_slice(),
            _ => return Ok(()),
        };
        match items.iter().find(|item| !item.has_valid_complexity()) {
            Some(bad) => Err(NodeError::MalformedMessage(format!(
                "complexity {} out of range for topic '{}'",
                bad.complexity, bad.topic
            ))),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
