//! Wire types for the chat backend: inbound events, outbound submissions and
//! the `/history` response.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// -- Inbound events ---------------------------------------------------------

/// One edge of the backend's knowledge graph, carried by `synapse_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    pub source: String,
    pub target: String,
    pub relationship: String,
}

/// Every event the backend may push over the socket.
///
/// The enumeration is closed: a frame whose `type` is not listed here decodes
/// to [`InboundEvent::Unknown`] and is ignored by the reducer. A frame whose
/// `type` is known but whose fields do not match fails to decode and is
/// dropped by [`decode_event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A complete assistant message.
    Text { text: String },
    /// One streamed piece of an assistant message.
    TextChunk { text: String },
    /// Ephemeral progress text while the model reasons.
    Thinking { text: String },
    /// Ephemeral status banner.
    Status { text: String },
    ToolOutput { tool_name: String, output: String },
    Error { text: String },
    /// The backend escalated to its multi-model council.
    CouncilActivated,
    SubconsciousThought { text: String },
    SynapseUpdate { synapse: Synapse },
    Evolution { text: String },
    Market { text: String },
    Draft { text: String },
    Vibe { vibe: String },
    Pulse { temp: f64 },
    #[serde(other)]
    Unknown,
}

impl InboundEvent {
    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Text { .. } => "text",
            InboundEvent::TextChunk { .. } => "text_chunk",
            InboundEvent::Thinking { .. } => "thinking",
            InboundEvent::Status { .. } => "status",
            InboundEvent::ToolOutput { .. } => "tool_output",
            InboundEvent::Error { .. } => "error",
            InboundEvent::CouncilActivated => "council_activated",
            InboundEvent::SubconsciousThought { .. } => "subconscious_thought",
            InboundEvent::SynapseUpdate { .. } => "synapse_update",
            InboundEvent::Evolution { .. } => "evolution",
            InboundEvent::Market { .. } => "market",
            InboundEvent::Draft { .. } => "draft",
            InboundEvent::Vibe { .. } => "vibe",
            InboundEvent::Pulse { .. } => "pulse",
            InboundEvent::Unknown => "unknown",
        }
    }
}

/// Decode one text frame.
///
/// Returns `None` for frames that are not JSON or do not match the shape of
/// their declared kind. Such frames are logged and dropped; the connection
/// stays up.
pub fn decode_event(raw: &str) -> Option<InboundEvent> {
    match serde_json::from_str::<InboundEvent>(raw) {
        Ok(InboundEvent::Unknown) => {
            debug!(frame = %truncate(raw, 120), "ignoring event of unknown kind");
            Some(InboundEvent::Unknown)
        }
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, frame = %truncate(raw, 120), "dropping malformed frame");
            None
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// -- Outbound ---------------------------------------------------------------

/// The single message shape the client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub message: String,
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// -- History ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One past message returned by `GET /history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Body of `GET /history`.
///
/// Only the structured `{role, content}` record shape is accepted. The older
/// flat `"User: ..."` string list fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<HistoryEntry>,
}
