//! ComfyUI WebSocket message envelope and event filter.
//!
//! ComfyUI sends JSON messages over WebSocket with the shape
//! `{"type": "<kind>", "data": {...}}`. The trigger forwards any kind,
//! so the payload is kept as raw JSON rather than a typed enum.

use serde::Deserialize;
use serde_json::Value;

/// Event type that matches every message.
pub const ALL_EVENTS: &str = "all";

/// A raw ComfyUI WebSocket message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WsEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl WsEnvelope {
    /// The `prompt_id` carried in the payload, if any.
    pub fn prompt_id(&self) -> Option<&str> {
        self.data.get("prompt_id").and_then(Value::as_str)
    }
}

/// Parse a ComfyUI WebSocket text message.
///
/// Returns `Err` for malformed JSON or a missing `type` field.
/// Callers should log the failure and continue.
pub fn parse_message(text: &str) -> Result<WsEnvelope, serde_json::Error> {
    serde_json::from_str(text)
}

/// Which messages the trigger emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    /// [`ALL_EVENTS`] or an exact message type such as `executing`.
    pub event_type: String,
    /// Only emit messages whose `data.prompt_id` equals this value.
    pub prompt_id: Option<String>,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            event_type: ALL_EVENTS.to_string(),
            prompt_id: None,
        }
    }
}

impl EventFilter {
    pub fn matches(&self, message: &WsEnvelope) -> bool {
        let type_matches = self.event_type == ALL_EVENTS || self.event_type == message.kind;
        let prompt_matches = match self.prompt_id.as_deref().filter(|p| !p.is_empty()) {
            None => true,
            Some(wanted) => message.prompt_id() == Some(wanted),
        };
        type_matches && prompt_matches
    }
}
