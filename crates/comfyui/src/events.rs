//! Event records the trigger hands to the workflow host.

use nodekit_core::types::Timestamp;
use serde::Serialize;
use serde_json::Value;

use crate::messages::WsEnvelope;

/// One inbound ComfyUI message that passed the trigger's filter.
///
/// Serialized as `{event, data, timestamp, instanceId?, sourceUrl?}`
/// with an ISO-8601 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmittedEvent {
    pub event: String,
    pub data: Value,
    pub timestamp: Timestamp,
    /// Client id of the trigger instance that received the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// WebSocket URL the message arrived on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl EmittedEvent {
    /// Stamp `message` with the current time and its origin.
    pub fn from_message(message: WsEnvelope, instance_id: &str, source_url: &str) -> Self {
        Self {
            event: message.kind,
            data: message.data,
            timestamp: chrono::Utc::now(),
            instance_id: Some(instance_id.to_string()),
            source_url: Some(source_url.to_string()),
        }
    }
}
