//! ComfyUI WebSocket trigger and REST client library.
//!
//! Provides the event trigger (connect, filter, reconnect under a bounded
//! retry policy, optional heartbeat), the message envelope parser, and
//! the queue / model REST operations with their `/api` fallback paths.

pub mod api;
pub mod client;
pub mod events;
pub mod messages;
pub mod operations;
pub mod processor;
pub mod reconnect;
pub mod trigger;

pub use api::{ComfyUIApi, ComfyUIApiError};
pub use events::EmittedEvent;
pub use operations::{run_items, ComfyUIItemError, ComfyUIOperation};
pub use trigger::{ComfyUICredentials, ComfyUITrigger, TriggerConfig, TriggerHandle};
