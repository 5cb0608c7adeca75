//! Shared building blocks for the NocoBase and ComfyUI workflow nodes.
//!
//! - [`error`] -- the error taxonomy surfaced to the workflow host.
//! - [`params`] -- coercion of "JSON string or structured value" parameters.
//! - [`envelope`] -- parsing of list-shaped API responses.
//! - [`types`] -- common type aliases.

pub mod envelope;
pub mod error;
pub mod params;
pub mod types;
