//! `nodekit-agent` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod batch;
pub mod config;
pub mod listen;
pub mod telemetry;
