//! `nodekit-agent` -- command-line host for the workflow nodes.
//!
//! In `comfyui-trigger` mode it keeps a WebSocket connection to a
//! ComfyUI server and prints each matching event to stdout as one JSON
//! line. In `comfyui` and `nocobase` modes it runs a file of operation
//! items once and prints the per-item results as a JSON array.
//!
//! See [`nodekit_agent::config`] for the environment variables.

use anyhow::Context;
use nodekit_agent::config::AgentConfig;
use nodekit_agent::{batch, listen, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = AgentConfig::from_env().context("Invalid agent configuration")?;

    match config {
        AgentConfig::ComfyUITrigger(settings) => {
            tracing::info!(
                api_url = %settings.credentials.api_url,
                event_type = %settings.trigger.filter.event_type,
                "Starting nodekit-agent in ComfyUI trigger mode",
            );
            listen::run(settings).await?;
        }
        AgentConfig::ComfyUI(settings) => {
            tracing::info!(
                items_file = %settings.items_file.display(),
                "Starting nodekit-agent in ComfyUI batch mode",
            );
            let output = batch::run_comfyui(&settings).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        AgentConfig::NocoBase(settings) => {
            tracing::info!(
                items_file = %settings.items_file.display(),
                "Starting nodekit-agent in NocoBase mode",
            );
            let output = batch::run(&settings).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
