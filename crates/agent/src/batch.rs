//! Batch modes: run a file of NocoBase or ComfyUI operation items once.

use std::path::{Path, PathBuf};

use nodekit_comfyui::{ComfyUIApi, ComfyUIApiError, ComfyUIItemError, ComfyUIOperation};
use nodekit_core::error::ItemError;
use nodekit_nocobase::node::{run_items, NodeInput};
use nodekit_nocobase::NocoBaseClient;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{BatchSettings, ComfyUIBatchSettings};

/// Read the items file: one item object or an array of them.
pub fn load_items<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, BatchError> {
    let text = std::fs::read_to_string(path).map_err(|source| BatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |source| BatchError::Parse {
        path: path.to_path_buf(),
        source,
    };

    match serde_json::from_str::<Value>(&text).map_err(parse_error)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(parse_error))
            .collect(),
        item => Ok(vec![serde_json::from_value(item).map_err(parse_error)?]),
    }
}

/// Execute every item in the settings' file against NocoBase.
pub async fn run(settings: &BatchSettings) -> Result<Vec<Value>, BatchError> {
    let items: Vec<NodeInput> = load_items(&settings.items_file)?;
    tracing::info!(
        items = items.len(),
        base_url = %settings.credentials.base_url,
        continue_on_fail = settings.continue_on_fail,
        "Running NocoBase items",
    );

    let client = NocoBaseClient::new(settings.credentials.clone());
    let output = run_items(&client, &items, settings.continue_on_fail).await?;
    Ok(output)
}

/// Execute every item in the settings' file against ComfyUI.
pub async fn run_comfyui(settings: &ComfyUIBatchSettings) -> Result<Vec<Value>, BatchError> {
    let items: Vec<ComfyUIOperation> = load_items(&settings.items_file)?;
    tracing::info!(
        items = items.len(),
        api_url = %settings.credentials.api_url,
        continue_on_fail = settings.continue_on_fail,
        "Running ComfyUI items",
    );

    let credentials = &settings.credentials;
    let api = ComfyUIApi::new(credentials.api_url.clone(), credentials.auth())
        .map_err(BatchError::ComfyUIClient)?;
    let output = nodekit_comfyui::run_items(&api, &items, settings.continue_on_fail).await?;
    Ok(output)
}

/// Errors from the batch modes.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Failed to read items file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid items file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Item(#[from] ItemError),

    #[error("Failed to build ComfyUI client: {0}")]
    ComfyUIClient(#[source] ComfyUIApiError),

    #[error(transparent)]
    ComfyUIItem(#[from] ComfyUIItemError),
}
