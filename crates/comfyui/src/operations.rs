//! Queue and model operations exposed by the ComfyUI action node.
//!
//! Each input item names its `operationCategory` (`queue` or `models`)
//! and an `operation` within it. [`run_items`] executes a batch in order.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{ComfyUIApi, ComfyUIApiError};

/// Queue and history management.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum QueueOperation {
    /// The five most recent history entries.
    GetRecentHistory,
    GetQueueStatus,
    ClearQueue,
    InterruptExecution,
    ClearHistory,
    DeleteHistoryItem {
        #[serde(rename = "promptId")]
        prompt_id: String,
    },
    GetSystemInfo,
}

/// Model and node-catalogue queries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum ModelsOperation {
    GetAllModels,
    /// `object_info` narrowed to a single node type.
    GetModelsByType {
        #[serde(rename = "modelType")]
        model_type: String,
    },
    GetSamplers,
    GetSchedulers,
    GetExtensions,
    GetEmbeddings,
}

/// One ComfyUI action item, tagged by category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operationCategory", rename_all = "camelCase")]
pub enum ComfyUIOperation {
    Queue(QueueOperation),
    Models(ModelsOperation),
}

/// A [`ComfyUIApiError`] tagged with the index of the item that caused it.
#[derive(Debug, thiserror::Error)]
#[error("{source} [item {item_index}]")]
pub struct ComfyUIItemError {
    pub item_index: usize,
    #[source]
    pub source: ComfyUIApiError,
}

/// Run a queue operation. Mutations answer `{success, message}`.
pub async fn run_queue_operation(
    api: &ComfyUIApi,
    operation: &QueueOperation,
) -> Result<Value, ComfyUIApiError> {
    tracing::debug!(?operation, "Running ComfyUI queue operation");
    match operation {
        QueueOperation::GetRecentHistory => api.get_json("/history?max_items=5").await,
        QueueOperation::GetQueueStatus => api.get_json("/queue").await,
        QueueOperation::ClearQueue => {
            api.post_json("/queue", &json!({"clear": true})).await?;
            Ok(done("Queue cleared"))
        }
        QueueOperation::InterruptExecution => {
            api.post_json("/interrupt", &json!({})).await?;
            Ok(done("Current execution interrupted"))
        }
        QueueOperation::ClearHistory => {
            api.post_json("/history", &json!({"clear": true})).await?;
            Ok(done("History cleared"))
        }
        QueueOperation::DeleteHistoryItem { prompt_id } => {
            api.post_json("/history", &json!({"delete": [prompt_id]}))
                .await?;
            Ok(done(&format!("History item {prompt_id} deleted")))
        }
        QueueOperation::GetSystemInfo => api.get_json("/system_stats").await,
    }
}

/// Run a models operation.
pub async fn run_models_operation(
    api: &ComfyUIApi,
    operation: &ModelsOperation,
) -> Result<Value, ComfyUIApiError> {
    tracing::debug!(?operation, "Running ComfyUI models operation");
    match operation {
        ModelsOperation::GetAllModels => api.get_json("/object_info").await,
        ModelsOperation::GetModelsByType { model_type } => {
            let all = api.get_json("/object_info").await?;
            let mut narrowed = serde_json::Map::new();
            if let Some(entry) = all.get(model_type.as_str()) {
                narrowed.insert(model_type.clone(), entry.clone());
            }
            Ok(Value::Object(narrowed))
        }
        ModelsOperation::GetSamplers => api.get_json("/samplers").await,
        ModelsOperation::GetSchedulers => api.get_json("/schedulers").await,
        ModelsOperation::GetExtensions => api.get_json("/extensions").await,
        ModelsOperation::GetEmbeddings => api.get_json("/embeddings").await,
    }
}

/// Run one item of either category.
pub async fn run_operation(
    api: &ComfyUIApi,
    operation: &ComfyUIOperation,
) -> Result<Value, ComfyUIApiError> {
    match operation {
        ComfyUIOperation::Queue(op) => run_queue_operation(api, op).await,
        ComfyUIOperation::Models(op) => run_models_operation(api, op).await,
    }
}

/// Run a batch of items in order.
///
/// With `continue_on_fail` a failing item yields its [`error_record`] in
/// its output slot; otherwise the first failure aborts the batch.
pub async fn run_items(
    api: &ComfyUIApi,
    items: &[ComfyUIOperation],
    continue_on_fail: bool,
) -> Result<Vec<Value>, ComfyUIItemError> {
    let mut output = Vec::with_capacity(items.len());
    for (item_index, operation) in items.iter().enumerate() {
        match run_operation(api, operation).await {
            Ok(value) => output.push(value),
            Err(err) => {
                tracing::error!(
                    item_index,
                    error = %err,
                    status = ?err.status(),
                    suggestion = %err.suggestion(),
                    "ComfyUI operation failed",
                );
                if !continue_on_fail {
                    return Err(ComfyUIItemError {
                        item_index,
                        source: err,
                    });
                }
                output.push(error_record(&err));
            }
        }
    }
    Ok(output)
}

/// Result record emitted in place of output when continuing past failures.
pub fn error_record(err: &ComfyUIApiError) -> Value {
    json!({
        "error": err.to_string(),
        "status": err.status(),
        "suggestion": err.suggestion(),
    })
}

fn done(message: &str) -> Value {
    json!({"success": true, "message": message})
}
