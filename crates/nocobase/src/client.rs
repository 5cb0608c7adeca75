//! Executes NocoBase operations end to end.
//!
//! Wraps [`build`] with the behaviour that needs a round trip: the
//! workflow pre-check before `executeWorkflow` and the system-collection
//! filter after `listCustom`.

use nodekit_core::envelope::{self, DATA_LIST_SHAPES};
use nodekit_core::error::{NodeError, NodeResult};
use serde_json::Value;

use crate::builder::{build, build_workflow_check};
use crate::credentials::NocoBaseCredentials;
use crate::operation::{Operation, OperationRequest};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Client for a single NocoBase instance.
#[derive(Debug, Clone)]
pub struct NocoBaseClient<T = ReqwestTransport> {
    credentials: NocoBaseCredentials,
    transport: T,
}

impl NocoBaseClient<ReqwestTransport> {
    pub fn new(credentials: NocoBaseCredentials) -> Self {
        Self::with_transport(credentials, ReqwestTransport::new())
    }
}

impl<T: HttpTransport> NocoBaseClient<T> {
    pub fn with_transport(credentials: NocoBaseCredentials, transport: T) -> Self {
        Self {
            credentials,
            transport,
        }
    }

    pub fn credentials(&self) -> &NocoBaseCredentials {
        &self.credentials
    }

    /// Build and send `request`, returning the response body.
    ///
    /// For `executeWorkflow` the target workflow is verified first; no
    /// trigger request is sent unless it exists and is enabled.
    pub async fn execute(&self, request: &OperationRequest) -> NodeResult<Value> {
        let descriptor = build(&self.credentials, request)?;

        if request.operation == Operation::ExecuteWorkflow {
            let workflow_id = request.record_id.as_deref().unwrap_or_default();
            self.verify_workflow(workflow_id).await?;
        }

        tracing::debug!(operation = %request.operation, "Executing NocoBase operation");
        let response = self.transport.send(descriptor).await?;

        Ok(match request.operation {
            Operation::ListCustom => filter_custom_collections(response),
            _ => response,
        })
    }

    /// Confirm that workflow `workflow_id` exists and is enabled.
    pub async fn verify_workflow(&self, workflow_id: &str) -> NodeResult<()> {
        let check = build_workflow_check(&self.credentials, workflow_id);
        let response = self.transport.send(check).await.map_err(|e| {
            NodeError::Network(format!(
                "Failed to verify workflow status for ID '{workflow_id}': {e}"
            ))
        })?;

        let workflow = match envelope::list_items(&response, DATA_LIST_SHAPES) {
            Ok(items) => items.first(),
            Err(err) => {
                tracing::warn!(workflow_id, error = %err, "Unexpected workflow list response");
                None
            }
        };

        let workflow = workflow
            .filter(|w| matches_workflow(w, workflow_id))
            .ok_or_else(|| NodeError::WorkflowNotFound(workflow_id.to_string()))?;

        if workflow.get("enabled") != Some(&Value::Bool(true)) {
            let title = workflow
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .unwrap_or(workflow_id)
                .to_string();
            return Err(NodeError::WorkflowDisabled {
                id: workflow_id.to_string(),
                title,
            });
        }

        tracing::debug!(workflow_id, "Workflow verified");
        Ok(())
    }
}

/// Whether a `collections:list` entry is a user-defined collection.
///
/// System collections carry a non-empty `origin` or `autoCreate: true`.
pub fn is_user_collection(collection: &Value) -> bool {
    let has_origin = match collection.get("origin") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    };
    let auto_created = collection.get("autoCreate") == Some(&Value::Bool(true));
    !has_origin && !auto_created
}

/// Drop system collections from a `collections:list` response.
///
/// Responses in an unrecognized shape are returned unfiltered.
pub fn filter_custom_collections(mut response: Value) -> Value {
    match envelope::list_items_mut(&mut response, DATA_LIST_SHAPES) {
        Ok(items) => items.retain(is_user_collection),
        Err(err) => {
            tracing::warn!(error = %err, "Cannot filter collections; returning response as-is");
        }
    }
    response
}

fn matches_workflow(workflow: &Value, workflow_id: &str) -> bool {
    let id_matches = match workflow.get("id") {
        Some(Value::String(id)) => id == workflow_id,
        Some(Value::Number(id)) => id.to_string() == workflow_id,
        _ => false,
    };
    id_matches || workflow.get("key").and_then(Value::as_str) == Some(workflow_id)
}
