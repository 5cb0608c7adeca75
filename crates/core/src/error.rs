//! Error taxonomy shared by the node implementations.
//!
//! [`NodeError`] is what a single operation fails with. When an error is
//! surfaced to the workflow host it is wrapped in an [`ItemError`] that
//! records which input item caused it.

use serde_json::{json, Value};

/// Failure of a single node operation.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// A required field is missing or has an invalid value.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A string parameter did not contain the expected JSON.
    #[error("Invalid JSON in {field} field: {message}")]
    Parse { field: String, message: String },

    /// The literal text `[object Object]` was received for a JSON field.
    #[error(
        "Invalid {field}: Received \"[object Object]\" which indicates an object was improperly \
         stringified. Pass a valid JSON string or the object itself."
    )]
    StringifiedObject { field: String },

    /// A parameter had a JSON kind that is neither a string nor an object.
    #[error("Invalid {field}: Expected a JSON string or object, but got {found}")]
    Type { field: String, found: &'static str },

    /// The workflow targeted by `executeWorkflow` does not exist.
    #[error("Workflow with ID '{0}' not found")]
    WorkflowNotFound(String),

    /// The workflow targeted by `executeWorkflow` exists but is disabled.
    #[error("Workflow '{title}' (ID: {id}) is disabled and cannot be triggered")]
    WorkflowDisabled { id: String, title: String },

    /// The file payload for an upload is missing or unreadable.
    #[error("Upload source error: {0}")]
    UploadSource(String),

    /// The HTTP exchange itself failed (DNS, TLS, connection reset, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The remote server answered with a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The requested operation name is not known.
    #[error("The operation '{0}' is not supported")]
    UnsupportedOperation(String),

    /// A list response matched none of the known envelope shapes.
    #[error("Unrecognized response shape: {0}")]
    UnrecognizedResponseShape(String),
}

/// Convenience alias for operation results.
pub type NodeResult<T> = Result<T, NodeError>;

/// A [`NodeError`] tagged with the index of the input item that caused it.
#[derive(Debug, thiserror::Error)]
#[error("{source} [item {item_index}]")]
pub struct ItemError {
    pub item_index: usize,
    #[source]
    pub source: NodeError,
}

impl ItemError {
    pub fn new(item_index: usize, source: NodeError) -> Self {
        Self { item_index, source }
    }
}

impl NodeError {
    /// Short machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            NodeError::Validation(_) => "VALIDATION_ERROR",
            NodeError::Parse { .. } => "PARSE_ERROR",
            NodeError::StringifiedObject { .. } => "STRINGIFIED_OBJECT",
            NodeError::Type { .. } => "TYPE_ERROR",
            NodeError::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            NodeError::WorkflowDisabled { .. } => "WORKFLOW_DISABLED",
            NodeError::UploadSource(_) => "UPLOAD_SOURCE_ERROR",
            NodeError::Network(_) => "NETWORK_ERROR",
            NodeError::Api { .. } => "API_ERROR",
            NodeError::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            NodeError::UnrecognizedResponseShape(_) => "UNRECOGNIZED_RESPONSE_SHAPE",
        }
    }

    /// The result record emitted in place of output when the host is
    /// configured to continue past failures.
    pub fn to_record(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

/// Name of a JSON value's kind, used in error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
