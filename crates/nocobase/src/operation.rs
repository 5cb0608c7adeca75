//! Operation descriptors.
//!
//! An [`OperationRequest`] is built per host invocation through one of its
//! per-operation constructors, which populate exactly the fields that
//! operation uses. Everything else stays `None` and is skipped on
//! serialization.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use nodekit_core::error::NodeError;
use nodekit_core::types::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default page requested by NocoBase list endpoints.
pub const DEFAULT_PAGE: u32 = 1;

/// Default page size of NocoBase list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A NocoBase operation that maps onto a single HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    GetServerInfo,
    ListCustom,
    ListUsers,
    ListWorkflows,
    List,
    Get,
    Select,
    Create,
    Update,
    Delete,
    Move,
    UploadFile,
    ExecuteWorkflow,
}

impl Operation {
    pub const ALL: [Operation; 13] = [
        Operation::GetServerInfo,
        Operation::ListCustom,
        Operation::ListUsers,
        Operation::ListWorkflows,
        Operation::List,
        Operation::Get,
        Operation::Select,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
        Operation::Move,
        Operation::UploadFile,
        Operation::ExecuteWorkflow,
    ];

    /// The operation's name as used in node parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::GetServerInfo => "getServerInfo",
            Operation::ListCustom => "listCustom",
            Operation::ListUsers => "listUsers",
            Operation::ListWorkflows => "listWorkflows",
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Select => "select",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Move => "move",
            Operation::UploadFile => "uploadFile",
            Operation::ExecuteWorkflow => "executeWorkflow",
        }
    }

    /// Whether the operation is addressed to a specific collection.
    pub fn is_collection_scoped(self) -> bool {
        !matches!(
            self,
            Operation::GetServerInfo
                | Operation::ListCustom
                | Operation::ListUsers
                | Operation::ListWorkflows
                | Operation::ExecuteWorkflow
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| NodeError::UnsupportedOperation(s.to_string()))
    }
}

/// Query options for listing and reading records.
///
/// `extra` carries any additional key/value pairs passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appends: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(flatten)]
    pub extra: JsonObject,
}

/// Parameters of the `move` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveParams {
    pub source_id: String,
    pub target_id: String,
    /// `insertAfter` or `insertBefore`.
    pub method: String,
    pub sort_field: String,
    /// Target scope as JSON text; omitted from the query when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub sticky: bool,
}

impl MoveParams {
    /// Move `source_id` after `target_id` using the `sort` field.
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            method: "insertAfter".to_string(),
            sort_field: "sort".to_string(),
            scope: None,
            sticky: false,
        }
    }
}

/// How the file payload of an upload is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMethod {
    #[default]
    Binary,
    Filepath,
    Base64,
}

/// Binary payload attached to an input item by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryData {
    /// File content, base64-encoded.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The file payload of an upload. Exactly one source is ever present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadSource {
    /// A binary property of the input item.
    Binary { property: String, data: BinaryData },
    /// A file on the local filesystem.
    FilePath(PathBuf),
    /// A base64 string given directly as a parameter.
    Base64 {
        content: String,
        /// Binary property name, used as the filename when it has an extension.
        property: Option<String>,
    },
}

/// File upload parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub source: UploadSource,
    /// Explicit filename; takes precedence over anything derived from the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// A single NocoBase operation with the parameters it needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Record primary key, or the workflow id for `executeWorkflow`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_params: Option<MoveParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadRequest>,
}

impl OperationRequest {
    fn bare(operation: Operation) -> Self {
        Self {
            operation,
            collection: None,
            record_id: None,
            data: None,
            query: None,
            move_params: None,
            upload: None,
        }
    }

    fn scoped(operation: Operation, collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            ..Self::bare(operation)
        }
    }

    pub fn server_info() -> Self {
        Self::bare(Operation::GetServerInfo)
    }

    pub fn list_custom(query: Option<QueryOptions>) -> Self {
        Self {
            query,
            ..Self::bare(Operation::ListCustom)
        }
    }

    pub fn list_users(query: Option<QueryOptions>) -> Self {
        Self {
            query,
            ..Self::bare(Operation::ListUsers)
        }
    }

    pub fn list_workflows(query: Option<QueryOptions>) -> Self {
        Self {
            query,
            ..Self::bare(Operation::ListWorkflows)
        }
    }

    pub fn list(collection: impl Into<String>, query: Option<QueryOptions>) -> Self {
        Self {
            query,
            ..Self::scoped(Operation::List, collection)
        }
    }

    pub fn get(
        collection: impl Into<String>,
        record_id: Option<String>,
        query: Option<QueryOptions>,
    ) -> Self {
        Self {
            record_id,
            query,
            ..Self::scoped(Operation::Get, collection)
        }
    }

    /// Same request as [`get`](Self::get), issued for a record picked
    /// from a dropdown.
    pub fn select(collection: impl Into<String>, record_id: Option<String>) -> Self {
        Self {
            record_id,
            ..Self::scoped(Operation::Select, collection)
        }
    }

    pub fn create(collection: impl Into<String>, data: Option<JsonObject>) -> Self {
        Self {
            data,
            ..Self::scoped(Operation::Create, collection)
        }
    }

    pub fn update(
        collection: impl Into<String>,
        record_id: impl Into<String>,
        data: Option<JsonObject>,
    ) -> Self {
        Self {
            record_id: Some(record_id.into()),
            data,
            ..Self::scoped(Operation::Update, collection)
        }
    }

    pub fn delete(collection: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id.into()),
            ..Self::scoped(Operation::Delete, collection)
        }
    }

    pub fn move_record(collection: impl Into<String>, params: MoveParams) -> Self {
        Self {
            move_params: Some(params),
            ..Self::scoped(Operation::Move, collection)
        }
    }

    /// Upload a file into a file collection, with optional metadata fields.
    pub fn upload_file(
        collection: impl Into<String>,
        upload: UploadRequest,
        metadata: Option<JsonObject>,
    ) -> Self {
        Self {
            upload: Some(upload),
            data: metadata,
            ..Self::scoped(Operation::UploadFile, collection)
        }
    }

    pub fn execute_workflow(workflow_id: impl Into<String>, data: Option<JsonObject>) -> Self {
        Self {
            record_id: Some(workflow_id.into()),
            data,
            ..Self::bare(Operation::ExecuteWorkflow)
        }
    }
}
