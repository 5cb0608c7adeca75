//! Per-item execution as driven by the workflow host.
//!
//! [`NodeInput`] is the raw parameter set the host resolves for one input
//! item. [`to_request`] normalizes it into an [`OperationRequest`];
//! [`run_items`] runs a whole batch, honouring the host's
//! continue-on-fail setting.

use std::collections::HashMap;
use std::path::PathBuf;

use nodekit_core::envelope::decode_text_body;
use nodekit_core::error::{ItemError, NodeError, NodeResult};
use nodekit_core::params::{coerce, coerce_object, JsonParam};
use nodekit_core::types::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::bulk::bulk_create;
use crate::client::NocoBaseClient;
use crate::operation::{
    BinaryData, MoveParams, Operation, OperationRequest, QueryOptions, UploadMethod,
    UploadRequest, UploadSource,
};
use crate::transport::HttpTransport;

/// Operation name of the bulk runner; it maps onto many requests.
pub const BULK_CREATE: &str = "bulkCreate";

/// A parameter given as plain text, a number, or a resource-locator
/// object `{ "mode": ..., "value": ... }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Text(String),
    Number(serde_json::Number),
    Locator { value: Value },
}

impl ResourceRef {
    /// The referenced value as trimmed text, or `None` when blank.
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            ResourceRef::Text(s) => s.trim().to_string(),
            ResourceRef::Number(n) => n.to_string(),
            ResourceRef::Locator { value } => match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => String::new(),
            },
        };
        (!text.is_empty()).then_some(text)
    }
}

impl From<&str> for ResourceRef {
    fn from(text: &str) -> Self {
        ResourceRef::Text(text.to_string())
    }
}

fn default_true() -> bool {
    true
}

fn default_binary_property() -> String {
    "data".to_string()
}

/// Parameters of one node invocation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeInput {
    pub operation: String,
    pub collection_name: Option<ResourceRef>,
    pub record_id: Option<ResourceRef>,
    pub data: Option<JsonParam>,

    pub bulk_data: Option<JsonParam>,
    #[serde(default = "default_true")]
    pub bulk_continue_on_failure: bool,

    pub fields: Option<String>,
    pub appends: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub filter: Option<JsonParam>,

    pub source_record_id: Option<ResourceRef>,
    pub target_record_id: Option<ResourceRef>,
    pub move_method: Option<String>,
    pub sort_field_name: Option<String>,
    pub target_scope_json: Option<String>,
    pub sticky_to_top: bool,

    pub selected_record_id: Option<ResourceRef>,

    pub workflow_id: Option<ResourceRef>,
    pub context_record_id: Option<ResourceRef>,

    pub upload_method: UploadMethod,
    #[serde(default = "default_binary_property")]
    pub binary_property_name: String,
    pub file_path: Option<String>,
    pub base64_content: Option<String>,
    pub upload_file_name: Option<String>,

    /// Binary attachments of the input item, keyed by property name.
    pub binary: HashMap<String, BinaryData>,
}

/// Normalize `input` into the request for a single-request operation.
///
/// # Errors
///
/// [`NodeError::UnsupportedOperation`] for unknown names (including
/// `bulkCreate`, which is not a single request), and the coercion and
/// validation errors of the individual parameters.
pub fn to_request(input: &NodeInput) -> NodeResult<OperationRequest> {
    let operation: Operation = input.operation.parse()?;
    let collection = input.collection_name.as_ref().and_then(ResourceRef::as_text);
    let record_id = input.record_id.as_ref().and_then(ResourceRef::as_text);

    let scoped = || {
        collection.clone().ok_or_else(|| {
            NodeError::Validation(format!(
                "Collection ID is required for operation '{operation}'"
            ))
        })
    };
    let record = |op: Operation| {
        record_id
            .clone()
            .ok_or_else(|| NodeError::Validation(format!("Record ID is required for {op}")))
    };

    let request = match operation {
        Operation::GetServerInfo => OperationRequest::server_info(),
        Operation::ListCustom => OperationRequest::list_custom(None),
        Operation::ListUsers => OperationRequest::list_users(None),
        Operation::ListWorkflows => OperationRequest::list_workflows(None),
        Operation::List => OperationRequest::list(scoped()?, list_query(input)),
        Operation::Get => {
            let query = QueryOptions {
                fields: non_empty(input.fields.as_deref()),
                appends: non_empty(input.appends.as_deref()),
                ..QueryOptions::default()
            };
            OperationRequest::get(scoped()?, record_id.clone(), Some(query))
        }
        Operation::Select => OperationRequest::select(
            scoped()?,
            input.selected_record_id.as_ref().and_then(ResourceRef::as_text),
        ),
        Operation::Create => OperationRequest::create(scoped()?, record_data(input)?),
        Operation::Update => {
            OperationRequest::update(scoped()?, record(operation)?, record_data(input)?)
        }
        Operation::Delete => OperationRequest::delete(scoped()?, record(operation)?),
        Operation::Move => OperationRequest::move_record(scoped()?, move_params(input)),
        Operation::UploadFile => OperationRequest::upload_file(
            scoped()?,
            upload_request(input)?,
            upload_metadata(input),
        ),
        Operation::ExecuteWorkflow => {
            let workflow_id = input
                .workflow_id
                .as_ref()
                .and_then(ResourceRef::as_text)
                .ok_or_else(|| {
                    NodeError::Validation(
                        "Workflow ID is required for executeWorkflow operation".into(),
                    )
                })?;
            let data = workflow_data(input, &workflow_id, collection.as_deref());
            OperationRequest::execute_workflow(workflow_id, data)
        }
    };
    Ok(request)
}

/// Execute one input item.
///
/// Responses that arrive as JSON text are decoded; text that is not JSON
/// is a [`NodeError::Parse`].
pub async fn execute_item<T: HttpTransport>(
    client: &NocoBaseClient<T>,
    input: &NodeInput,
) -> NodeResult<Value> {
    if input.operation == BULK_CREATE {
        let collection = input
            .collection_name
            .as_ref()
            .and_then(ResourceRef::as_text)
            .ok_or_else(|| {
                NodeError::Validation(format!(
                    "Collection ID is required for operation '{BULK_CREATE}'"
                ))
            })?;
        let records = match &input.bulk_data {
            Some(raw) => coerce(raw, "Bulk Data")?.unwrap_or(Value::Null),
            None => Value::Null,
        };
        let result = bulk_create(client, &collection, records, input.bulk_continue_on_failure)
            .await?;
        return serde_json::to_value(result).map_err(|e| NodeError::Parse {
            field: "response".into(),
            message: e.to_string(),
        });
    }

    let request = to_request(input)?;
    let response = client.execute(&request).await?;
    decode_text_body(response, "response")
}

/// Run a batch of input items in order.
///
/// With `continue_on_fail` a failing item yields `{ "error": message }`
/// in its output slot; otherwise the first failure aborts the batch.
pub async fn run_items<T: HttpTransport>(
    client: &NocoBaseClient<T>,
    items: &[NodeInput],
    continue_on_fail: bool,
) -> Result<Vec<Value>, ItemError> {
    let mut output = Vec::with_capacity(items.len());
    for (item_index, input) in items.iter().enumerate() {
        tracing::info!(item_index, operation = %input.operation, "Executing NocoBase operation");
        match execute_item(client, input).await {
            Ok(value) => output.push(value),
            Err(err) => {
                tracing::error!(item_index, error = %err, code = err.code(), "NocoBase operation failed");
                if !continue_on_fail {
                    return Err(ItemError::new(item_index, err));
                }
                output.push(err.to_record());
            }
        }
    }
    Ok(output)
}

// ---- private helpers ----

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn record_data(input: &NodeInput) -> NodeResult<Option<JsonObject>> {
    match &input.data {
        Some(raw) => coerce_object(raw, "Data"),
        None => Ok(None),
    }
}

fn list_query(input: &NodeInput) -> Option<QueryOptions> {
    let filter = input.filter.as_ref().and_then(|raw| match coerce(raw, "Filter") {
        Ok(filter) => filter,
        Err(err) => {
            tracing::warn!(error = %err, "Invalid filter will be ignored");
            None
        }
    });
    let query = QueryOptions {
        fields: non_empty(input.fields.as_deref()),
        appends: non_empty(input.appends.as_deref()),
        sort: non_empty(input.sort.as_deref()),
        page: input.page,
        page_size: input.page_size,
        filter,
        ..QueryOptions::default()
    };
    (query != QueryOptions::default()).then_some(query)
}

fn move_params(input: &NodeInput) -> MoveParams {
    let text = |r: &Option<ResourceRef>| r.as_ref().and_then(ResourceRef::as_text).unwrap_or_default();
    let mut params = MoveParams::new(text(&input.source_record_id), text(&input.target_record_id));
    if let Some(method) = non_empty(input.move_method.as_deref()) {
        params.method = method;
    }
    if let Some(field) = non_empty(input.sort_field_name.as_deref()) {
        params.sort_field = field;
    }
    params.scope = non_empty(input.target_scope_json.as_deref());
    params.sticky = input.sticky_to_top;
    params
}

fn upload_request(input: &NodeInput) -> NodeResult<UploadRequest> {
    let property = input.binary_property_name.clone();
    let source = match input.upload_method {
        UploadMethod::Binary => {
            let data = input.binary.get(&property).cloned().ok_or_else(|| {
                NodeError::UploadSource(format!(
                    "No binary data found in input property '{property}'"
                ))
            })?;
            UploadSource::Binary { property, data }
        }
        UploadMethod::Filepath => {
            let path = non_empty(input.file_path.as_deref()).ok_or_else(|| {
                NodeError::UploadSource("File path is required for filepath upload".into())
            })?;
            UploadSource::FilePath(PathBuf::from(path))
        }
        UploadMethod::Base64 => UploadSource::Base64 {
            content: input.base64_content.clone().unwrap_or_default(),
            property: Some(property).filter(|p| !p.is_empty()),
        },
    };
    Ok(UploadRequest {
        source,
        file_name: non_empty(input.upload_file_name.as_deref()),
    })
}

fn upload_metadata(input: &NodeInput) -> Option<JsonObject> {
    let raw = input.data.as_ref()?;
    coerce_object(raw, "Data").unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Invalid upload metadata; proceeding without metadata");
        None
    })
}

fn workflow_data(
    input: &NodeInput,
    workflow_id: &str,
    context_collection: Option<&str>,
) -> Option<JsonObject> {
    let mut data = match input.data.as_ref().map(|raw| coerce_object(raw, "Data")) {
        Some(Ok(Some(map))) => map,
        Some(Err(err)) => {
            tracing::warn!(workflow_id, error = %err, "Invalid workflow data; proceeding with empty data");
            JsonObject::new()
        }
        _ => JsonObject::new(),
    };

    let context_record = input.context_record_id.as_ref().and_then(ResourceRef::as_text);
    if context_collection.is_some() || context_record.is_some() {
        let mut context = JsonObject::new();
        if let Some(collection) = context_collection {
            context.insert("collection".into(), json!(collection));
        }
        if let Some(record) = &context_record {
            context.insert("recordId".into(), json!(record));
        }
        match (context_collection, &context_record) {
            (Some(_), None) => tracing::warn!(
                workflow_id,
                "Context collection given without a context record ID"
            ),
            (None, Some(_)) => tracing::warn!(
                workflow_id,
                "Context record ID given without a context collection"
            ),
            _ => {}
        }
        data.insert("triggerContext".into(), Value::Object(context));
    }

    let only_empty_context = data.len() == 1
        && data
            .get("triggerContext")
            .and_then(Value::as_object)
            .is_some_and(|c| c.is_empty());
    (!data.is_empty() && !only_empty_context).then_some(data)
}
