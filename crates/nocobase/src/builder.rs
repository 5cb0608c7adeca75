//! Request builder: maps an [`OperationRequest`] onto an HTTP request.
//!
//! This module performs no I/O. Everything it needs (filenames, file
//! bytes, metadata) is resolved up front so the resulting
//! [`HttpRequestDescriptor`] can be executed by any [`HttpTransport`].
//!
//! [`HttpTransport`]: crate::transport::HttpTransport

use nodekit_core::error::{NodeError, NodeResult};
use nodekit_core::types::JsonObject;
use reqwest::Method;
use serde_json::{json, Value};

use crate::credentials::NocoBaseCredentials;
use crate::operation::{
    MoveParams, Operation, OperationRequest, QueryOptions, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
};
use crate::request::{HttpRequestDescriptor, MultipartBody, RequestBody};
use crate::upload;

/// Query keys whose empty-string value means "not set".
const DROP_WHEN_EMPTY: &[&str] = &["fields", "sort", "appends", "except", "targetId"];

/// Build the HTTP request for `request`.
///
/// # Errors
///
/// [`NodeError::Validation`] when a field the operation requires is
/// missing, [`NodeError::UploadSource`] when an upload payload cannot be
/// resolved.
pub fn build(
    credentials: &NocoBaseCredentials,
    request: &OperationRequest,
) -> NodeResult<HttpRequestDescriptor> {
    let op = request.operation;
    let collection = if op.is_collection_scoped() {
        Some(required_collection(request)?)
    } else {
        None
    };
    let record_id = request.record_id.as_deref().filter(|id| !id.is_empty());

    let (method, path, query, body) = match op {
        Operation::GetServerInfo => (Method::GET, "app:getInfo".to_string(), Vec::new(), None),
        Operation::ListCustom => (
            Method::GET,
            "collections:list".to_string(),
            passthrough_query(request.query.as_ref()),
            None,
        ),
        Operation::ListUsers => (
            Method::GET,
            "users:list".to_string(),
            passthrough_query(request.query.as_ref()),
            None,
        ),
        Operation::ListWorkflows => (
            Method::GET,
            "workflows:list".to_string(),
            passthrough_query(request.query.as_ref()),
            None,
        ),
        Operation::List => (
            Method::GET,
            collection_path(collection, "list"),
            list_query(request.query.as_ref()),
            None,
        ),
        Operation::Get | Operation::Select => {
            let mut query = Vec::new();
            if let Some(id) = record_id {
                query.push(("filterByTk".to_string(), json!(id)));
            }
            if let Some(options) = &request.query {
                push_opt(&mut query, "fields", options.fields.as_deref());
                push_opt(&mut query, "appends", options.appends.as_deref());
            }
            (Method::GET, collection_path(collection, "get"), query, None)
        }
        Operation::Create => (
            Method::POST,
            collection_path(collection, "create"),
            Vec::new(),
            Some(json_body(request.data.as_ref())),
        ),
        Operation::Update => {
            let id = required_record_id(record_id, op)?;
            (
                Method::POST,
                collection_path(collection, "update"),
                vec![("filterByTk".to_string(), json!(id))],
                Some(json_body(request.data.as_ref())),
            )
        }
        Operation::Delete => {
            let id = required_record_id(record_id, op)?;
            (
                Method::POST,
                collection_path(collection, "destroy"),
                vec![("filterByTk".to_string(), json!(id))],
                None,
            )
        }
        Operation::Move => {
            let params = request.move_params.as_ref().ok_or_else(|| {
                NodeError::Validation("Source and target record IDs are required for move".into())
            })?;
            (
                Method::POST,
                collection_path(collection, "move"),
                move_query(params)?,
                None,
            )
        }
        Operation::UploadFile => {
            return build_upload(credentials, request, collection_path(collection, "create"));
        }
        Operation::ExecuteWorkflow => {
            let id = record_id.ok_or_else(|| {
                NodeError::Validation("Workflow ID is required for executeWorkflow".into())
            })?;
            (
                Method::POST,
                "workflows".to_string(),
                vec![("triggerWorkflows".to_string(), json!(id))],
                Some(json_body(request.data.as_ref())),
            )
        }
    };

    let mut headers = base_headers(credentials);
    if body.is_some() {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }

    Ok(HttpRequestDescriptor {
        method,
        url: credentials.api_url(&path),
        headers,
        query: clean_query(query),
        body: body.map_or(RequestBody::None, RequestBody::Json),
    })
}

/// Build the existence/enabled pre-check issued before `executeWorkflow`.
pub fn build_workflow_check(
    credentials: &NocoBaseCredentials,
    workflow_id: &str,
) -> HttpRequestDescriptor {
    HttpRequestDescriptor {
        method: Method::GET,
        url: credentials.api_url("workflows:list"),
        headers: base_headers(credentials),
        query: vec![("filter".to_string(), json!({ "id": workflow_id }))],
        body: RequestBody::None,
    }
}

// ---- private helpers ----

fn build_upload(
    credentials: &NocoBaseCredentials,
    request: &OperationRequest,
    path: String,
) -> NodeResult<HttpRequestDescriptor> {
    let upload = request.upload.as_ref().ok_or_else(|| {
        NodeError::UploadSource("No file payload was provided for uploadFile".into())
    })?;
    let file = upload::resolve_file_part(upload)?;
    let fields = upload::metadata_fields(request.data.as_ref());

    tracing::debug!(
        file_name = %file.file_name,
        mime_type = %file.mime_type,
        size = file.bytes.len(),
        fields = fields.len(),
        "Prepared multipart upload"
    );

    // The transport sets the boundary-qualified Content-Type for multipart.
    Ok(HttpRequestDescriptor {
        method: Method::POST,
        url: credentials.api_url(&path),
        headers: base_headers(credentials),
        query: Vec::new(),
        body: RequestBody::Multipart(MultipartBody { file, fields }),
    })
}

fn base_headers(credentials: &NocoBaseCredentials) -> Vec<(String, String)> {
    vec![
        (
            "Authorization".to_string(),
            format!("Bearer {}", credentials.token),
        ),
        ("Accept".to_string(), "application/json".to_string()),
    ]
}

fn required_collection(request: &OperationRequest) -> NodeResult<&str> {
    request
        .collection
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            NodeError::Validation(format!(
                "Collection name is required for {}",
                request.operation
            ))
        })
}

fn required_record_id(record_id: Option<&str>, op: Operation) -> NodeResult<&str> {
    record_id.ok_or_else(|| NodeError::Validation(format!("Record ID is required for {op}")))
}

fn collection_path(collection: Option<&str>, action: &str) -> String {
    format!("{}:{action}", collection.unwrap_or_default())
}

fn json_body(data: Option<&JsonObject>) -> Value {
    data.map_or_else(|| json!({}), |map| Value::Object(map.clone()))
}

fn push_opt(query: &mut Vec<(String, Value)>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        query.push((key.to_string(), json!(value)));
    }
}

fn list_query(options: Option<&QueryOptions>) -> Vec<(String, Value)> {
    let Some(options) = options else {
        return Vec::new();
    };
    let mut query = Vec::new();
    push_opt(&mut query, "fields", options.fields.as_deref());
    push_opt(&mut query, "appends", options.appends.as_deref());
    push_opt(&mut query, "sort", options.sort.as_deref());
    if let Some(page) = options.page.filter(|p| *p != DEFAULT_PAGE) {
        query.push(("page".to_string(), json!(page)));
    }
    if let Some(size) = options.page_size.filter(|s| *s != DEFAULT_PAGE_SIZE) {
        query.push(("pageSize".to_string(), json!(size)));
    }
    if let Some(filter) = options.filter.as_ref().filter(|f| !is_empty_container(f)) {
        query.push(("filter".to_string(), filter.clone()));
    }
    query.extend(options.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    query
}

fn passthrough_query(options: Option<&QueryOptions>) -> Vec<(String, Value)> {
    let Some(options) = options else {
        return Vec::new();
    };
    match serde_json::to_value(options) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => Vec::new(),
    }
}

fn move_query(params: &MoveParams) -> NodeResult<Vec<(String, Value)>> {
    if params.source_id.is_empty() {
        return Err(NodeError::Validation(
            "Source record ID is required for move".into(),
        ));
    }
    let mut query = vec![
        ("sourceId".to_string(), json!(params.source_id)),
        ("targetId".to_string(), json!(params.target_id)),
        ("method".to_string(), json!(params.method)),
        ("sortField".to_string(), json!(params.sort_field)),
    ];
    if let Some(scope) = params.scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query.push(("targetScope".to_string(), json!(scope)));
    }
    query.push(("sticky".to_string(), json!(params.sticky)));
    Ok(query)
}

/// Drop unset values: `null` anywhere, and empty strings for the keys
/// NocoBase treats as "not set". Everything else, including `false` and
/// `0`, is kept.
fn clean_query(query: Vec<(String, Value)>) -> Vec<(String, Value)> {
    query
        .into_iter()
        .filter(|(key, value)| match value {
            Value::Null => false,
            Value::String(s) if s.is_empty() => !DROP_WHEN_EMPTY.contains(&key.as_str()),
            _ => true,
        })
        .collect()
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Null => true,
        _ => false,
    }
}
