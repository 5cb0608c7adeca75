//! Sequential bulk record creation.
//!
//! Records are created one request at a time, in index order. Invalid
//! records fail locally without a network call.

use nodekit_core::error::{json_kind, NodeError, NodeResult};
use nodekit_core::types::JsonObject;
use serde::Serialize;
use serde_json::Value;

use crate::client::NocoBaseClient;
use crate::operation::OperationRequest;
use crate::transport::HttpTransport;

/// Outcome of a bulk create run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub total_records: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// One entry per processed record; shorter than `total_records` when
    /// the run stopped early.
    pub results: Vec<RecordOutcome>,
    pub summary: String,
}

/// Result of creating a single record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why a record failed.
enum Failure {
    Validation(String),
    Request(NodeError),
}

impl Failure {
    fn message(&self) -> String {
        match self {
            Failure::Validation(message) => message.clone(),
            Failure::Request(err) => err.to_string(),
        }
    }
}

/// Create every record in `records` in `collection`.
///
/// `records` may be an array of objects or a single object. When
/// `continue_on_failure` is false the run stops at the first failure.
///
/// # Errors
///
/// [`NodeError::Validation`] when there are no records to create.
pub async fn bulk_create<T: HttpTransport>(
    client: &NocoBaseClient<T>,
    collection: &str,
    records: Value,
    continue_on_failure: bool,
) -> NodeResult<BulkResult> {
    let records = match records {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    };
    if records.is_empty() {
        return Err(NodeError::Validation(
            "Bulk data must contain at least one record".into(),
        ));
    }

    let total_records = records.len();
    let mut results = Vec::with_capacity(total_records);
    let mut success_count = 0;
    let mut failure_count = 0;

    tracing::info!(collection, total_records, "Starting bulk create");

    for (index, record) in records.into_iter().enumerate() {
        let outcome = match validate_record(index, record) {
            Err(message) => Err(Failure::Validation(message)),
            Ok(data) => client
                .execute(&OperationRequest::create(collection, Some(data)))
                .await
                .map_err(Failure::Request),
        };

        match outcome {
            Ok(data) => {
                success_count += 1;
                results.push(RecordOutcome {
                    index,
                    success: true,
                    data: Some(data),
                    error: None,
                });
            }
            Err(failure) => {
                failure_count += 1;
                let message = failure.message();
                tracing::warn!(collection, index, error = %message, "Bulk record failed");
                results.push(RecordOutcome {
                    index,
                    success: false,
                    data: None,
                    error: Some(message.clone()),
                });

                if !continue_on_failure {
                    let reason = match failure {
                        Failure::Validation(_) => "validation error",
                        Failure::Request(_) => "error",
                    };
                    return Ok(BulkResult {
                        total_records,
                        success_count,
                        failure_count,
                        results,
                        summary: format!(
                            "Bulk create stopped at record {index} due to {reason}: {message}"
                        ),
                    });
                }
            }
        }
    }

    let summary = if failure_count == 0 {
        format!("Successfully created all {total_records} records")
    } else if success_count == 0 {
        format!("Failed to create all {total_records} records")
    } else {
        format!("Created {success_count} of {total_records} records ({failure_count} failures)")
    };
    tracing::info!(collection, success_count, failure_count, "Bulk create finished");

    Ok(BulkResult {
        total_records,
        success_count,
        failure_count,
        results,
        summary,
    })
}

fn validate_record(index: usize, record: Value) -> Result<JsonObject, String> {
    match record {
        Value::Object(map) if map.is_empty() => {
            Err(format!("Record at index {index} is an empty object"))
        }
        Value::Object(map) => Ok(map),
        other => Err(format!(
            "Record at index {index} is not a valid object (got {})",
            json_kind(&other)
        )),
    }
}
