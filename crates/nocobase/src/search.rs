//! Search helpers backing dropdown/resource-locator fields.
//!
//! These never fail: a broken request yields an empty list and a
//! warning, so a misconfigured instance cannot break the editor.

use nodekit_core::envelope::{self, DATA_LIST_SHAPES, RECORD_LIST_SHAPES};
use nodekit_core::error::{NodeError, NodeResult};
use serde::Serialize;
use serde_json::Value;

use crate::client::NocoBaseClient;
use crate::operation::{OperationRequest, QueryOptions};
use crate::transport::HttpTransport;

const SEARCH_PAGE_SIZE: u32 = 20;
const SEARCH_MAX_SCANNED: usize = 100;
const SEARCH_MAX_RESULTS: usize = 10;

/// One selectable entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// User-defined collections, optionally narrowed by `filter`.
pub async fn search_collections<T: HttpTransport>(
    client: &NocoBaseClient<T>,
    filter: Option<&str>,
) -> Vec<SearchResult> {
    let base_url = client.credentials().base_url.clone();
    let outcome = async {
        let response = client.execute(&OperationRequest::list_custom(None)).await?;
        let items = envelope::list_items(&response, DATA_LIST_SHAPES)?;
        Ok::<_, NodeError>(
            items
                .iter()
                .filter_map(|c| {
                    let name = c.get("name").and_then(Value::as_str)?;
                    let label = text_field(c, &["title", "name"]).unwrap_or(name);
                    Some(SearchResult {
                        name: label.to_string(),
                        value: name.to_string(),
                        url: Some(format!("{base_url}/api/{name}")),
                    })
                })
                .filter(|r| matches_filter(filter, &[r.name.as_str(), r.value.as_str()]))
                .collect(),
        )
    }
    .await;

    degrade(outcome, "collections")
}

/// Enabled workflows, optionally narrowed by `filter`.
pub async fn search_workflows<T: HttpTransport>(
    client: &NocoBaseClient<T>,
    filter: Option<&str>,
) -> Vec<SearchResult> {
    let outcome = async {
        let response = client
            .execute(&OperationRequest::list_workflows(None))
            .await?;
        let items = envelope::list_items(&response, DATA_LIST_SHAPES)?;
        Ok::<_, NodeError>(
            items
                .iter()
                .filter(|w| w.get("enabled") == Some(&Value::Bool(true)))
                .filter_map(|w| {
                    let id = id_text(w.get("id")?)?;
                    let name = text_field(w, &["title", "name", "label"])
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Workflow ID: {id}"));
                    Some(SearchResult {
                        name,
                        value: id,
                        url: None,
                    })
                })
                .filter(|r| matches_filter(filter, &[r.name.as_str()]))
                .collect(),
        )
    }
    .await;

    degrade(outcome, "workflows")
}

/// Records of `collection` whose `search_field` contains `filter`
/// (case-insensitive). Scans the newest records first.
pub async fn search_records<T: HttpTransport>(
    client: &NocoBaseClient<T>,
    collection: &str,
    search_field: &str,
    filter: Option<&str>,
) -> Vec<SearchResult> {
    let outcome = scan_records(client, collection).await.map(|records| {
        records
            .iter()
            .filter(|r| {
                let text = r.get(search_field).map(display_text).unwrap_or_default();
                matches_filter(filter, &[text.as_str()])
            })
            .filter_map(|r| {
                let id = id_text(r.get("id")?)?;
                let label = text_field(r, &["title", "name"])
                    .map(str::to_string)
                    .or_else(|| r.get(search_field).map(display_text))
                    .unwrap_or_default();
                Some(SearchResult {
                    name: format!("{label} (ID: {id})"),
                    value: id,
                    url: None,
                })
            })
            .take(SEARCH_MAX_RESULTS)
            .collect()
    });

    degrade(outcome, collection)
}

// ---- private helpers ----

async fn scan_records<T: HttpTransport>(
    client: &NocoBaseClient<T>,
    collection: &str,
) -> NodeResult<Vec<Value>> {
    let mut records = Vec::new();
    let mut page = 1;
    while records.len() < SEARCH_MAX_SCANNED {
        let query = QueryOptions {
            sort: Some("-createdAt".to_string()),
            page: Some(page),
            page_size: Some(SEARCH_PAGE_SIZE),
            ..QueryOptions::default()
        };
        let response = client
            .execute(&OperationRequest::list(collection, Some(query)))
            .await?;
        let batch = envelope::list_items(&response, RECORD_LIST_SHAPES)?;
        if batch.is_empty() {
            break;
        }
        records.extend(batch.iter().cloned());
        page += 1;
    }
    records.truncate(SEARCH_MAX_SCANNED);
    Ok(records)
}

fn degrade(outcome: NodeResult<Vec<SearchResult>>, source: &str) -> Vec<SearchResult> {
    outcome.unwrap_or_else(|err| {
        tracing::warn!(source, error = %err, "Search failed; returning no results");
        Vec::new()
    })
}

fn matches_filter(filter: Option<&str>, candidates: &[&str]) -> bool {
    let Some(needle) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
        return true;
    };
    let needle = needle.to_lowercase();
    candidates
        .iter()
        .any(|c| c.to_lowercase().contains(&needle))
}

fn text_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn id_text(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_is_case_insensitive_substring() {
        assert!(matches_filter(Some("POST"), &["blog posts"]));
        assert!(matches_filter(None, &["anything"]));
        assert!(matches_filter(Some("  "), &["anything"]));
        assert!(!matches_filter(Some("users"), &["posts"]));
    }

    #[test]
    fn ids_render_as_text() {
        assert_eq!(id_text(&json!(5)), Some("5".into()));
        assert_eq!(id_text(&json!("abc")), Some("abc".into()));
        assert_eq!(id_text(&json!("")), None);
        assert_eq!(id_text(&json!(null)), None);
    }

    #[test]
    fn first_non_empty_text_field_wins() {
        let value = json!({"title": "", "name": "Posts"});
        assert_eq!(text_field(&value, &["title", "name"]), Some("Posts"));
    }
}
