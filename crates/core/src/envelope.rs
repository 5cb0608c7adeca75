//! Parsing of list-shaped API responses.
//!
//! NocoBase endpoints return lists either as a bare JSON array or wrapped
//! in an envelope object (`{"data": [...]}`, occasionally
//! `{"results": [...]}`). Callers name the shapes they accept, in order,
//! and get back the list or an explicit
//! [`NodeError::UnrecognizedResponseShape`] -- never a silently empty
//! result.

use serde_json::Value;

use crate::error::{json_kind, NodeError, NodeResult};

/// A known way of carrying a list in a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListShape {
    /// The body itself is the array.
    BareArray,
    /// `{"data": [...]}`
    DataArray,
    /// `{"results": [...]}`
    ResultsArray,
}

impl ListShape {
    fn key(self) -> Option<&'static str> {
        match self {
            ListShape::BareArray => None,
            ListShape::DataArray => Some("data"),
            ListShape::ResultsArray => Some("results"),
        }
    }
}

/// Shapes accepted for collection and workflow listings.
pub const DATA_LIST_SHAPES: &[ListShape] = &[ListShape::BareArray, ListShape::DataArray];

/// Shapes accepted when paging through records.
pub const RECORD_LIST_SHAPES: &[ListShape] = &[
    ListShape::BareArray,
    ListShape::DataArray,
    ListShape::ResultsArray,
];

/// Locate the list inside `response`, trying `shapes` in order.
pub fn list_items<'a>(response: &'a Value, shapes: &[ListShape]) -> NodeResult<&'a Vec<Value>> {
    let shape = detect(response, shapes)?;
    let list = match shape.key() {
        None => response.as_array(),
        Some(key) => response.get(key).and_then(Value::as_array),
    };
    list.ok_or_else(|| unrecognized(response))
}

/// Mutable variant of [`list_items`], used for in-place filtering.
pub fn list_items_mut<'a>(
    response: &'a mut Value,
    shapes: &[ListShape],
) -> NodeResult<&'a mut Vec<Value>> {
    let shape = detect(response, shapes)?;
    let list = match shape.key() {
        None => response.as_array_mut(),
        Some(key) => response.get_mut(key).and_then(Value::as_array_mut),
    };
    list.ok_or_else(|| NodeError::UnrecognizedResponseShape("list vanished".into()))
}

/// Report which of `shapes` the response matches first.
pub fn detect(response: &Value, shapes: &[ListShape]) -> NodeResult<ListShape> {
    shapes
        .iter()
        .copied()
        .find(|shape| match shape.key() {
            None => response.is_array(),
            Some(key) => response.get(key).is_some_and(Value::is_array),
        })
        .ok_or_else(|| unrecognized(response))
}

/// Turn a body that arrived as JSON text into a structured value.
///
/// Non-string values are returned unchanged.
pub fn decode_text_body(response: Value, field: &str) -> NodeResult<Value> {
    match response {
        Value::String(text) => serde_json::from_str(&text).map_err(|e| NodeError::Parse {
            field: field.to_string(),
            message: e.to_string(),
        }),
        other => Ok(other),
    }
}

fn unrecognized(response: &Value) -> NodeError {
    let description = match response {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        other => json_kind(other).to_string(),
    };
    NodeError::UnrecognizedResponseShape(description)
}
