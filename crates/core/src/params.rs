//! Coercion of JSON-ish node parameters.
//!
//! Node parameters such as `data` or `filter` reach us either as JSON
//! text typed into the editor or as an already-structured value passed
//! by an AI agent. [`JsonParam`] captures both shapes at the boundary and
//! [`coerce`] resolves them once into a canonical value, so nothing deeper
//! in the call chain has to inspect the runtime type again.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{json_kind, NodeError, NodeResult};
use crate::types::JsonObject;

/// Text produced when an object is concatenated into a string upstream.
const STRINGIFIED_OBJECT: &str = "[object Object]";

/// A parameter that is either raw JSON text or an already-parsed value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JsonParam {
    Raw(String),
    Structured(Value),
}

impl From<Value> for JsonParam {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => JsonParam::Raw(s),
            other => JsonParam::Structured(other),
        }
    }
}

impl From<&str> for JsonParam {
    fn from(raw: &str) -> Self {
        JsonParam::Raw(raw.to_string())
    }
}

impl From<String> for JsonParam {
    fn from(raw: String) -> Self {
        JsonParam::Raw(raw)
    }
}

/// Normalize a parameter into an object or array value.
///
/// Returns `Ok(None)` when the parameter counts as "not provided": an
/// empty string, the text `{}`, or a value without keys/elements.
///
/// # Errors
///
/// - [`NodeError::StringifiedObject`] for the literal `[object Object]`.
/// - [`NodeError::Parse`] for malformed JSON text or JSON text that does
///   not describe an object or array.
/// - [`NodeError::Type`] for structured values that are neither an object
///   nor an array.
pub fn coerce(raw: &JsonParam, field: &str) -> NodeResult<Option<Value>> {
    match raw {
        JsonParam::Structured(value) => match value {
            Value::Object(_) | Value::Array(_) => Ok(non_empty(value.clone())),
            other => Err(NodeError::Type {
                field: field.to_string(),
                found: json_kind(other),
            }),
        },
        JsonParam::Raw(text) => {
            if text == STRINGIFIED_OBJECT {
                return Err(NodeError::StringifiedObject {
                    field: field.to_string(),
                });
            }
            if text.trim().is_empty() || text == "{}" {
                return Ok(None);
            }

            let parsed: Value = serde_json::from_str(text).map_err(|e| NodeError::Parse {
                field: field.to_string(),
                message: e.to_string(),
            })?;

            match parsed {
                Value::Object(_) | Value::Array(_) => Ok(non_empty(parsed)),
                other => Err(NodeError::Parse {
                    field: field.to_string(),
                    message: format!("Expected an object, but got {}", json_kind(&other)),
                }),
            }
        }
    }
}

/// Like [`coerce`], but additionally requires the result to be an object.
pub fn coerce_object(raw: &JsonParam, field: &str) -> NodeResult<Option<JsonObject>> {
    match coerce(raw, field)? {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(NodeError::Parse {
            field: field.to_string(),
            message: format!("Expected an object, but got {}", json_kind(&other)),
        }),
    }
}

fn non_empty(value: Value) -> Option<Value> {
    let empty = match &value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    (!empty).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn empty_inputs_are_not_provided() {
        assert_eq!(coerce(&"{}".into(), "Data").unwrap(), None);
        assert_eq!(coerce(&"".into(), "Data").unwrap(), None);
        assert_eq!(coerce(&"   ".into(), "Data").unwrap(), None);
        assert_eq!(coerce(&JsonParam::Structured(json!({})), "Data").unwrap(), None);
        assert_eq!(coerce(&"{ }".into(), "Data").unwrap(), None);
    }

    #[test]
    fn stringified_object_is_rejected() {
        let err = coerce(&"[object Object]".into(), "Filter").unwrap_err();
        assert_matches!(err, NodeError::StringifiedObject { ref field } if field == "Filter");
    }

    #[test]
    fn string_and_structured_paths_converge() {
        let from_text = coerce(&r#"{"a":1}"#.into(), "Data").unwrap();
        let from_value = coerce(&JsonParam::Structured(json!({"a": 1})), "Data").unwrap();
        assert_eq!(from_text, from_value);
        assert_eq!(from_text, Some(json!({"a": 1})));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = coerce(&"{not json".into(), "Data").unwrap_err();
        assert_matches!(err, NodeError::Parse { ref field, .. } if field == "Data");
    }

    #[test]
    fn scalar_json_text_is_a_parse_error() {
        let err = coerce(&"42".into(), "Data").unwrap_err();
        assert_matches!(err, NodeError::Parse { ref message, .. } if message.contains("number"));
    }

    #[test]
    fn structured_scalars_are_type_errors() {
        let err = coerce(&JsonParam::Structured(json!(true)), "Data").unwrap_err();
        assert_matches!(err, NodeError::Type { found: "boolean", .. });
    }

    #[test]
    fn arrays_pass_through() {
        let value = coerce(&r#"[{"a":1},{"b":2}]"#.into(), "Bulk Data").unwrap();
        assert_eq!(value, Some(json!([{"a": 1}, {"b": 2}])));
        assert_eq!(coerce(&"[]".into(), "Bulk Data").unwrap(), None);
    }

    #[test]
    fn coerce_object_rejects_arrays() {
        let err = coerce_object(&"[1]".into(), "Data").unwrap_err();
        assert_matches!(err, NodeError::Parse { .. });
        let map = coerce_object(&r#"{"title":"x"}"#.into(), "Data").unwrap().unwrap();
        assert_eq!(map["title"], "x");
    }

    #[test]
    fn deserializes_from_either_shape() {
        let raw: JsonParam = serde_json::from_value(json!("{\"a\":1}")).unwrap();
        assert_eq!(raw, JsonParam::Raw("{\"a\":1}".into()));
        let structured: JsonParam = serde_json::from_value(json!({"a": 1})).unwrap();
        assert_eq!(structured, JsonParam::Structured(json!({"a": 1})));
    }
}
