//! Fully specified HTTP requests, ready for a transport to execute.

use reqwest::Method;
use serde_json::Value;

/// Form field name of the file part in upload requests.
pub const FILE_FIELD: &str = "file";

/// An HTTP request described as data.
///
/// At most one body kind is set; multipart requests never carry a query
/// string or a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestDescriptor {
    pub method: Method,
    pub url: String,
    /// Header pairs in insertion order.
    pub headers: Vec<(String, String)>,
    /// Query parameters in insertion order. Empty values are already dropped.
    pub query: Vec<(String, Value)>,
    pub body: RequestBody,
}

/// Body of an [`HttpRequestDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    None,
    Json(Value),
    Multipart(MultipartBody),
}

/// A `multipart/form-data` body: one file part plus flat text fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartBody {
    pub file: FilePart,
    /// Sidecar fields in insertion order; object values are JSON text.
    pub fields: Vec<(String, String)>,
}

/// The file part of a multipart upload.
#[derive(Clone, PartialEq)]
pub struct FilePart {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl HttpRequestDescriptor {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the query parameter `key`.
    pub fn query_value(&self, key: &str) -> Option<&Value> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Query parameters rendered as strings.
    ///
    /// Strings are sent verbatim, numbers and booleans via their JSON
    /// text, and objects/arrays (e.g. `filter`) as compact JSON.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .map(|(k, v)| (k.clone(), render_query_value(v)))
            .collect()
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn multipart_body(&self) -> Option<&MultipartBody> {
        match &self.body {
            RequestBody::Multipart(body) => Some(body),
            _ => None,
        }
    }
}

fn render_query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_values_render_as_text() {
        let request = HttpRequestDescriptor {
            method: Method::GET,
            url: "http://x/api/posts:list".into(),
            headers: vec![("Accept".into(), "application/json".into())],
            query: vec![
                ("fields".into(), json!("id,title")),
                ("page".into(), json!(2)),
                ("sticky".into(), json!(false)),
                ("filter".into(), json!({"id": 5})),
            ],
            body: RequestBody::None,
        };
        assert_eq!(
            request.query_pairs(),
            vec![
                ("fields".to_string(), "id,title".to_string()),
                ("page".to_string(), "2".to_string()),
                ("sticky".to_string(), "false".to_string()),
                ("filter".to_string(), r#"{"id":5}"#.to_string()),
            ]
        );
        assert_eq!(request.header("accept"), Some("application/json"));
    }

    #[test]
    fn file_part_debug_hides_bytes() {
        let part = FilePart {
            file_name: "a.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![0; 1024],
        };
        let rendered = format!("{part:?}");
        assert!(rendered.contains("len: 1024"));
        assert!(!rendered.contains("0, 0"));
    }
}
