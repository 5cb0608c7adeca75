/// A JSON object as produced by `serde_json`.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
