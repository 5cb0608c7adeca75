use serde::Deserialize;

/// Stored credentials for a NocoBase instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NocoBaseCredentials {
    /// Instance base URL without a trailing slash, e.g. `https://nocobase.example.com`.
    pub base_url: String,
    /// API token sent as `Authorization: Bearer <token>`.
    pub token: String,
}

impl NocoBaseCredentials {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            token: token.into(),
        }
    }

    /// Absolute URL for an `/api/...` path.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
