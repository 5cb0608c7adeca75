//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (queue, history, interruption, system and
//! model information) using [`reqwest`]. Every call is retried once on
//! the `/api`-prefixed path when the primary path fails, which covers
//! both older and newer ComfyUI server layouts.

use std::time::Duration;

use serde_json::Value;

/// Timeout applied to every REST call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for a single ComfyUI instance.
#[derive(Debug, Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    /// Optional `(header name, header value)` sent with every request.
    auth: Option<(String, String)>,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ComfyUIApiError {
    /// HTTP status of the failed call, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ComfyUIApiError::ApiError { status, .. } => Some(*status),
            ComfyUIApiError::Request(e) => e.status().map(|s| s.as_u16()),
        }
    }

    /// A human-readable hint on how to fix the failure.
    pub fn suggestion(&self) -> String {
        match self.status() {
            Some(403) => "403 Forbidden: check that the ComfyUI server is running, that the \
                          server URL is correct (usually http://127.0.0.1:8188), that no access \
                          restriction is enabled in its launch arguments, and the firewall"
                .to_string(),
            Some(404) => "404 Not Found: the endpoint does not exist; the ComfyUI version may be \
                          too old for this API or the URL path is wrong"
                .to_string(),
            Some(500) => "500 Internal Server Error: check the ComfyUI server logs, restart the \
                          server, and check its resource usage"
                .to_string(),
            Some(status) => format!("HTTP {status} error: {self}"),
            None => match self {
                ComfyUIApiError::Request(e) if e.is_connect() => {
                    "Connection refused: the ComfyUI server is not running or not reachable; \
                     check the address and port"
                        .to_string()
                }
                ComfyUIApiError::Request(e) if e.is_timeout() => {
                    "Request timed out: the server is responding slowly; check the network \
                     and the server load"
                        .to_string()
                }
                other => format!("Network error: {other}"),
            },
        }
    }
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    /// * `auth`    - Optional header name and value added to every request.
    pub fn new(api_url: String, auth: Option<(String, String)>) -> Result<Self, ComfyUIApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, api_url, auth))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: String,
        auth: Option<(String, String)>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// HTTP API base URL (e.g. `http://host:8188`).
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// `GET {path}`, falling back to `GET /api{path}`.
    ///
    /// `path` starts with `/` and may carry a query string.
    pub async fn get_json(&self, path: &str) -> Result<Value, ComfyUIApiError> {
        match self.send(reqwest::Method::GET, path, None).await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!(path, error = %e, "Primary path failed, trying /api fallback");
                self.send(reqwest::Method::GET, &format!("/api{path}"), None)
                    .await
            }
        }
    }

    /// `POST {path}` with a JSON body, falling back to `POST /api{path}`.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ComfyUIApiError> {
        match self.send(reqwest::Method::POST, path, Some(body)).await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!(path, error = %e, "Primary path failed, trying /api fallback");
                self.send(reqwest::Method::POST, &format!("/api{path}"), Some(body))
                    .await
            }
        }
    }

    // ---- private helpers ----

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ComfyUIApiError> {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.api_url, path));
        if let Some((name, value)) = &self.auth {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::parse_response(response).await
    }

    /// Turn a non-2xx response into [`ComfyUIApiError::ApiError`].
    ///
    /// ComfyUI reports failures as `{"error": {"message": ..}}` or
    /// `{"error": ".."}`; that message becomes the error body, otherwise
    /// the raw text is kept. The status hint is logged with the failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let err = ComfyUIApiError::ApiError {
            status: status.as_u16(),
            body: comfyui_error_message(&text).unwrap_or(text),
        };
        tracing::warn!(
            %url,
            status = status.as_u16(),
            error = %err,
            suggestion = %err.suggestion(),
            "ComfyUI request failed",
        );
        Err(err)
    }

    /// Parse a successful response body. Empty bodies (common for POSTs)
    /// become [`Value::Null`]; non-JSON bodies are returned as text.
    async fn parse_response(response: reqwest::Response) -> Result<Value, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

/// The message out of a ComfyUI JSON error body, if there is one.
fn comfyui_error_message(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}
