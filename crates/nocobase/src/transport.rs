//! HTTP transport seam.
//!
//! [`HttpTransport`] executes a fully built [`HttpRequestDescriptor`] and
//! hands back the decoded response body. [`ReqwestTransport`] is the
//! production implementation; tests can substitute their own.

use async_trait::async_trait;
use nodekit_core::error::{NodeError, NodeResult};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::request::{HttpRequestDescriptor, MultipartBody, RequestBody, FILE_FIELD};

/// Performs the network I/O for a built request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and return the response body.
    ///
    /// JSON bodies are returned parsed; any other non-empty body is
    /// returned as [`Value::String`], and an empty body as [`Value::Null`].
    async fn send(&self, request: HttpRequestDescriptor) -> NodeResult<Value>;
}

/// [`HttpTransport`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client (connection pooling, custom timeouts).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequestDescriptor) -> NodeResult<Value> {
        let query = request.query_pairs();
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        builder = match request.body {
            RequestBody::None => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(body) => builder.multipart(multipart_form(body)?),
        };

        tracing::debug!(method = %request.method, url = %request.url, "Sending NocoBase request");

        let response = builder.send().await.map_err(network_error)?;
        let response = ensure_success(response).await?;
        let text = response.text().await.map_err(network_error)?;
        Ok(decode_body(text))
    }
}

// ---- private helpers ----

fn multipart_form(body: MultipartBody) -> NodeResult<Form> {
    let file = body.file;
    let part = Part::bytes(file.bytes)
        .file_name(file.file_name)
        .mime_str(&file.mime_type)
        .map_err(|e| NodeError::UploadSource(format!("Invalid MIME type: {e}")))?;

    let form = body
        .fields
        .into_iter()
        .fold(Form::new().part(FILE_FIELD, part), |form, (name, value)| {
            form.text(name, value)
        });
    Ok(form)
}

/// Map a non-2xx response to [`NodeError::Api`].
async fn ensure_success(response: reqwest::Response) -> NodeResult<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(NodeError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

fn network_error(err: reqwest::Error) -> NodeError {
    NodeError::Network(err.to_string())
}

fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
