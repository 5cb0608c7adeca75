//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`resolve_ws_url`] derives the `/ws` endpoint from the configured HTTP
//! base URL and [`connect`] opens the socket with the optional auth
//! header.

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

/// The live socket type produced by [`connect`].
pub type ComfyUISocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Build `ws(s)://<host>/ws?clientId=<client_id>` from a base URL.
///
/// `http` and `ws` map to `ws`, `https` and `wss` to `wss`. Any path on
/// the base URL is replaced.
pub fn resolve_ws_url(base_url: &str, client_id: &str) -> Result<String, ComfyUIClientError> {
    let mut url = Url::parse(base_url.trim())
        .map_err(|e| ComfyUIClientError::InvalidUrl(format!("{base_url}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ComfyUIClientError::InvalidUrl(format!(
                "{base_url}: unsupported scheme '{other}'"
            )))
        }
    };
    if url.host_str().is_none() {
        return Err(ComfyUIClientError::InvalidUrl(format!(
            "{base_url}: missing host"
        )));
    }
    url.set_scheme(scheme)
        .map_err(|()| ComfyUIClientError::InvalidUrl(format!("{base_url}: cannot use {scheme}")))?;
    url.set_path("/ws");
    url.set_query(Some(&format!("clientId={client_id}")));
    url.set_fragment(None);
    Ok(url.into())
}

/// Connect to a ComfyUI WebSocket endpoint.
///
/// `auth` is sent as a handshake header, value verbatim.
pub async fn connect(
    ws_url: &str,
    auth: Option<(&str, &str)>,
) -> Result<ComfyUISocket, ComfyUIClientError> {
    let mut request = ws_url
        .into_client_request()
        .map_err(|e| ComfyUIClientError::InvalidUrl(format!("{ws_url}: {e}")))?;

    if let Some((name, value)) = auth {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ComfyUIClientError::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ComfyUIClientError::InvalidHeader(e.to_string()))?;
        request.headers_mut().insert(name, value);
    }

    let (ws_stream, _response) = connect_async(request).await.map_err(|e| {
        ComfyUIClientError::Connection(format!("Failed to connect to ComfyUI at {ws_url}: {e}"))
    })?;

    Ok(ws_stream)
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The configured server URL cannot be turned into a WebSocket URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// The auth header name or value is not a valid HTTP header.
    #[error("Invalid auth header: {0}")]
    InvalidHeader(String),
}
