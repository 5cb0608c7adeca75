//! ComfyUI WebSocket trigger.
//!
//! [`ComfyUITrigger::start`] spawns one long-lived task that runs the
//! connect -> process -> reconnect cycle against a single ComfyUI server
//! and forwards filtered messages to the host over an mpsc channel.
//! The task owns the socket and the heartbeat timer; the host only holds
//! a [`TriggerHandle`] for stopping it and watching its state.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{connect, resolve_ws_url, ComfyUIClientError, ComfyUISocket};
use crate::events::EmittedEvent;
use crate::messages::EventFilter;
use crate::processor::{run_session, SessionContext, SessionEnd};
use crate::reconnect::RetryPolicy;

/// Header used for auth when nothing else is configured.
pub const DEFAULT_HEADER_KEY: &str = "Authorization";

/// How long [`TriggerHandle::shutdown`] waits for the task to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Stored ComfyUI credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComfyUICredentials {
    pub api_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_header_key")]
    pub header_key: String,
}

impl ComfyUICredentials {
    pub fn new(api_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_token,
            header_key: default_header_key(),
        }
    }

    /// `(header, value)` for REST calls, when a token is configured.
    pub fn auth(&self) -> Option<(String, String)> {
        let token = self.api_token.as_deref().filter(|t| !t.trim().is_empty())?;
        let key = non_empty(&self.header_key).unwrap_or(DEFAULT_HEADER_KEY);
        Some((key.to_string(), token.to_string()))
    }
}

/// Trigger parameters supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Server URL overriding the credential URL.
    pub manual_url: Option<String>,
    pub manual_header_key: Option<String>,
    pub manual_header_value: Option<String>,
    pub filter: EventFilter,
    pub retry: RetryPolicy,
    /// Ping period while connected; `None` disables the heartbeat.
    pub heartbeat: Option<Duration>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            manual_url: None,
            manual_header_key: None,
            manual_header_value: None,
            filter: EventFilter::default(),
            retry: RetryPolicy::default(),
            heartbeat: None,
        }
    }
}

impl TriggerConfig {
    /// Server base URL: manual override, then the credential URL.
    pub fn server_url(&self, credentials: Option<&ComfyUICredentials>) -> Option<String> {
        self.manual_url
            .as_deref()
            .and_then(non_empty)
            .or_else(|| credentials.and_then(|c| non_empty(&c.api_url)))
            .map(str::to_string)
    }

    /// Handshake auth header, if any value is configured.
    ///
    /// Key: manual, then credential, then `Authorization`.
    /// Value: manual, then the credential token.
    pub fn auth_header(
        &self,
        credentials: Option<&ComfyUICredentials>,
    ) -> Option<(String, String)> {
        let value = self
            .manual_header_value
            .as_deref()
            .and_then(non_empty)
            .or_else(|| {
                credentials
                    .and_then(|c| c.api_token.as_deref())
                    .filter(|t| !t.trim().is_empty())
            })?;

        let key = self
            .manual_header_key
            .as_deref()
            .and_then(non_empty)
            .or_else(|| credentials.and_then(|c| non_empty(&c.header_key)))
            .unwrap_or(DEFAULT_HEADER_KEY);

        Some((key.to_string(), value.to_string()))
    }
}

/// Connection state as observed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerConnectionState {
    Connecting,
    Open,
    Closed,
    /// Waiting out the reconnect delay.
    Reconnecting,
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerStatus {
    pub state: TriggerConnectionState,
    /// Reconnect attempts since the last successful open.
    pub retry_count: u32,
    /// Set once the task has exited and no further attempts will be made.
    pub terminal: bool,
}

/// Entry point for starting a trigger.
pub struct ComfyUITrigger;

impl ComfyUITrigger {
    /// Validate the configuration and spawn the connection task.
    ///
    /// A fresh client id is generated per trigger and reused across
    /// reconnects.
    pub fn start(
        config: TriggerConfig,
        credentials: Option<ComfyUICredentials>,
        events: mpsc::Sender<EmittedEvent>,
    ) -> Result<TriggerHandle, TriggerError> {
        let server_url = config
            .server_url(credentials.as_ref())
            .ok_or(TriggerError::MissingUrl)?;
        let auth = config.auth_header(credentials.as_ref());
        let client_id = uuid::Uuid::new_v4().to_string();

        tracing::debug!(
            server_url = %server_url,
            client_id = %client_id,
            event_type = %config.filter.event_type,
            prompt_id = ?config.filter.prompt_id,
            reconnect_interval_ms = config.retry.interval.as_millis() as u64,
            max_retries = ?config.retry.max_retries,
            "Starting ComfyUI trigger",
        );

        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(TriggerStatus {
            state: TriggerConnectionState::Connecting,
            retry_count: 0,
            terminal: false,
        });

        let task = TriggerTask {
            server_url,
            auth,
            client_id,
            config,
            events,
            status: status_tx,
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(async move {
            task.run().await;
        });

        Ok(TriggerHandle {
            cancel,
            join: Some(join),
            status: status_rx,
        })
    }
}

/// Host-side handle to a running trigger.
#[derive(Debug)]
pub struct TriggerHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
    status: watch::Receiver<TriggerStatus>,
}

impl TriggerHandle {
    /// Request a stop. Closes the live socket and suppresses any pending
    /// reconnect. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn status(&self) -> TriggerStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<TriggerStatus> {
        self.status.clone()
    }

    /// Stop and wait up to 5 seconds for the task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(join) = self.join.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, join).await.is_err() {
                tracing::warn!("ComfyUI trigger task did not exit in time");
            }
        }
    }
}

impl Drop for TriggerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Errors raised when starting a trigger.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// Neither a manual URL nor a credential URL was supplied.
    #[error("ComfyUI server URL is required: set a manual URL or configure credentials")]
    MissingUrl,
}

// ---- private helpers ----

struct TriggerTask {
    server_url: String,
    auth: Option<(String, String)>,
    client_id: String,
    config: TriggerConfig,
    events: mpsc::Sender<EmittedEvent>,
    status: watch::Sender<TriggerStatus>,
    cancel: CancellationToken,
}

impl TriggerTask {
    /// Core loop: connect -> process messages -> reconnect.
    ///
    /// Runs until stopped, until the event receiver is dropped, or until
    /// the retry budget is spent.
    async fn run(self) {
        let policy = self.config.retry;
        let mut retry_count = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.publish(TriggerConnectionState::Connecting, retry_count);

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.open() => result,
            };

            match attempt {
                Ok((mut ws, ws_url)) => {
                    retry_count = 0;
                    self.publish(TriggerConnectionState::Open, retry_count);
                    tracing::info!(client_id = %self.client_id, ws_url = %ws_url, "Connected to ComfyUI");

                    let ctx = SessionContext {
                        client_id: &self.client_id,
                        source_url: &ws_url,
                        filter: &self.config.filter,
                        heartbeat: self.config.heartbeat,
                        events: &self.events,
                        cancel: &self.cancel,
                    };
                    let end = run_session(&mut ws, &ctx).await;
                    self.publish(TriggerConnectionState::Closed, retry_count);

                    match end {
                        SessionEnd::Cancelled => break,
                        SessionEnd::ReceiverDropped => {
                            tracing::info!(client_id = %self.client_id, "Event receiver dropped, stopping trigger");
                            break;
                        }
                        SessionEnd::Closed => {
                            tracing::info!(client_id = %self.client_id, "ComfyUI connection closed");
                        }
                        SessionEnd::Failed(e) => {
                            tracing::warn!(client_id = %self.client_id, error = %e, "ComfyUI connection lost");
                        }
                    }
                }
                Err(e) => {
                    self.publish(TriggerConnectionState::Closed, retry_count);
                    tracing::warn!(
                        client_id = %self.client_id,
                        attempt = retry_count,
                        error = %e,
                        "Failed to connect to ComfyUI",
                    );
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            match policy.next_retry(retry_count) {
                Some(next) => {
                    retry_count = next;
                    self.publish(TriggerConnectionState::Reconnecting, retry_count);
                    tracing::info!(
                        client_id = %self.client_id,
                        attempt = retry_count,
                        delay_ms = policy.interval.as_millis() as u64,
                        "Scheduling reconnect",
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(policy.interval) => {}
                    }
                }
                None => {
                    tracing::error!(
                        client_id = %self.client_id,
                        max_retries = ?policy.max_retries,
                        "Reconnect attempts exhausted, giving up",
                    );
                    break;
                }
            }
        }

        self.status.send_modify(|s| {
            s.state = TriggerConnectionState::Closed;
            s.terminal = true;
        });
        tracing::info!(client_id = %self.client_id, "ComfyUI trigger stopped");
    }

    /// Resolve the ws URL and open the socket. A malformed URL fails
    /// here, on every attempt, like any other connection error.
    async fn open(&self) -> Result<(ComfyUISocket, String), ComfyUIClientError> {
        let ws_url = resolve_ws_url(&self.server_url, &self.client_id)?;
        let auth = self.auth.as_ref().map(|(k, v)| (k.as_str(), v.as_str()));
        let ws = connect(&ws_url, auth).await?;
        Ok((ws, ws_url))
    }

    fn publish(&self, state: TriggerConnectionState, retry_count: u32) {
        self.status.send_modify(|s| {
            s.state = state;
            s.retry_count = retry_count;
        });
    }
}

fn default_header_key() -> String {
    DEFAULT_HEADER_KEY.to_string()
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
