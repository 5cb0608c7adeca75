//! Trigger mode: stream ComfyUI events to stdout as JSON lines.

use std::future::Future;
use std::io::Write;

use nodekit_comfyui::trigger::TriggerError;
use nodekit_comfyui::{ComfyUITrigger, EmittedEvent};
use tokio::sync::mpsc;

use crate::config::TriggerSettings;

/// Buffered events between the trigger task and the writer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Run the trigger until Ctrl-C, or until it gives up reconnecting.
pub async fn run(settings: TriggerSettings) -> Result<(), ListenError> {
    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handle = ComfyUITrigger::start(settings.trigger, Some(settings.credentials), tx)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    let mut stdout = std::io::stdout();
    let result = forward_events(&mut rx, &mut stdout, shutdown).await;
    handle.shutdown().await;

    let count = result?;
    tracing::info!(events = count, "Trigger finished");
    Ok(())
}

/// Write each received event as one JSON line until `shutdown` resolves
/// or the channel closes. Returns the number of events written.
pub async fn forward_events<W, S>(
    events: &mut mpsc::Receiver<EmittedEvent>,
    out: &mut W,
    shutdown: S,
) -> Result<usize, ListenError>
where
    W: Write,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut count = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => {
                    serde_json::to_writer(&mut *out, &event)?;
                    out.write_all(b"\n")?;
                    out.flush()?;
                    count += 1;
                }
                None => break,
            },
        }
    }

    Ok(count)
}

/// Errors from trigger mode.
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error("Failed to start trigger: {0}")]
    Start(#[from] TriggerError),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write event: {0}")]
    Output(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn event(kind: &str) -> EmittedEvent {
        EmittedEvent {
            event: kind.to_string(),
            data: json!({"node": "1"}),
            timestamp: fixed_time(),
            instance_id: Some("c1".into()),
            source_url: None,
        }
    }

    fn fixed_time() -> nodekit_core::types::Timestamp {
        "2026-01-02T03:04:05Z".parse().unwrap()
    }

    #[tokio::test]
    async fn writes_one_line_per_event_until_channel_closes() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(event("executing")).await.unwrap();
        tx.send(event("executed")).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        let count = forward_events(&mut rx, &mut out, std::future::pending())
            .await
            .unwrap();
        assert_eq!(count, 2);

        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["event"], "executing");
        assert_eq!(lines[1]["event"], "executed");
        assert_eq!(lines[1]["instanceId"], "c1");
    }

    #[tokio::test]
    async fn shutdown_stops_forwarding() {
        let (_tx, mut rx) = mpsc::channel::<EmittedEvent>(1);
        let mut out = Vec::new();
        let count = forward_events(&mut rx, &mut out, async {}).await.unwrap();
        assert_eq!(count, 0);
        assert!(out.is_empty());
    }
}
