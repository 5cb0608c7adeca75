//! WebSocket session loop.
//!
//! Reads frames from one open ComfyUI connection, filters them, and
//! forwards matching messages as [`EmittedEvent`]s until the socket
//! closes, fails, or the trigger is stopped. The optional heartbeat
//! timer lives inside the session and is dropped with it.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::client::ComfyUIClientError;
use crate::events::EmittedEvent;
use crate::messages::{parse_message, EventFilter};

/// Everything a session needs besides the socket.
pub struct SessionContext<'a> {
    pub client_id: &'a str,
    pub source_url: &'a str,
    pub filter: &'a EventFilter,
    /// Ping period; `None` disables the heartbeat.
    pub heartbeat: Option<Duration>,
    pub events: &'a mpsc::Sender<EmittedEvent>,
    pub cancel: &'a CancellationToken,
}

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The peer closed the connection or the stream ended.
    Closed,
    /// The trigger was stopped; a close frame was sent.
    Cancelled,
    /// Nobody is listening for events any more.
    ReceiverDropped,
    /// A receive or send error ended the connection.
    Failed(ComfyUIClientError),
}

/// Process messages from an open connection until it ends.
pub async fn run_session<S>(ws: &mut WebSocketStream<S>, ctx: &SessionContext<'_>) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut heartbeat = ctx.heartbeat.map(|period| {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    });

    loop {
        tokio::select! {
            biased;

            _ = ctx.cancel.cancelled() => {
                if let Err(e) = ws.close(None).await {
                    tracing::debug!(client_id = %ctx.client_id, error = %e, "Close on stop failed");
                }
                return SessionEnd::Cancelled;
            }
            _ = next_tick(&mut heartbeat) => {
                tracing::trace!(client_id = %ctx.client_id, "Sending heartbeat ping");
                if let Err(e) = ws.send(Message::Ping(Vec::new())).await {
                    tracing::error!(client_id = %ctx.client_id, error = %e, "Heartbeat ping failed");
                    return SessionEnd::Failed(ComfyUIClientError::Protocol(e.to_string()));
                }
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !forward_text(&text, ctx).await {
                        return SessionEnd::ReceiverDropped;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    // Preview images; the trigger only forwards JSON messages.
                    tracing::trace!(client_id = %ctx.client_id, "Ignoring binary message");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(client_id = %ctx.client_id, ?frame, "ComfyUI WebSocket closed");
                    return SessionEnd::Closed;
                }
                Some(Err(e)) => {
                    tracing::error!(client_id = %ctx.client_id, error = %e, "WebSocket receive error");
                    return SessionEnd::Failed(ComfyUIClientError::Protocol(e.to_string()));
                }
                None => return SessionEnd::Closed,
            },
        }
    }
}

// ---- private helpers ----

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Parse, filter and forward one text frame. Returns `false` when the
/// event receiver has been dropped.
///
/// A full channel blocks the send; a stop request abandons the event so
/// the session loop can close the socket.
async fn forward_text(text: &str, ctx: &SessionContext<'_>) -> bool {
    let message = match parse_message(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(
                client_id = %ctx.client_id,
                error = %e,
                raw_message = %text,
                "Failed to parse ComfyUI message",
            );
            return true;
        }
    };

    tracing::debug!(client_id = %ctx.client_id, message_type = %message.kind, "Received ComfyUI message");
    if !ctx.filter.matches(&message) {
        return true;
    }

    let event = EmittedEvent::from_message(message, ctx.client_id, ctx.source_url);
    tokio::select! {
        sent = ctx.events.send(event) => sent.is_ok(),
        _ = ctx.cancel.cancelled() => {
            tracing::debug!(client_id = %ctx.client_id, "Dropping event pending delivery on stop");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn socket_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;
        (client, server)
    }

    fn text(s: &str) -> Message {
        Message::Text(s.to_string())
    }

    #[tokio::test]
    async fn forwards_matching_messages_and_skips_malformed() {
        let (mut client, mut server) = socket_pair().await;
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let filter = EventFilter {
            event_type: "executed".into(),
            prompt_id: None,
        };

        server.send(text("garbage")).await.unwrap();
        server
            .send(text(r#"{"type":"progress","data":{"value":1,"max":2}}"#))
            .await
            .unwrap();
        server
            .send(text(r#"{"type":"executed","data":{"prompt_id":"p1"}}"#))
            .await
            .unwrap();
        server.close(None).await.unwrap();

        let ctx = SessionContext {
            client_id: "c1",
            source_url: "ws://test/ws?clientId=c1",
            filter: &filter,
            heartbeat: None,
            events: &tx,
            cancel: &cancel,
        };
        let end = run_session(&mut client, &ctx).await;
        assert_matches!(end, SessionEnd::Closed);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "executed");
        assert_eq!(event.data["prompt_id"], "p1");
        assert_eq!(event.instance_id.as_deref(), Some("c1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancellation_ends_the_session() {
        let (mut client, _server) = socket_pair().await;
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let filter = EventFilter::default();

        let ctx = SessionContext {
            client_id: "c1",
            source_url: "ws://test",
            filter: &filter,
            heartbeat: None,
            events: &tx,
            cancel: &cancel,
        };
        assert_matches!(run_session(&mut client, &ctx).await, SessionEnd::Cancelled);
    }

    #[tokio::test]
    async fn dropped_receiver_ends_the_session() {
        let (mut client, mut server) = socket_pair().await;
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let cancel = CancellationToken::new();
        let filter = EventFilter::default();

        server.send(text(r#"{"type":"status","data":{}}"#)).await.unwrap();

        let ctx = SessionContext {
            client_id: "c1",
            source_url: "ws://test",
            filter: &filter,
            heartbeat: None,
            events: &tx,
            cancel: &cancel,
        };
        assert_matches!(
            run_session(&mut client, &ctx).await,
            SessionEnd::ReceiverDropped
        );
    }

    #[tokio::test]
    async fn stop_interrupts_a_send_blocked_on_a_full_channel() {
        let (mut client, mut server) = socket_pair().await;
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let filter = EventFilter::default();

        for _ in 0..3 {
            server.send(text(r#"{"type":"status","data":{}}"#)).await.unwrap();
        }

        let session_cancel = cancel.clone();
        let session = tokio::spawn(async move {
            let ctx = SessionContext {
                client_id: "c1",
                source_url: "ws://test",
                filter: &filter,
                heartbeat: None,
                events: &tx,
                cancel: &session_cancel,
            };
            run_session(&mut client, &ctx).await
        });

        // Let the session fill the channel and park on the second send.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!session.is_finished());

        cancel.cancel();
        let end = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .expect("session ignored the stop request")
            .unwrap();
        assert_matches!(end, SessionEnd::Cancelled);

        // The live socket was closed from the client side.
        let mut saw_close = false;
        while let Some(Ok(msg)) = server.next().await {
            if msg.is_close() {
                saw_close = true;
                break;
            }
        }
        assert!(saw_close);
        assert_eq!(rx.recv().await.unwrap().event, "status");
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pings_once_per_interval_while_open() {
        let (mut client, mut server) = socket_pair().await;
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let filter = EventFilter::default();
        let period = Duration::from_secs(30);

        let session = tokio::spawn(async move {
            let ctx = SessionContext {
                client_id: "c1",
                source_url: "ws://test",
                filter: &filter,
                heartbeat: Some(period),
                events: &tx,
                cancel: &cancel,
            };
            run_session(&mut client, &ctx).await
        });

        let start = Instant::now();
        let mut ping_times = Vec::new();
        while ping_times.len() < 3 {
            match server.next().await {
                Some(Ok(Message::Ping(_))) => ping_times.push(start.elapsed()),
                Some(Ok(_)) => {}
                other => panic!("unexpected frame: {other:?}"),
            }
        }
        assert_eq!(ping_times, vec![period, period * 2, period * 3]);

        server.close(None).await.unwrap();
        assert_matches!(session.await.unwrap(), SessionEnd::Closed);
    }
}
