use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::api::SlackWebClient;
use crate::events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// One Socket Mode session. `next_envelope` yields `Ok(None)` once Slack
/// closes or refreshes the session.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Frames Slack sends over a Socket Mode connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
    Other { frame_type: String },
}

pub fn parse_socket_frame(text: &str) -> Result<SocketFrame, TransportError> {
    let frame: Value = serde_json::from_str(text)
        .map_err(|error| TransportError::Receive(format!("malformed socket frame: {error}")))?;
    let frame_type = frame.get("type").and_then(Value::as_str).unwrap_or_default();
    let payload = frame.get("payload").unwrap_or(&Value::Null);

    let event = match frame_type {
        "hello" => return Ok(SocketFrame::Hello),
        "disconnect" => {
            let reason = frame.get("reason").and_then(Value::as_str).unwrap_or("unknown");
            return Ok(SocketFrame::Disconnect { reason: reason.to_owned() });
        }
        "events_api" => SlackEvent::from_events_api(payload),
        "slash_commands" => SlackEvent::from_slash_command(payload),
        "interactive" => SlackEvent::from_interactive(payload),
        other => return Ok(SocketFrame::Other { frame_type: other.to_owned() }),
    };

    let envelope_id = frame
        .get("envelope_id")
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::Receive(format!("{frame_type} frame without envelope_id")))?;
    Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id: envelope_id.to_owned(), event }))
}

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a real WebSocket: `apps.connections.open` with the app
/// token, then JSON frames in both directions.
pub struct WebSocketTransport {
    web: SlackWebClient,
    app_token: SecretString,
    stream: Mutex<Option<SocketStream>>,
}

impl WebSocketTransport {
    pub fn new(web: SlackWebClient, app_token: SecretString) -> Self {
        Self { web, app_token, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .web
            .open_socket_connection(&self.app_token)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _) =
            connect_async(url).await.map_err(|error| TransportError::Connect(error.to_string()))?;
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Ok(None);
        };

        while let Some(message) = stream.next().await {
            let message = message.map_err(|error| TransportError::Receive(error.to_string()))?;
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            match parse_socket_frame(text.as_str()) {
                Ok(SocketFrame::Envelope(envelope)) => return Ok(Some(envelope)),
                Ok(SocketFrame::Hello) => debug!("socket mode session ready"),
                Ok(SocketFrame::Disconnect { reason }) => {
                    info!(reason = %reason, "slack requested socket mode disconnect");
                    break;
                }
                Ok(SocketFrame::Other { frame_type }) => {
                    debug!(frame_type = %frame_type, "ignoring socket mode frame");
                }
                Err(error) => warn!(error = %error, "dropping unreadable socket mode frame"),
            }
        }

        *guard = None;
        Ok(None)
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("socket is not connected".to_owned()))?;
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        stream
            .send(Message::text(ack))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: Arc<EventDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Runs sessions until reconnects are exhausted or `shutdown` flips to
    /// true. A session Slack ends on its own resets the retry budget; envelopes
    /// already acknowledged are always drained before returning.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut in_flight = JoinSet::new();
        let mut attempt = 0;

        while !*shutdown.borrow() {
            match self.connect_and_pump(attempt, &mut in_flight, &mut shutdown).await {
                Ok(SessionEnd::Closed) => {
                    info!(
                        event_name = "ingress.slack.session_ended",
                        correlation_id = "socket",
                        "socket mode session ended; reconnecting"
                    );
                    attempt = 0;
                }
                Ok(SessionEnd::Stopped) => break,
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stop_requested(&mut shutdown) => break,
                    }
                    attempt += 1;
                }
            }
        }

        if !in_flight.is_empty() {
            info!(
                event_name = "ingress.slack.draining",
                correlation_id = "socket",
                in_flight = in_flight.len(),
                "waiting for acknowledged envelopes to finish"
            );
        }
        while in_flight.join_next().await.is_some() {}
        Ok(())
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        in_flight: &mut JoinSet<()>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            while in_flight.try_join_next().is_some() {}

            let next = tokio::select! {
                next = self.transport.next_envelope() => next?,
                _ = stop_requested(shutdown) => {
                    info!(
                        event_name = "ingress.slack.stopping",
                        correlation_id = "socket",
                        "shutdown requested; closing socket mode session"
                    );
                    if let Err(error) = self.transport.disconnect().await {
                        debug!(error = %error, "socket mode disconnect failed during shutdown");
                    }
                    return Ok(SessionEnd::Stopped);
                }
            };
            let Some(envelope) = next else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(SessionEnd::Closed);
            };
            let (channel_id, thread_ts) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.unwrap_or("unknown"),
                thread_ts = thread_ts.unwrap_or("unknown"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let dispatcher = self.dispatcher.clone();
            in_flight.spawn(dispatch_envelope(dispatcher, envelope));
        }
    }
}

enum SessionEnd {
    Closed,
    Stopped,
}

/// Resolves once shutdown is signalled; a dropped sender never stops the runner.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stopping| *stopping).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Dispatches one acknowledged envelope; failures are logged, never raised.
pub async fn dispatch_envelope(dispatcher: Arc<EventDispatcher>, envelope: SlackEnvelope) {
    let context = EventContext { correlation_id: envelope.envelope_id.clone() };
    if let Err(error) = dispatcher.dispatch(&envelope, &context).await {
        let (channel_id, thread_ts) = correlation_fields(&envelope);
        warn!(
            event_name = "ingress.slack.dispatch_failed",
            envelope_id = %envelope.envelope_id,
            correlation_id = %envelope.envelope_id,
            channel_id = channel_id.unwrap_or("unknown"),
            thread_ts = thread_ts.unwrap_or("unknown"),
            error = %error,
            "event dispatch failed"
        );
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::AppMention(event) => (Some(&event.channel_id), Some(event.reply_thread())),
        SlackEvent::Message(event) => (Some(&event.channel_id), event.thread_ts.as_deref()),
        SlackEvent::SlashCommand(payload) => (Some(&payload.channel_id), None),
        SlackEvent::BlockAction(event) => (event.channel_id.as_deref(), event.message_ts.as_deref()),
        SlackEvent::ViewSubmission(_) | SlackEvent::Unsupported { .. } => (None, None),
    }
}
