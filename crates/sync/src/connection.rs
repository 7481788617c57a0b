// Stream Connection Manager
//
// Owns the push connection and drives it through
// Disconnected -> Connecting -> Connected -> Disconnected -> ... with a fixed
// reconnect delay. The transport handle never leaves this module; callers only
// see `ConnectionEvent`s and the derived `connected` flag.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::protocol::{decode_frame, StreamEvent};
use async_trait::async_trait;
use futures::{future, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

/// Text frames read from an open transport. The stream ends when the peer
/// closes; an `Err` item means the transport broke.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, SyncError>> + Send>>;

type OpenFuture = Pin<Box<dyn Future<Output = Result<FrameStream, SyncError>> + Send>>;

/// Something that can open the attendance stream
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self) -> Result<FrameStream, SyncError>;

    /// Human-readable address, for logs
    fn describe(&self) -> String;
}

/// WebSocket transport for the gateway's attendance stream
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.stream_url())
    }
}

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn open(&self) -> Result<FrameStream, SyncError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| SyncError::connection(&self.url, e.to_string()))?;

        Ok(text_frames(ws_stream, self.url.clone()))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reduce raw WebSocket messages to text frames.
///
/// A Close frame ends the stream even if the peer keeps the socket open.
fn text_frames<S>(messages: S, url: String) -> FrameStream
where
    S: Stream<Item = Result<Message, WsError>> + Send + 'static,
{
    let frames = messages
        .take_while(|message| {
            if let Ok(Message::Close(frame)) = message {
                debug!("Close frame received: {:?}", frame);
                return future::ready(false);
            }
            future::ready(true)
        })
        .filter_map(move |message| {
            let frame = match message {
                Ok(message) => frame_text(message).map(Ok),
                Err(e) => Some(Err(SyncError::connection(&url, e.to_string()))),
            };
            future::ready(frame)
        });
    Box::pin(frames)
}

fn frame_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.as_str().to_owned()),
        Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
            Ok(text) => Some(text.to_owned()),
            Err(_) => {
                debug!("Dropping non-UTF-8 binary frame ({} bytes)", bytes.len());
                None
            }
        },
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Torn down; no further attempts
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Transport opened; `connected` is now true
    Connected,
    /// Transport closed, broke or failed to open; `connected` is now false
    /// and exactly one reconnect is scheduled at `retry_at`
    Disconnected { reason: String, retry_at: Instant },
    /// A decoded frame
    Event(StreamEvent),
}

enum Phase {
    /// Not started yet
    Idle,
    Waiting { retry_at: Instant },
    Connecting(OpenFuture),
    Connected(FrameStream),
    Stopped,
}

pub struct ConnectionManager {
    transport: Arc<dyn StreamTransport>,
    reconnect_delay: Duration,
    phase: Phase,
    attempts: u64,
    opens: u64,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn StreamTransport>, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            reconnect_delay,
            phase: Phase::Idle,
            attempts: 0,
            opens: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.phase {
            Phase::Idle | Phase::Waiting { .. } => ConnectionState::Disconnected,
            Phase::Connecting(_) => ConnectionState::Connecting,
            Phase::Connected(_) => ConnectionState::Connected,
            Phase::Stopped => ConnectionState::Stopped,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.phase, Phase::Connected(_))
    }

    /// Pending reconnect deadline, if one is scheduled
    pub fn reconnect_at(&self) -> Option<Instant> {
        match self.phase {
            Phase::Waiting { retry_at } => Some(retry_at),
            _ => None,
        }
    }

    /// Number of open attempts so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Number of attempts that reached Connected
    pub fn opens(&self) -> u64 {
        self.opens
    }

    /// Begin the first connection attempt. No-op unless idle.
    pub fn start(&mut self) {
        if matches!(self.phase, Phase::Idle) {
            self.connect();
        }
    }

    /// Drop the transport, any in-flight open and any pending reconnect.
    pub fn shutdown(&mut self) {
        if !matches!(self.phase, Phase::Stopped) {
            info!("Closing attendance stream to {}", self.transport.describe());
        }
        self.phase = Phase::Stopped;
    }

    fn connect(&mut self) {
        self.attempts += 1;
        debug!(
            "Connecting to {} (attempt {})",
            self.transport.describe(),
            self.attempts
        );
        let transport = self.transport.clone();
        self.phase = Phase::Connecting(Box::pin(async move { transport.open().await }));
    }

    // Replacing the phase drops whatever transport or open attempt it held,
    // so a close that follows an error can never schedule a second retry.
    fn close(&mut self, reason: String) -> ConnectionEvent {
        let retry_at = Instant::now() + self.reconnect_delay;
        self.phase = Phase::Waiting { retry_at };
        ConnectionEvent::Disconnected { reason, retry_at }
    }

    /// Drive the state machine until something observable happens.
    ///
    /// Cancel-safe: all progress lives in `self`, so dropping the returned
    /// future (e.g. in a `select!`) and calling again resumes where it was.
    /// Never resolves before `start` or after `shutdown`.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        loop {
            match &mut self.phase {
                Phase::Idle | Phase::Stopped => std::future::pending::<()>().await,
                Phase::Waiting { retry_at } => {
                    let retry_at = *retry_at;
                    tokio::time::sleep_until(retry_at).await;
                    self.connect();
                }
                Phase::Connecting(open) => {
                    let result = open.as_mut().await;
                    match result {
                        Ok(frames) => {
                            self.opens += 1;
                            self.phase = Phase::Connected(frames);
                            info!("Connected to {}", self.transport.describe());
                            return ConnectionEvent::Connected;
                        }
                        Err(e) => {
                            warn!(
                                "Connection attempt failed, retrying in {:?}: {}",
                                self.reconnect_delay, e
                            );
                            return self.close(e.to_string());
                        }
                    }
                }
                Phase::Connected(frames) => {
                    let item = frames.next().await;
                    match item {
                        Some(Ok(text)) => match decode_frame(&text) {
                            Ok(event) => return ConnectionEvent::Event(event),
                            Err(e) => warn!("Dropping malformed frame: {}", e),
                        },
                        Some(Err(e)) => {
                            warn!(
                                "Stream error, reconnecting in {:?}: {}",
                                self.reconnect_delay, e
                            );
                            return self.close(e.to_string());
                        }
                        None => {
                            info!(
                                "Disconnected from {}, retrying in {:?}",
                                self.transport.describe(),
                                self.reconnect_delay
                            );
                            return self.close("closed by peer".to_string());
                        }
                    }
                }
            }
        }
    }
}
