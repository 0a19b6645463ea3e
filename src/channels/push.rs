//! Push channel listener: a supervised WebSocket connection.
//!
//! Each connection attempt asks the API for a fresh channel token, opens
//! `<channel_url>/<token>` and feeds every frame through the
//! [`EventDecoder`]. Decoded messages go onto a bounded queue; a full
//! queue blocks the read loop, so a slow dispatcher throttles the socket
//! instead of losing messages.
//!
//! Any connect or read failure is followed by a fixed backoff and a new
//! attempt, forever. Only the cancellation token ends the loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::KworkApi;
use crate::channels::events::EventDecoder;
use crate::error::ChannelError;
use crate::pipeline::types::InboundMessage;

/// Text frames of one open connection. Ends or errors when the connection drops.
pub type FrameStream = BoxStream<'static, Result<String, ChannelError>>;

/// Opens push channel connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<FrameStream, ChannelError>;
}

/// WebSocket connector over tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<FrameStream, ChannelError> {
        let (ws, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| ChannelError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        let frames = ws.filter_map(|item| async move {
            match item {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        debug!("Skipping non-UTF-8 binary frame");
                        None
                    }
                },
                Ok(Message::Close(_)) => Some(Err(ChannelError::Closed)),
                Ok(_) => None,
                Err(e) => Some(Err(ChannelError::Read(e.to_string()))),
            }
        });

        Ok(frames.boxed())
    }
}

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Supervises the push connection and produces inbound messages.
pub struct PushListener {
    api: Arc<dyn KworkApi>,
    decoder: EventDecoder,
    connector: Arc<dyn Connector>,
    channel_url: String,
    backoff: Duration,
    state: watch::Sender<ConnectionState>,
}

impl PushListener {
    pub fn new(
        api: Arc<dyn KworkApi>,
        decoder: EventDecoder,
        connector: Arc<dyn Connector>,
        channel_url: impl Into<String>,
        backoff: Duration,
    ) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            api,
            decoder,
            connector,
            channel_url: channel_url.into().trim_end_matches('/').to_string(),
            backoff,
            state,
        }
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "Push channel state change");
        }
    }

    fn channel_endpoint(&self, token: &str) -> String {
        format!("{}/{token}", self.channel_url)
    }

    /// Run until cancelled or until the queue's receiver is dropped.
    ///
    /// Returns `Err(ChannelError::Cancelled)` on cancellation and `Ok(())`
    /// when nobody is consuming messages any more. Connection failures
    /// never end the loop.
    pub async fn run(
        &self,
        tx: mpsc::Sender<InboundMessage>,
        cancel: CancellationToken,
    ) -> Result<(), ChannelError> {
        let mut attempt: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                self.set_state(ConnectionState::Closing);
                return Err(ChannelError::Cancelled);
            }

            attempt += 1;
            match self.listen_once(&tx, &cancel).await {
                Ok(()) => {
                    info!("Message queue closed, push listener stopping");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                Err(ChannelError::Cancelled) => {
                    self.set_state(ConnectionState::Closing);
                    return Err(ChannelError::Cancelled);
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    warn!(
                        attempt,
                        error = %e,
                        "WebSocket error, reconnecting in {} seconds...",
                        self.backoff.as_secs_f64()
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.set_state(ConnectionState::Closing);
                    return Err(ChannelError::Cancelled);
                }
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }

    /// One connection: token → connect → read until failure.
    ///
    /// `Ok(())` means the receiver was dropped.
    async fn listen_once(
        &self,
        tx: &mpsc::Sender<InboundMessage>,
        cancel: &CancellationToken,
    ) -> Result<(), ChannelError> {
        self.set_state(ConnectionState::Connecting);

        let token = tokio::select! {
            _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
            token = self.api.fetch_channel_token() => token?,
        };
        let url = self.channel_endpoint(&token);

        let mut frames = tokio::select! {
            _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
            frames = self.connector.connect(&url) => frames?,
        };
        self.set_state(ConnectionState::Connected);
        info!(url = %url, "Push channel connected");

        loop {
            // Dropping `frames` on cancellation closes the socket.
            let frame = tokio::select! {
                _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
                frame = frames.next() => frame,
            };

            let raw = match frame {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => return Err(e),
                None => return Err(ChannelError::Closed),
            };

            let decoded = tokio::select! {
                _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
                decoded = self.decoder.decode(&raw) => decoded,
            };
            let Some(message) = decoded else {
                continue;
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
                sent = tx.send(message) => {
                    if sent.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}
