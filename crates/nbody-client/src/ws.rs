//! WebSocket transport built on tokio-tungstenite.
//!
//! Opening a channel spawns one task that performs the handshake and then
//! shuttles frames between the socket and the channel queues until either
//! side closes. Must be called from within a tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::connection::{Channel, ChannelEvent, ChannelShared, Connector, Outbound, ReadyState};

/// Default bound on the WebSocket handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connector for `ws://` and `wss://` URLs.
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::with_timeout(CONNECT_TIMEOUT)
    }
}

impl WsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up on handshakes that take longer than `connect_timeout`.
    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str) -> Channel {
        let shared = ChannelShared::new(ReadyState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_socket(
            url.to_string(),
            self.connect_timeout,
            shared.clone(),
            outbound_rx,
            events_tx,
        ));

        Channel::new(shared, outbound_tx, events_rx)
    }
}

async fn run_socket(
    url: String,
    connect_timeout: Duration,
    shared: Arc<ChannelShared>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let connected =
        tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str())).await;
    let outcome = match connected {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("handshake timed out after {:?}", connect_timeout)),
    };
    let stream = match outcome {
        Ok(stream) => stream,
        Err(error) => {
            warn!("failed to connect to {}: {}", url, error);
            shared.set(ReadyState::Closed);
            let _ = events.send(ChannelEvent::Error(error));
            let _ = events.send(ChannelEvent::Close { reason: None });
            return;
        }
    };

    info!("connected to {}", url);
    shared.set(ReadyState::Open);
    let _ = events.send(ChannelEvent::Open);

    let (mut sink, mut source) = stream.split();
    let mut reason = None;

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            warn!("failed to send frame: {}", e);
                            let _ = events.send(ChannelEvent::Error(e.to_string()));
                            break;
                        }
                    }
                    // Explicit close, or the channel was dropped.
                    Some(Outbound::Close) | None => {
                        shared.set(ReadyState::Closing);
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events.send(ChannelEvent::Message(text.as_str().to_string()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        reason = frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty());
                        info!("server closed channel");
                        break;
                    }
                    None => {
                        info!("server closed channel");
                        break;
                    }
                    Some(Ok(other)) => {
                        debug!("ignoring non-text frame ({} bytes)", other.len());
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        let _ = events.send(ChannelEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
    }

    shared.set(ReadyState::Closed);
    let _ = events.send(ChannelEvent::Close { reason });
}
