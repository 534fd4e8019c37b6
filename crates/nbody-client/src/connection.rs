//! Ownership of the single bidirectional channel to the simulation server.
//!
//! A [`ConnectionManager`] holds at most one [`Channel`], opened lazily by
//! [`ConnectionManager::ensure_open`] through an injected [`Connector`]. The
//! transport behind a channel runs elsewhere (a spawned task for WebSocket, the
//! test harness for loopback) and talks to the channel only through queues:
//!
//! ```text
//!  ConnectionManager            transport
//!  ┌──────────────┐  Outbound   ┌───────────┐
//!  │   Channel    │ ──────────► │  socket   │
//!  │              │ ◄────────── │  task     │
//!  └──────────────┘ ChannelEvent└───────────┘
//!         │
//!         ▼  one handler slot per event kind
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info};

use crate::error::SendFailure;

/// Lifecycle of a channel, mirroring the WebSocket ready states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Ready state shared between a channel and its transport.
#[derive(Debug)]
pub struct ChannelShared {
    state: AtomicU8,
}

impl ChannelShared {
    pub fn new(state: ReadyState) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(state as u8),
        })
    }

    pub fn state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Events surfaced by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel became ready to send.
    Open,
    /// A text frame arrived.
    Message(String),
    /// The channel closed, with the peer's reason if any.
    Close { reason: Option<String> },
    /// The transport reported an error.
    Error(String),
}

/// Frames queued from the channel to its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// One open (or opening) channel.
pub struct Channel {
    shared: Arc<ChannelShared>,
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    drained: bool,
    saw_close: bool,
}

impl Channel {
    /// Assemble a channel from the queues its transport services.
    pub fn new(
        shared: Arc<ChannelShared>,
        outbound: mpsc::UnboundedSender<Outbound>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Self {
        Self {
            shared,
            outbound,
            events,
            drained: false,
            saw_close: false,
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.state()
    }

    fn send_text(&self, text: String) -> Result<(), SendFailure> {
        match self.ready_state() {
            ReadyState::Open => self
                .outbound
                .send(Outbound::Text(text))
                .map_err(|_| SendFailure::NotReady(ReadyState::Closed)),
            state => Err(SendFailure::NotReady(state)),
        }
    }

    fn close(&self) {
        if self.ready_state() != ReadyState::Closed {
            self.shared.set(ReadyState::Closing);
        }
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Opens channels to a URL. Implementations must not block.
pub trait Connector: Send + Sync {
    fn open(&self, url: &str) -> Channel;
}

pub type MessageHandler = Box<dyn FnMut(&str) + Send>;
pub type OpenHandler = Box<dyn FnMut() + Send>;
pub type CloseHandler = Box<dyn FnMut(Option<&str>) + Send>;
pub type ErrorHandler = Box<dyn FnMut(&str) + Send>;

/// One slot per event kind; installing replaces.
#[derive(Default)]
struct Handlers {
    on_message: Option<MessageHandler>,
    on_open: Option<OpenHandler>,
    on_close: Option<CloseHandler>,
    on_error: Option<ErrorHandler>,
}

impl Handlers {
    fn dispatch(&mut self, event: &ChannelEvent) {
        match event {
            ChannelEvent::Open => {
                if let Some(handler) = self.on_open.as_mut() {
                    handler();
                }
            }
            ChannelEvent::Message(text) => {
                if let Some(handler) = self.on_message.as_mut() {
                    handler(text);
                }
            }
            ChannelEvent::Close { reason } => {
                if let Some(handler) = self.on_close.as_mut() {
                    handler(reason.as_deref());
                }
            }
            ChannelEvent::Error(error) => {
                if let Some(handler) = self.on_error.as_mut() {
                    handler(error);
                }
            }
        }
    }
}

fn install<T>(slot: &mut Option<T>, handler: T, kind: &str) {
    if slot.replace(handler).is_some() {
        debug!("replaced {} handler", kind);
    }
}

/// Owns the channel lifecycle. Does not reconnect on its own.
pub struct ConnectionManager {
    url: String,
    connector: Arc<dyn Connector>,
    channel: Option<Channel>,
    handlers: Handlers,
    channels_opened: u64,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            url: url.into(),
            connector,
            channel: None,
            handlers: Handlers::default(),
            channels_opened: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// State of the current channel, if one exists.
    pub fn ready_state(&self) -> Option<ReadyState> {
        self.channel.as_ref().map(Channel::ready_state)
    }

    pub fn is_open(&self) -> bool {
        self.ready_state() == Some(ReadyState::Open)
    }

    /// Number of channels this manager has opened over its lifetime.
    pub fn channels_opened(&self) -> u64 {
        self.channels_opened
    }

    /// Open a channel unless one already exists in any state.
    ///
    /// Returns `true` when a new channel was opened.
    pub fn ensure_open(&mut self) -> bool {
        if self.channel.is_some() {
            return false;
        }
        info!("opening channel to {}", self.url);
        self.channel = Some(self.connector.open(&self.url));
        self.channels_opened += 1;
        true
    }

    /// Hand a text frame to the transport if the channel is open.
    pub fn send(&self, text: impl Into<String>) -> Result<(), SendFailure> {
        match &self.channel {
            Some(channel) => channel.send_text(text.into()),
            None => Err(SendFailure::NoChannel),
        }
    }

    pub fn on_message<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        let handler: MessageHandler = Box::new(handler);
        install(&mut self.handlers.on_message, handler, "message");
    }

    pub fn on_open<F>(&mut self, handler: F)
    where
        F: FnMut() + Send + 'static,
    {
        let handler: OpenHandler = Box::new(handler);
        install(&mut self.handlers.on_open, handler, "open");
    }

    pub fn on_close<F>(&mut self, handler: F)
    where
        F: FnMut(Option<&str>) + Send + 'static,
    {
        let handler: CloseHandler = Box::new(handler);
        install(&mut self.handlers.on_close, handler, "close");
    }

    pub fn on_error<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        let handler: ErrorHandler = Box::new(handler);
        install(&mut self.handlers.on_error, handler, "error");
    }

    /// Release the channel and its handlers. Later sends fail with
    /// [`SendFailure::NoChannel`].
    pub fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            info!("closing channel to {}", self.url);
            channel.close();
        }
        self.handlers = Handlers::default();
    }

    /// Wait for the next channel event and dispatch it to its handler.
    ///
    /// Stays pending while there is no channel or the transport has finished.
    pub async fn next_event(&mut self) -> ChannelEvent {
        let received = match self.channel.as_mut() {
            Some(channel) if !channel.drained => channel.events.recv().await,
            _ => return std::future::pending().await,
        };
        match self.accept(received) {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    /// Take an already queued event without waiting.
    pub fn try_next_event(&mut self) -> Option<ChannelEvent> {
        let received = match self.channel.as_mut() {
            Some(channel) if !channel.drained => match channel.events.try_recv() {
                Ok(event) => Some(event),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => None,
            },
            _ => return None,
        };
        self.accept(received)
    }

    fn accept(&mut self, received: Option<ChannelEvent>) -> Option<ChannelEvent> {
        let channel = self.channel.as_mut()?;
        let event = match received {
            Some(event) => event,
            None => {
                // Transport went away without reporting a close.
                channel.drained = true;
                channel.shared.set(ReadyState::Closed);
                if channel.saw_close {
                    return None;
                }
                ChannelEvent::Close { reason: None }
            }
        };
        if matches!(event, ChannelEvent::Close { .. }) {
            channel.saw_close = true;
            channel.shared.set(ReadyState::Closed);
        }
        self.handlers.dispatch(&event);
        Some(event)
    }
}
