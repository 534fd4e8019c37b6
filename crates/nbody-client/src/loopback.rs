//! In-process transport.
//!
//! Each channel opened by a [`LoopbackConnector`] is paired with a
//! [`RemoteEnd`] that plays the server: it accepts or closes the channel,
//! pushes inbound frames and records what the client sent.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::connection::{Channel, ChannelEvent, ChannelShared, Connector, Outbound, ReadyState};

#[derive(Default)]
struct Outbox {
    sent: Vec<String>,
    taken: usize,
    close_requested: bool,
}

struct RemoteInner {
    url: String,
    shared: Arc<ChannelShared>,
    events: Mutex<Option<mpsc::UnboundedSender<ChannelEvent>>>,
    outbound: Mutex<mpsc::UnboundedReceiver<Outbound>>,
    outbox: Mutex<Outbox>,
}

/// Server side of one loopback channel.
#[derive(Clone)]
pub struct RemoteEnd {
    inner: Arc<RemoteInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RemoteEnd {
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ReadyState {
        self.inner.shared.state()
    }

    fn emit(&self, event: ChannelEvent) {
        if let Some(events) = lock(&self.inner.events).as_ref() {
            let _ = events.send(event);
        }
    }

    /// Complete the handshake.
    pub fn accept(&self) {
        self.inner.shared.set(ReadyState::Open);
        self.emit(ChannelEvent::Open);
    }

    /// Deliver a text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        self.emit(ChannelEvent::Message(text.into()));
    }

    /// Report a transport error.
    pub fn fail(&self, error: impl Into<String>) {
        self.emit(ChannelEvent::Error(error.into()));
    }

    /// Close from the server side.
    pub fn close(&self, reason: Option<&str>) {
        self.inner.shared.set(ReadyState::Closed);
        self.emit(ChannelEvent::Close {
            reason: reason.map(str::to_string),
        });
    }

    /// Drop the event queue without a close frame, like a vanished peer.
    pub fn disconnect(&self) {
        lock(&self.inner.events).take();
    }

    fn drain(&self) -> MutexGuard<'_, Outbox> {
        let mut outbox = lock(&self.inner.outbox);
        let mut outbound = lock(&self.inner.outbound);
        while let Ok(frame) = outbound.try_recv() {
            match frame {
                Outbound::Text(text) => outbox.sent.push(text),
                Outbound::Close => outbox.close_requested = true,
            }
        }
        outbox
    }

    /// Every text frame the client has sent.
    pub fn sent(&self) -> Vec<String> {
        self.drain().sent.clone()
    }

    /// Text frames sent since the previous call.
    pub fn take_sent(&self) -> Vec<String> {
        let mut outbox = self.drain();
        let fresh = outbox.sent[outbox.taken..].to_vec();
        outbox.taken = outbox.sent.len();
        fresh
    }

    /// Whether the client asked to close the channel.
    pub fn close_requested(&self) -> bool {
        self.drain().close_requested
    }
}

/// Connector whose channels terminate in [`RemoteEnd`]s.
#[derive(Clone, Default)]
pub struct LoopbackConnector {
    remotes: Arc<Mutex<Vec<RemoteEnd>>>,
    auto_accept: bool,
}

impl LoopbackConnector {
    /// Channels start in `Connecting` until their remote accepts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels are accepted as soon as they are opened.
    pub fn accepting() -> Self {
        Self {
            auto_accept: true,
            ..Self::default()
        }
    }

    /// Number of channels opened so far.
    pub fn opened(&self) -> usize {
        lock(&self.remotes).len()
    }

    /// Remote end of the `index`-th opened channel.
    pub fn remote(&self, index: usize) -> Option<RemoteEnd> {
        lock(&self.remotes).get(index).cloned()
    }

    /// Remote end of the most recently opened channel.
    pub fn latest(&self) -> Option<RemoteEnd> {
        lock(&self.remotes).last().cloned()
    }

    pub fn disconnect(&self, index: usize) {
        if let Some(remote) = self.remote(index) {
            remote.disconnect();
        }
    }
}

impl Connector for LoopbackConnector {
    fn open(&self, url: &str) -> Channel {
        let shared = ChannelShared::new(ReadyState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let remote = RemoteEnd {
            inner: Arc::new(RemoteInner {
                url: url.to_string(),
                shared: shared.clone(),
                events: Mutex::new(Some(events_tx)),
                outbound: Mutex::new(outbound_rx),
                outbox: Mutex::new(Outbox::default()),
            }),
        };
        if self.auto_accept {
            remote.accept();
        }
        lock(&self.remotes).push(remote);

        Channel::new(shared, outbound_tx, events_rx)
    }
}
