//! Session state machine.
//!
//! ```text
//!            start(params)
//!   ┌──────┐ ───────────► ┌─────────┐ ──┐
//!   │ Idle │              │ Running │   │ update(params)
//!   └──────┘ ◄─────────── └─────────┘ ◄─┘
//!               stop
//! ```
//!
//! Commands are fire-and-forget: the state flips as soon as the command has
//! been handed to the connection, whether or not the send succeeded and
//! without waiting for the server. Inbound snapshots replace the current one
//! wholesale while Running and are dropped as stale while Idle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{ChannelEvent, ConnectionManager, Connector};
use crate::error::{Error, Result};
use crate::params::{ClampBounds, RawParameters, SimulationParameters};
use crate::protocol::{self, ControlCommand, Snapshot};
use crate::render::{Frame, RenderMapper};
use crate::zoom::ZoomSetting;

/// Client-side view of the simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Close the channel when the session stops. When false the channel
    /// lives until [`SessionController::teardown`].
    pub close_on_stop: bool,
    /// Initial zoom slider position
    pub initial_zoom: u8,
}

/// User actions fed to [`SessionController::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Start(RawParameters),
    Update(RawParameters),
    Stop,
    Zoom(u8),
    Teardown,
}

/// Outcome of handing a command to the connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dispatch {
    pub command: ControlCommand,
    /// False when the channel was not open and the command was dropped.
    pub delivered: bool,
}

/// Counters for the lifetime of a session controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub commands_sent: u64,
    pub send_failures: u64,
    pub snapshots_applied: u64,
    pub snapshots_stale: u64,
    pub decode_errors: u64,
    pub connection_errors: u64,
    pub frames_rendered: u64,
}

/// Receives every rendered frame.
pub type SceneSink = Box<dyn FnMut(&Frame) + Send>;

pub struct SessionController {
    config: SessionConfig,
    bounds: ClampBounds,
    state: SessionState,
    connection: ConnectionManager,
    mapper: RenderMapper,
    zoom: ZoomSetting,
    snapshot: Snapshot,
    parameters: Option<SimulationParameters>,
    sink: Option<SceneSink>,
    dirty: bool,
    stats: SessionStats,
}

impl SessionController {
    pub fn new(config: &ClientConfig, connection: ConnectionManager) -> Self {
        Self {
            config: config.session,
            bounds: config.bounds,
            state: SessionState::Idle,
            connection,
            mapper: RenderMapper::new(config.render),
            zoom: ZoomSetting::new(config.session.initial_zoom),
            snapshot: Vec::new(),
            parameters: None,
            sink: None,
            dirty: false,
            stats: SessionStats::default(),
        }
    }

    /// Controller whose channel to `config.server_url` is opened by `connector`.
    pub fn with_connector(config: &ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self::new(config, ConnectionManager::new(config.server_url.clone(), connector))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// The snapshot currently held for rendering.
    pub fn snapshot(&self) -> &[protocol::Body] {
        &self.snapshot
    }

    /// Parameters of the last submitted Start or Update.
    pub fn parameters(&self) -> Option<SimulationParameters> {
        self.parameters
    }

    pub fn zoom(&self) -> ZoomSetting {
        self.zoom
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Access for installing connection handlers.
    pub fn connection_mut(&mut self) -> &mut ConnectionManager {
        &mut self.connection
    }

    /// Install the frame consumer, replacing any previous one.
    pub fn set_scene_sink<F>(&mut self, sink: F)
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        if self.sink.replace(Box::new(sink)).is_some() {
            debug!("replaced scene sink");
        }
    }

    /// Open the channel ahead of the first command. Safe to call repeatedly.
    pub fn connect(&mut self) -> bool {
        self.connection.ensure_open()
    }

    /// `Idle -> Running`: clamp, open the channel if needed and send Start.
    pub fn start(&mut self, input: RawParameters) -> Result<Dispatch> {
        self.require(SessionState::Idle, "start")?;
        let params = input.clamp(&self.bounds);
        self.connection.ensure_open();
        let dispatch = self.dispatch(ControlCommand::Start { params })?;

        self.parameters = Some(params);
        self.state = SessionState::Running;
        info!(
            "session running with {} bodies, gravity {}",
            params.num_bodies, params.gravity
        );
        Ok(dispatch)
    }

    /// `Running -> Running`: clamp and send Update.
    pub fn update(&mut self, input: RawParameters) -> Result<Dispatch> {
        self.require(SessionState::Running, "update")?;
        let params = input.clamp(&self.bounds);
        let dispatch = self.dispatch(ControlCommand::Update { params })?;

        self.parameters = Some(params);
        Ok(dispatch)
    }

    /// `Running -> Idle`: send Stop and clear the render state.
    pub fn stop(&mut self) -> Result<Dispatch> {
        self.require(SessionState::Running, "stop")?;
        let dispatch = self.dispatch(ControlCommand::Stop)?;

        self.state = SessionState::Idle;
        self.snapshot.clear();
        self.dirty = true;
        if self.config.close_on_stop {
            self.connection.close();
        }
        info!("session stopped");
        self.render_if_dirty();
        Ok(dispatch)
    }

    /// Move the zoom slider and redraw with the new camera.
    pub fn set_zoom(&mut self, slider: u8) {
        let zoom = ZoomSetting::new(slider);
        if zoom != self.zoom {
            self.zoom = zoom;
            self.dirty = true;
            self.render_if_dirty();
        }
    }

    /// Release the channel. The session returns to Idle without sending Stop.
    pub fn teardown(&mut self) {
        self.connection.close();
        self.state = SessionState::Idle;
        if !self.snapshot.is_empty() {
            self.snapshot.clear();
            self.dirty = true;
        }
        info!("session torn down");
        self.render_if_dirty();
    }

    /// Apply one UI intent.
    pub fn apply(&mut self, intent: Intent) -> Result<Option<Dispatch>> {
        match intent {
            Intent::Start(input) => self.start(input).map(Some),
            Intent::Update(input) => self.update(input).map(Some),
            Intent::Stop => self.stop().map(Some),
            Intent::Zoom(slider) => {
                self.set_zoom(slider);
                Ok(None)
            }
            Intent::Teardown => {
                self.teardown();
                Ok(None)
            }
        }
    }

    fn require(&self, expected: SessionState, action: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }

    fn dispatch(&mut self, command: ControlCommand) -> Result<Dispatch> {
        let text = protocol::encode(&command)?;
        let delivered = match self.connection.send(text) {
            Ok(()) => {
                self.stats.commands_sent += 1;
                debug!("sent {} command", command.action());
                true
            }
            Err(failure) => {
                self.stats.send_failures += 1;
                warn!("dropping {} command: {}", command.action(), failure);
                false
            }
        };
        Ok(Dispatch { command, delivered })
    }

    /// Fold one channel event into the session state.
    pub fn handle_event(&mut self, event: &ChannelEvent) {
        match event {
            ChannelEvent::Open => info!("channel open to {}", self.connection.url()),
            ChannelEvent::Message(text) => self.handle_message(text),
            ChannelEvent::Close { reason } => {
                info!("channel closed ({})", reason.as_deref().unwrap_or("no reason"));
            }
            ChannelEvent::Error(error) => {
                self.stats.connection_errors += 1;
                warn!("connection error: {}", error);
            }
        }
    }

    fn handle_message(&mut self, text: &str) {
        let snapshot = match protocol::decode(text) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!("dropping inbound message: {}", e);
                return;
            }
        };

        if self.state == SessionState::Idle {
            self.stats.snapshots_stale += 1;
            debug!("dropping stale snapshot of {} bodies", snapshot.len());
            return;
        }

        self.snapshot = snapshot;
        self.stats.snapshots_applied += 1;
        self.dirty = true;
    }

    /// Frame for the current snapshot and zoom.
    pub fn frame(&self) -> Frame {
        self.mapper.frame(&self.snapshot, self.zoom.zoom())
    }

    fn render_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let frame = self.frame();
        if let Some(sink) = self.sink.as_mut() {
            sink(&frame);
        }
        self.stats.frames_rendered += 1;
    }

    fn drain_ready(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.connection.try_next_event() {
            self.handle_event(&event);
            handled += 1;
        }
        handled
    }

    /// Handle every queued event, then render once.
    ///
    /// Snapshots that arrived together collapse into the last one.
    pub fn poll(&mut self) -> usize {
        let handled = self.drain_ready();
        self.render_if_dirty();
        handled
    }

    /// Wait for the next channel event, handle it with anything queued behind
    /// it, then render once.
    pub async fn pump(&mut self) -> ChannelEvent {
        let event = self.connection.next_event().await;
        self.handle_event(&event);
        self.poll();
        event
    }

    /// Drive the session from a stream of intents until teardown.
    ///
    /// Intents and channel events are handled one at a time. Returns the
    /// final counters.
    pub async fn run(mut self, mut intents: mpsc::Receiver<Intent>) -> SessionStats {
        self.connect();

        loop {
            tokio::select! {
                intent = intents.recv() => {
                    match intent {
                        Some(Intent::Teardown) | None => {
                            self.teardown();
                            break;
                        }
                        Some(intent) => {
                            if let Err(e) = self.apply(intent) {
                                warn!("ignoring intent: {}", e);
                            }
                        }
                    }
                }
                event = self.connection.next_event() => {
                    self.handle_event(&event);
                }
            }
            self.poll();
        }

        self.stats
    }
}
