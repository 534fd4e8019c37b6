//! N-Body Visualization Client
//!
//! Session and streaming-state layer for watching a remote N-body simulation.
//!
//! # Architecture
//!
//! - **Params**: Clamp user-entered body count and gravity at submission
//! - **Zoom**: Map the zoom slider to a camera distance
//! - **Protocol**: Encode control commands, decode body snapshots
//! - **Connection**: Own the one WebSocket to the simulation server
//! - **Session**: Idle/Running state machine tying it all together
//! - **Render**: Turn snapshots into scene-space drawables
//!
//! ```text
//! intent ─► Session ─► Params ─► Protocol ─► Connection ─► server
//!                                                            │
//! scene ◄── Render ◄── Session ◄── Protocol ◄── Connection ◄─┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use nbody_client::{ClientConfig, Intent, RawParameters, SessionController, WsConnector};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = ClientConfig::default();
//!     let mut session = SessionController::with_connector(&config, Arc::new(WsConnector::new()));
//!     session.set_scene_sink(|frame| println!("{} bodies", frame.drawables.len()));
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(16);
//!     tx.send(Intent::Start(RawParameters::new(500.0, 10.0))).await.unwrap();
//!     session.run(rx).await;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod loopback;
pub mod params;
pub mod protocol;
pub mod render;
pub mod session;
pub mod ws;
pub mod zoom;

pub use config::ClientConfig;
pub use connection::{ChannelEvent, ConnectionManager, Connector, ReadyState};
pub use error::{DecodeError, Error, Result, SendFailure};
pub use loopback::{LoopbackConnector, RemoteEnd};
pub use params::{clamp, ClampBounds, ParameterForm, RawParameters, SimulationParameters};
pub use protocol::{decode, encode, Body, ControlCommand, Snapshot};
pub use render::{Drawable, Frame, RenderConfig, RenderMapper};
pub use session::{Dispatch, Intent, SessionConfig, SessionController, SessionState, SessionStats};
pub use ws::WsConnector;
pub use zoom::{to_zoom, CameraPose, ZoomSetting};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn start_stream_stop_cycle() {
        let connector = LoopbackConnector::accepting();
        let mut session =
            SessionController::with_connector(&ClientConfig::default(), Arc::new(connector.clone()));

        session.start(RawParameters::new(1500.0, -5.0)).unwrap();
        assert_eq!(session.state(), SessionState::Running);

        let remote = connector.latest().unwrap();
        remote.push(r#"[{"x":1,"y":2,"vx":0,"vy":0,"mass":1}]"#);
        session.poll();
        assert_eq!(session.frame().drawables.len(), 1);

        session.stop().unwrap();
        assert!(session.frame().is_empty());
        assert_eq!(remote.sent().len(), 2);
    }

    #[test]
    fn form_submission_feeds_start() {
        let mut form = ParameterForm::default();
        form.set_num_bodies("1500");
        form.set_gravity("-5");

        let connector = LoopbackConnector::accepting();
        let mut session =
            SessionController::with_connector(&ClientConfig::default(), Arc::new(connector));
        let dispatch = session.start(form.raw()).unwrap();

        assert_eq!(
            dispatch.command,
            ControlCommand::Start {
                params: SimulationParameters { num_bodies: 1000, gravity: 0.0 }
            }
        );
    }
}
