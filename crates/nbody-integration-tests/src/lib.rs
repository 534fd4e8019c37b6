//! Scripted simulation server for end-to-end tests.
//!
//! Accepts WebSocket connections on `/ws`, records every control command it
//! receives and answers each action with a fixed list of text frames. No
//! physics runs here.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Frames sent back for each action.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub on_start: Vec<String>,
    pub on_update: Vec<String>,
    pub on_stop: Vec<String>,
}

impl Script {
    /// Answer Start and Update with the same frames.
    pub fn streaming(frames: &[&str]) -> Self {
        let frames: Vec<String> = frames.iter().map(|f| f.to_string()).collect();
        Self {
            on_start: frames.clone(),
            on_update: frames,
            on_stop: Vec::new(),
        }
    }
}

/// Shared server state.
struct AppState {
    script: Script,
    commands: Mutex<Vec<Value>>,
    connections: Mutex<usize>,
}

#[derive(Deserialize)]
struct Command {
    action: String,
}

/// Running stub server.
pub struct StubServer {
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl StubServer {
    /// Bind to an ephemeral localhost port and serve in the background.
    pub async fn spawn(script: Script) -> std::io::Result<Self> {
        let state = Arc::new(AppState {
            script,
            commands: Mutex::new(Vec::new()),
            connections: Mutex::new(0),
        });

        let router = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!("stub server stopped: {}", e);
            }
        });
        info!("stub server listening on {}", addr);

        Ok(Self { addr, state })
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Every command received so far, parsed as JSON.
    pub fn commands(&self) -> Vec<Value> {
        self.state.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Actions of every command received so far.
    pub fn actions(&self) -> Vec<String> {
        self.commands()
            .iter()
            .filter_map(|c| c["action"].as_str().map(str::to_string))
            .collect()
    }

    /// Number of WebSocket connections accepted.
    pub fn connections(&self) -> usize {
        self.state.connections.lock().map(|c| *c).unwrap_or_default()
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    if let Ok(mut count) = state.connections.lock() {
        *count += 1;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
            warn!("stub server ignoring non-JSON frame");
            continue;
        };
        let action = serde_json::from_value::<Command>(value.clone())
            .map(|c| c.action)
            .unwrap_or_default();
        debug!("stub server received {}", action);
        if let Ok(mut commands) = state.commands.lock() {
            commands.push(value);
        }

        let replies = match action.as_str() {
            "start" => &state.script.on_start,
            "update" => &state.script.on_update,
            "stop" => &state.script.on_stop,
            _ => continue,
        };
        for frame in replies {
            if socket.send(Message::Text(frame.clone().into())).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_script_answers_start_and_update() {
        let script = Script::streaming(&["[]"]);
        assert_eq!(script.on_start, vec!["[]"]);
        assert_eq!(script.on_update, vec!["[]"]);
        assert!(script.on_stop.is_empty());
    }

    #[tokio::test]
    async fn server_binds_ephemeral_port() {
        let server = StubServer::spawn(Script::default()).await.unwrap();
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        assert!(server.commands().is_empty());
        assert_eq!(server.connections(), 0);
    }
}
