//! Error types for the visualization client.

use thiserror::Error;

use crate::connection::ReadyState;
use crate::session::SessionState;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by client operations.
///
/// Send failures and decode errors have their own types. The session logs
/// and counts them instead of returning them.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested action is not offered in the current session state.
    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Why an inbound snapshot message was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// The payload is JSON but not an array of representable bodies.
    #[error("invalid shape: {0}")]
    InvalidShape(String),
}

/// A send attempted while the channel was not ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendFailure {
    /// No channel has been opened (or it was released).
    #[error("no channel")]
    NoChannel,

    /// The channel exists but is not open.
    #[error("channel is {0:?}")]
    NotReady(ReadyState),
}
