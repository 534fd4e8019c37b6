//! Wire format for the control and data channels.
//!
//! # Control channel (client to server)
//!
//! ```text
//! {"action":"start","numBodies":500,"gravity":10.0}
//! {"action":"update","numBodies":500,"gravity":12.5}
//! {"action":"stop"}
//! ```
//!
//! # Data channel (server to client)
//!
//! ```text
//! [{"x":1.0,"y":2.0,"vx":0.0,"vy":0.1,"mass":5.0}, ...]
//! ```

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, Result};
use crate::params::SimulationParameters;

/// One simulated particle as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub mass: f64,
}

/// A full replacement set of bodies. Index order is render order only.
pub type Snapshot = Vec<Body>;

/// Commands sent to the simulation server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlCommand {
    Start {
        #[serde(flatten)]
        params: SimulationParameters,
    },
    Update {
        #[serde(flatten)]
        params: SimulationParameters,
    },
    Stop,
}

impl ControlCommand {
    /// Wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            ControlCommand::Start { .. } => "start",
            ControlCommand::Update { .. } => "update",
            ControlCommand::Stop => "stop",
        }
    }
}

/// Serialize a command into a text frame.
pub fn encode(command: &ControlCommand) -> Result<String> {
    Ok(serde_json::to_string(command)?)
}

/// Parse a text frame into a snapshot.
///
/// Well-formed JSON holding a number outside the `f64` range is an
/// [`DecodeError::InvalidShape`], not a parse failure.
pub fn decode(message: &str) -> std::result::Result<Snapshot, DecodeError> {
    let value: Value = serde_json::from_str(message).map_err(|e| classify(message, e))?;

    let Value::Array(items) = value else {
        return Err(DecodeError::InvalidShape(format!(
            "expected an array of bodies, got {}",
            kind(&value)
        )));
    };

    let mut snapshot = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return Err(DecodeError::InvalidShape(format!(
                "body {}: expected an object, got {}",
                index,
                kind(&item)
            )));
        }
        let body: Body = serde_json::from_value(item)
            .map_err(|e| DecodeError::InvalidShape(format!("body {}: {}", index, e)))?;
        snapshot.push(body);
    }
    Ok(snapshot)
}

/// Split a failed `Value` parse into malformed text and unrepresentable values.
fn classify(message: &str, error: serde_json::Error) -> DecodeError {
    // Skipping a value checks syntax without materializing numbers.
    if serde_json::from_str::<IgnoredAny>(message).is_ok() {
        DecodeError::InvalidShape(error.to_string())
    } else {
        DecodeError::ParseFailure(error.to_string())
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(num_bodies: u32, gravity: f64) -> SimulationParameters {
        SimulationParameters { num_bodies, gravity }
    }

    #[test]
    fn encode_start() {
        let json = encode(&ControlCommand::Start { params: params(500, 10.0) }).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["action"], "start");
        assert_eq!(value["numBodies"], 500);
        assert_eq!(value["gravity"], 10.0);
    }

    #[test]
    fn encode_update() {
        let json = encode(&ControlCommand::Update { params: params(3, 0.5) }).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["action"], "update");
        assert_eq!(value["numBodies"], 3);
    }

    #[test]
    fn stop_carries_no_parameters() {
        let json = encode(&ControlCommand::Stop).unwrap();
        assert_eq!(json, r#"{"action":"stop"}"#);
    }

    #[test]
    fn action_names_match_wire() {
        assert_eq!(ControlCommand::Stop.action(), "stop");
        assert_eq!(ControlCommand::Start { params: params(1, 1.0) }.action(), "start");
    }

    #[test]
    fn decode_preserves_bodies() {
        let json = r#"[
            {"x":1.5,"y":-2.0,"vx":0.25,"vy":0.0,"mass":3.0},
            {"x":0,"y":0,"vx":0,"vy":0,"mass":1e24},
            {"x":-7.125,"y":8.0,"vx":-1.0,"vy":2.0,"mass":0.001}
        ]"#;
        let snapshot = decode(json).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0], Body { x: 1.5, y: -2.0, vx: 0.25, vy: 0.0, mass: 3.0 });
        assert_eq!(snapshot[1].mass, 1e24);
        assert_eq!(snapshot[2].x, -7.125);
    }

    #[test]
    fn decode_empty_array() {
        assert_eq!(decode("[]").unwrap(), Vec::new());
    }

    #[test]
    fn malformed_text_is_parse_failure() {
        assert!(matches!(decode("not json"), Err(DecodeError::ParseFailure(_))));
        assert!(matches!(decode("[{\"x\":"), Err(DecodeError::ParseFailure(_))));
    }

    #[test]
    fn object_is_invalid_shape() {
        assert!(matches!(decode(r#"{"x":1}"#), Err(DecodeError::InvalidShape(_))));
    }

    #[test]
    fn scalar_is_invalid_shape() {
        assert!(matches!(decode("42"), Err(DecodeError::InvalidShape(_))));
        assert!(matches!(decode("\"bodies\""), Err(DecodeError::InvalidShape(_))));
    }

    #[test]
    fn missing_or_non_numeric_field_is_invalid_shape() {
        let missing = r#"[{"x":1,"y":2,"vx":0,"vy":0}]"#;
        assert!(matches!(decode(missing), Err(DecodeError::InvalidShape(_))));

        let textual = r#"[{"x":"1","y":2,"vx":0,"vy":0,"mass":1}]"#;
        assert!(matches!(decode(textual), Err(DecodeError::InvalidShape(_))));

        let nested = r#"[[1,2,3,4,5]]"#;
        assert!(matches!(decode(nested), Err(DecodeError::InvalidShape(_))));
    }

    #[test]
    fn overflowing_number_is_invalid_shape() {
        let huge = r#"[{"x":1e400,"y":0,"vx":0,"vy":0,"mass":1}]"#;
        assert!(matches!(decode(huge), Err(DecodeError::InvalidShape(_))));

        let negative = r#"[{"x":0,"y":0,"vx":0,"vy":0,"mass":-1e400}]"#;
        assert!(matches!(decode(negative), Err(DecodeError::InvalidShape(_))));

        let truncated = r#"[{"x":1e400,"y":"#;
        assert!(matches!(decode(truncated), Err(DecodeError::ParseFailure(_))));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let json = r#"[{"x":1,"y":2,"vx":0,"vy":0,"mass":1,"id":7}]"#;
        assert_eq!(decode(json).unwrap().len(), 1);
    }
}
