//! Client configuration.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::params::ClampBounds;
use crate::render::RenderConfig;
use crate::session::SessionConfig;

/// Server URL used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080/ws";

/// Configuration for a visualization client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// WebSocket URL of the simulation server
    pub server_url: String,

    /// Submission-time parameter bounds
    pub bounds: ClampBounds,

    /// Snapshot-to-scene mapping
    pub render: RenderConfig,

    /// Session behavior
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            bounds: ClampBounds::default(),
            render: RenderConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (environment, tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("NBODY_SERVER_URL") {
            config.server_url = url;
        }
        if let Some(v) = lookup("NBODY_MAX_BODIES") {
            config.bounds.max_bodies = parse_var("NBODY_MAX_BODIES", &v)?;
        }
        if let Some(v) = lookup("NBODY_MAX_GRAVITY") {
            config.bounds.max_gravity = parse_var("NBODY_MAX_GRAVITY", &v)?;
        }
        if let Some(v) = lookup("NBODY_RENDER_SCALE") {
            config.render.scale = parse_var("NBODY_RENDER_SCALE", &v)?;
        }
        if let Some(v) = lookup("NBODY_CLOSE_ON_STOP") {
            config.session.close_on_stop = parse_var("NBODY_CLOSE_ON_STOP", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "server URL must use ws:// or wss://, got {}",
                self.server_url
            )));
        }
        if !(self.bounds.max_gravity.is_finite() && self.bounds.max_gravity >= 0.0) {
            return Err(Error::Config(format!(
                "gravity bound must be a non-negative number, got {}",
                self.bounds.max_gravity
            )));
        }
        if !(self.render.scale.is_finite() && self.render.scale > 0.0) {
            return Err(Error::Config(format!(
                "render scale must be positive, got {}",
                self.render.scale
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid {}: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ClientConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert!(!config.session.close_on_stop);
    }

    #[test]
    fn variables_override_defaults() {
        let config = from_pairs(&[
            ("NBODY_SERVER_URL", "ws://sim:9000/ws"),
            ("NBODY_MAX_BODIES", "250"),
            ("NBODY_MAX_GRAVITY", "12.5"),
            ("NBODY_RENDER_SCALE", "1e9"),
            ("NBODY_CLOSE_ON_STOP", "true"),
        ])
        .unwrap();

        assert_eq!(config.server_url, "ws://sim:9000/ws");
        assert_eq!(config.bounds.max_bodies, 250);
        assert_eq!(config.bounds.max_gravity, 12.5);
        assert_eq!(config.render.scale, 1e9);
        assert!(config.session.close_on_stop);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(from_pairs(&[("NBODY_MAX_BODIES", "lots")]), Err(Error::Config(_))));
        assert!(matches!(from_pairs(&[("NBODY_RENDER_SCALE", "0")]), Err(Error::Config(_))));
        assert!(matches!(from_pairs(&[("NBODY_SERVER_URL", "http://x")]), Err(Error::Config(_))));
    }
}
