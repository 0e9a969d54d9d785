//! Relay connection configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_RELAY_URL: &str = "wss://events.teeml.ai";

/// Settings for the single relay the client publishes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay URL (`ws://` or `wss://`)
    pub url: String,
    /// Time allowed for the WebSocket handshake
    pub connect_timeout: Duration,
    /// Time to wait for the relay's `OK` after publishing
    pub publish_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RELAY_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(10),
        }
    }
}

impl RelayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Configuration for a relay running on this machine
    pub fn local_development() -> Self {
        Self {
            url: "ws://localhost:7777".to_string(),
            connect_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }
}
