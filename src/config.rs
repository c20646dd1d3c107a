//! Server configuration.
//!
//! The hosting process hands the broker a plain [`Settings`] value at
//! construction time; loading it from a file (and TLS termination) is the
//! host's business, so everything here is just a deserializable struct with
//! runnable defaults.

use std::time::Duration;

use serde::Deserialize;

/// Top-level settings for the signaling server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Host address to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Heartbeat timing for the presence monitor.
    pub heartbeat: HeartbeatSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            heartbeat: HeartbeatSettings::default(),
        }
    }
}

/// Heartbeat timing constants, in milliseconds.
///
/// A connection is probed every `probe_interval_ms`. Once no reply has been
/// seen for `lost_after_ms` the member is marked possibly-lost (purgatory);
/// once none has been seen for `kick_after_ms` the connection is closed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    pub probe_interval_ms: u64,
    pub lost_after_ms: u64,
    pub kick_after_ms: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            probe_interval_ms: 3_000,
            lost_after_ms: 6_000,
            kick_after_ms: 30_000,
        }
    }
}

impl HeartbeatSettings {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn lost_after(&self) -> Duration {
        Duration::from_millis(self.lost_after_ms)
    }

    pub fn kick_after(&self) -> Duration {
        Duration::from_millis(self.kick_after_ms)
    }
}
