//! Shared server state.

use crate::config::HeartbeatSettings;

use super::registry::RoomRegistry;

/// Shared application state, one instance per server.
pub struct AppState {
    /// The authoritative room-name to member-set mapping.
    pub registry: RoomRegistry,
    /// Heartbeat timing for the per-connection presence monitors.
    pub heartbeat: HeartbeatSettings,
}

impl AppState {
    pub fn new(heartbeat: HeartbeatSettings) -> Self {
        Self {
            registry: RoomRegistry::new(),
            heartbeat,
        }
    }
}
