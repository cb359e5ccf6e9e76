//! Server-wide configuration.

use std::time::Duration;

use parley_broadcast::BroadcastConfig;
use parley_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Address the server binds to when none is given.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7080";

/// Everything needed to start a [`ParleyServer`](crate::ParleyServer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    pub bind_addr: String,
    /// Per-session settings (heartbeat timeout, outbound queue bound).
    pub session: SessionConfig,
    /// Broadcaster settings.
    pub broadcast: BroadcastConfig,
    /// How long a closing session's writer may keep flushing queued
    /// lines before its socket is dropped.
    pub flush_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            session: SessionConfig::default(),
            broadcast: BroadcastConfig::default(),
            flush_grace: Duration::from_secs(1),
        }
    }
}
