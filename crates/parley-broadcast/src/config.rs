//! Broadcaster configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the broadcaster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// How many published messages may wait for the fan-out task.
    ///
    /// When the buffer is full, `publish` waits. That stalls the
    /// publishing session's reader, which is the only backpressure in
    /// the system. Default: 10.
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_config_default() {
        assert_eq!(BroadcastConfig::default().capacity, 10);
    }
}
