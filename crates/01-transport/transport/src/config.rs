use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest unit accepted by default on either side of a connection.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1 << 30;

/// Stream-level knobs for a [`QueueSocket`](crate::QueueSocket).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Applied to both reads and writes. `None` blocks forever.
    pub io_timeout: Option<Duration>,
    pub max_frame_bytes: usize,
    /// Sets `TCP_NODELAY` on TCP streams.
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            io_timeout: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            nodelay: true,
        }
    }
}

impl TransportConfig {
    /// A zero duration is treated as "no timeout"; the OS rejects zero socket timeouts.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}
