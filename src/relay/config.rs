//! Relay configuration

use std::net::{IpAddr, Ipv4Addr};

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Interface relays bind to (loopback by default)
    pub bind_host: IpAddr,

    /// Chunks a viewer may have queued before it is dropped
    pub viewer_queue_capacity: usize,

    /// Maximum concurrent viewers per relay (0 = unlimited)
    pub max_viewers: usize,

    /// Enable TCP_NODELAY on viewer sockets
    pub tcp_nodelay: bool,

    /// Listen backlog
    pub backlog: i32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            viewer_queue_capacity: 64,
            max_viewers: 0, // Unlimited
            tcp_nodelay: true,
            backlog: 128,
        }
    }
}

impl RelayConfig {
    /// Set the bind interface
    pub fn bind_host(mut self, host: IpAddr) -> Self {
        self.bind_host = host;
        self
    }

    /// Set the per-viewer queue capacity
    pub fn viewer_queue_capacity(mut self, capacity: usize) -> Self {
        self.viewer_queue_capacity = capacity.max(1);
        self
    }

    /// Set maximum viewers
    pub fn max_viewers(mut self, max: usize) -> Self {
        self.max_viewers = max;
        self
    }
}
