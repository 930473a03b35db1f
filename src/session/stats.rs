//! Statistics for relay sessions

use std::time::Duration;

use serde::Serialize;

use crate::relay::RelayStats;

use super::state::SessionState;

/// Session-level statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Session port
    pub port: u16,
    /// Lifecycle state
    pub state: SessionState,
    /// Bytes handed to the relay
    pub bytes_relayed: u64,
    /// Chunks handed to the relay
    pub chunks_relayed: u64,
    /// Viewers currently connected
    pub viewers: usize,
    /// Viewers accepted since start
    pub viewers_accepted: u64,
    /// Viewers dropped for falling behind
    pub viewers_dropped: u64,
    /// Time since the session started, in milliseconds
    pub uptime_ms: u64,
    /// Average bitrate (bits/sec)
    pub bitrate: u64,
}

impl SessionStats {
    pub(crate) fn new(
        port: u16,
        state: SessionState,
        bytes_relayed: u64,
        chunks_relayed: u64,
        relay: RelayStats,
        uptime: Duration,
    ) -> Self {
        Self {
            port,
            state,
            bytes_relayed,
            chunks_relayed,
            viewers: relay.viewers,
            viewers_accepted: relay.viewers_accepted,
            viewers_dropped: relay.viewers_dropped,
            uptime_ms: uptime.as_millis() as u64,
            bitrate: bitrate(bytes_relayed, uptime),
        }
    }
}

/// Average bitrate in bits per second; 0 before the first full second
pub fn bitrate(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs();
    if secs > 0 {
        (bytes * 8) / secs
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitrate() {
        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(bitrate(1_000_000, Duration::from_secs(10)), 800_000);
    }

    #[test]
    fn test_bitrate_zero_duration() {
        assert_eq!(bitrate(1_000_000, Duration::from_millis(500)), 0);
    }

    #[test]
    fn test_stats_from_relay() {
        let relay = RelayStats {
            viewers: 2,
            viewers_accepted: 5,
            viewers_dropped: 1,
            viewers_disconnected: 2,
        };
        let stats = SessionStats::new(
            9900,
            SessionState::Streaming,
            2_000_000,
            80,
            relay,
            Duration::from_secs(4),
        );

        assert_eq!(stats.viewers, 2);
        assert_eq!(stats.viewers_accepted, 5);
        assert_eq!(stats.viewers_dropped, 1);
        assert_eq!(stats.uptime_ms, 4000);
        assert_eq!(stats.bitrate, 4_000_000);
    }
}
