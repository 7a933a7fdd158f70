//! Connection statistics
//!
//! Frame and byte counters plus connectivity timestamps, snapshotted on
//! demand for diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters and timestamps for one connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    /// Frames dropped due to single-frame faults
    pub frame_errors: u64,
    pub connection_losses: u64,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_loss_at: Option<DateTime<Utc>>,
}

impl Statistics {
    pub fn record_received(&mut self, bytes: usize) {
        self.frames_received += 1;
        self.bytes_received += bytes as u64;
    }

    pub fn record_sent(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_connected(&mut self) {
        self.connected_at = Some(Utc::now());
    }

    pub fn record_loss(&mut self) {
        self.connection_losses += 1;
        self.last_loss_at = Some(Utc::now());
    }
}

/// Per-device connectivity timestamps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceTimes {
    pub connected_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl DeviceTimes {
    pub fn record_seen(&mut self) {
        let now = Utc::now();
        if self.connected_at.is_none() {
            self.connected_at = Some(now);
        }
        self.last_seen_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = Statistics::default();
        stats.record_received(10);
        stats.record_received(24);
        stats.record_sent(12);

        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.bytes_received, 34);
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.bytes_sent, 12);
    }

    #[test]
    fn test_loss_tracking() {
        let mut stats = Statistics::default();
        assert!(stats.last_loss_at.is_none());
        stats.record_loss();
        assert_eq!(stats.connection_losses, 1);
        assert!(stats.last_loss_at.is_some());
    }

    #[test]
    fn test_device_times() {
        let mut times = DeviceTimes::default();
        times.record_seen();
        let first = times.connected_at;
        assert!(first.is_some());
        times.record_seen();
        // connected_at is stable, last_seen_at moves
        assert_eq!(times.connected_at, first);
        assert!(times.last_seen_at >= first);
    }
}
