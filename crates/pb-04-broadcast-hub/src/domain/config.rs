//! # Hub Configuration

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-observer outbound buffer, in messages.
    pub send_buffer: usize,
    /// Broadcasts queued for the loop before new ones are dropped.
    pub intake_capacity: usize,
    /// Time allowed to read the next frame from an observer.
    pub pong_wait: Duration,
    /// Ping period, independent of traffic. Must be less than `pong_wait`.
    pub ping_period: Duration,
    /// Time allowed to write one frame.
    pub write_wait: Duration,
    /// Largest inbound frame accepted from an observer, in bytes.
    pub max_message_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            send_buffer: 256,
            intake_capacity: 1024,
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            write_wait: Duration::from_secs(10),
            max_message_size: 512,
        }
    }
}

impl HubConfig {
    /// Tight timings for tests.
    pub fn for_testing() -> Self {
        Self {
            send_buffer: 8,
            intake_capacity: 64,
            pong_wait: Duration::from_millis(600),
            ping_period: Duration::from_millis(200),
            write_wait: Duration::from_millis(200),
            max_message_size: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_precedes_pong_deadline() {
        let config = HubConfig::default();
        assert_eq!(config.ping_period, Duration::from_secs(54));
        assert!(config.ping_period < config.pong_wait);
    }
}
