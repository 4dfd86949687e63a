//! Heartbeat schedule and liveness watchdog.
//!
//! Pure time-driven state: the transport drives it from its interval tasks
//! and feeds it every received `HEARTBEAT` or `HEARTBEAT_ACK`. A peer is
//! dead after `timeout` of silence (three missed beats at the contract
//! 2 s / 6 s values).

use std::time::Duration;

pub struct HeartbeatState {
    interval_ms: u64,
    timeout_ms: u64,
    last_sent_ms: u64,
    last_received_ms: u64,
}

impl HeartbeatState {
    /// Start tracking at `now_ms`; the peer starts out live.
    pub fn new(interval: Duration, timeout: Duration, now_ms: u64) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            timeout_ms: timeout.as_millis() as u64,
            last_sent_ms: 0,
            last_received_ms: now_ms,
        }
    }

    /// Whether a beat should be emitted now.
    pub fn should_send(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_sent_ms) >= self.interval_ms
    }

    pub fn mark_sent(&mut self, now_ms: u64) {
        self.last_sent_ms = now_ms;
    }

    /// Record any sign of life from the peer (beat or ack).
    pub fn on_received(&mut self, now_ms: u64) {
        self.last_received_ms = now_ms;
    }

    /// Whether the peer has been silent past the timeout.
    pub fn timed_out(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_received_ms) > self.timeout_ms
    }

    pub fn silence_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_received_ms)
    }
}
