//! Replay suppression over message IDs.
//!
//! Near-redundant with a single remote sender, but kept so the transport
//! can be swapped for a broadcast variant without revisiting the inbound
//! path. Capacity and age bounds keep the table small under any traffic.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::debug;

/// Sliding-window map of `message_id -> received_at_ms`.
pub struct DedupTable {
    capacity: usize,
    window_ms: u64,
    entries: HashMap<String, u64>,
    /// Arrival order, for overflow eviction.
    arrivals: VecDeque<String>,
}

impl DedupTable {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity,
            window_ms: window.as_millis() as u64,
            entries: HashMap::new(),
            arrivals: VecDeque::new(),
        }
    }

    /// Contract values: 1,000 entries, 300 s window.
    pub fn with_defaults() -> Self {
        Self::new(1_000, Duration::from_secs(300))
    }

    /// Record a message ID. Returns `true` if it was new, `false` for a
    /// replay.
    pub fn insert(&mut self, message_id: &str, now_ms: u64) -> bool {
        if self.entries.contains_key(message_id) {
            return false;
        }
        self.entries.insert(message_id.to_string(), now_ms);
        self.arrivals.push_back(message_id.to_string());
        if self.entries.len() > self.capacity {
            self.evict(now_ms);
        }
        true
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.entries.contains_key(message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries older than the window, then oldest arrivals until the
    /// table fits its capacity again.
    fn evict(&mut self, now_ms: u64) {
        let window_ms = self.window_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, received| now_ms.saturating_sub(*received) <= window_ms);
        self.arrivals.retain(|id| self.entries.contains_key(id));

        while self.entries.len() > self.capacity {
            match self.arrivals.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }

        debug!(
            evicted = before - self.entries.len(),
            remaining = self.entries.len(),
            "dedup eviction"
        );
    }
}
