//! Configuration: user options, host identity, and tuning knobs.

use crate::editor_state::IdeFamily;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Transport role, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Binds a loopback port and accepts the partner.
    Listener,
    /// Scans the port range and connects.
    Scanner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listener => "listener",
            Self::Scanner => "scanner",
        }
    }
}

/// User-facing options, loadable from the host's settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// When true the transport tries `custom_port` before scanning.
    pub use_custom_port: bool,
    /// Preferred port, 1024-65535.
    pub custom_port: u16,
    /// Enable auto-reconnect as soon as the engine is created.
    pub auto_start_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            use_custom_port: false,
            custom_port: 3000,
            auto_start_sync: false,
        }
    }
}

impl SyncConfig {
    /// The custom port, if enabled and inside the permitted range.
    pub fn effective_custom_port(&self) -> Option<u16> {
        if self.use_custom_port && self.custom_port >= 1024 {
            Some(self.custom_port)
        } else {
            None
        }
    }
}

/// Identity of the embedding IDE, fixed at startup.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub family: IdeFamily,
    pub role: Role,
    /// Short IDE type tag for handshakes, e.g. "X".
    pub ide_type: String,
    /// Human-readable IDE name and version, e.g. "X 1.0".
    pub ide_name: String,
    /// Absolute workspace root of the open project.
    pub project_path: String,
}

impl HostInfo {
    /// Host info with the family's default role.
    pub fn new(
        family: IdeFamily,
        ide_type: impl Into<String>,
        ide_name: impl Into<String>,
        project_path: impl Into<String>,
    ) -> Self {
        Self {
            family,
            role: family.default_role(),
            ide_type: ide_type.into(),
            ide_name: ide_name.into(),
            project_path: project_path.into(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Timing and capacity contract values.
///
/// Defaults reproduce the wire contract; tests shrink them to run in
/// milliseconds.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// NAVIGATE coalescing window per file.
    pub debounce: Duration,
    /// HEARTBEAT emission interval once connected.
    pub heartbeat_interval: Duration,
    /// Silence after which the peer is considered dead (three misses).
    pub heartbeat_timeout: Duration,
    /// Delay before a listener rebind or scanner rescan.
    pub retry_backoff: Duration,
    /// Pause between queue-worker sends.
    pub queue_pause: Duration,
    /// Sliding dedup window over message IDs.
    pub dedup_window: Duration,
    pub dedup_capacity: usize,
    pub queue_capacity: usize,
    /// TCP connect timeout for one scan probe.
    pub probe_timeout: Duration,
    /// Ports tried by automatic scan, in order.
    pub scan_ports: RangeInclusive<u16>,
    /// Focus-listener attachment retries on startup.
    pub attach_attempts: u32,
    pub attach_interval: Duration,
    /// Payload age beyond which an inbound message is dropped.
    pub stale_cutoff: Duration,
    /// Bound on joining workers during disposal.
    pub shutdown_grace: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            heartbeat_interval: Duration::from_secs(2),
            heartbeat_timeout: Duration::from_secs(6),
            retry_backoff: Duration::from_secs(5),
            queue_pause: Duration::from_millis(50),
            dedup_window: Duration::from_secs(300),
            dedup_capacity: 1_000,
            queue_capacity: 100,
            probe_timeout: Duration::from_millis(500),
            scan_ports: 3000..=4000,
            attach_attempts: 10,
            attach_interval: Duration::from_millis(500),
            stale_cutoff: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}
