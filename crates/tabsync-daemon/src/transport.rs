//! The transport facade.
//!
//! Hides role asymmetry behind one contract: `set_callback`, `enable`,
//! `disable`, `send`, `restart`, `state`. One role task (listener or
//! scanner) owns rendezvous and connection supervision; `send` only needs
//! the shared writer slot, so it never blocks on the supervisor.

use crate::connection::{write_line, ConnEvent};
use crate::listener::run_listener;
use crate::scanner::run_scanner;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tabsync_core::config::{HostInfo, Role, SyncConfig, Tuning};
use tabsync_core::heartbeat::HeartbeatState;
use tabsync_core::protocol::{ControlFrame, HeartbeatAck, MessageWrapper, MAX_MESSAGE_SIZE};
use tabsync_core::status::{ConnectionState, StatusTracker};
use tabsync_core::time;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type StatusCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// State shared between the facade, the role task, and `send` callers.
pub(crate) struct TransportShared {
    pub(crate) info: HostInfo,
    pub(crate) config: SyncConfig,
    pub(crate) tuning: Tuning,
    /// Write half of the single active connection, if any.
    pub(crate) writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    status: Mutex<StatusTracker>,
    callback: RwLock<Option<StatusCallback>>,
    /// Sync lines on their way to the inbound processor.
    pub(crate) sync_tx: mpsc::UnboundedSender<String>,
}

impl TransportShared {
    /// Transition the connection state, firing the callback on edges only.
    pub(crate) fn set_status(&self, next: ConnectionState) {
        let edge = self
            .status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .transition(next);
        if let Some(state) = edge {
            info!(state = %state, "connection state changed");
            let callback = self
                .callback
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(cb) = callback {
                cb(state);
            }
        }
    }

    pub(crate) async fn install_writer(&self, writer: OwnedWriteHalf) {
        *self.writer.lock().await = Some(writer);
    }

    pub(crate) async fn clear_writer(&self) {
        *self.writer.lock().await = None;
    }

    /// Write a control line over the active connection. A failure clears
    /// the writer slot; the read task surfaces the teardown.
    pub(crate) async fn send_control(&self, line: &str) -> bool {
        let mut slot = self.writer.lock().await;
        match slot.as_mut() {
            None => false,
            Some(writer) => match write_line(writer, line).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "control write failed");
                    *slot = None;
                    false
                }
            },
        }
    }

    /// Handle one event from the active connection's read task. Heartbeat
    /// traffic is consumed here and never reaches the inbound processor.
    /// Returns `true` when the connection must be torn down.
    pub(crate) async fn handle_event(
        &self,
        event: ConnEvent,
        heartbeat: &mut HeartbeatState,
    ) -> bool {
        match event {
            ConnEvent::Control(ControlFrame::Heartbeat(_)) => {
                let now = time::epoch_ms();
                heartbeat.on_received(now);
                let ack = HeartbeatAck::new(now);
                self.send_control(&ack.to_json()).await;
                false
            }
            ConnEvent::Control(ControlFrame::HeartbeatAck(_)) => {
                heartbeat.on_received(time::epoch_ms());
                false
            }
            ConnEvent::Control(frame) => {
                debug!(?frame, "unexpected control frame on established connection");
                false
            }
            ConnEvent::Sync(line) => {
                let _ = self.sync_tx.send(line);
                false
            }
            ConnEvent::Closed => true,
        }
    }
}

/// Sleep that returns early on cancellation. `true` means cancelled.
pub(crate) async fn sleep_cancellable(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

struct Runner {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Loopback TCP transport with a fixed role.
pub struct Transport {
    shared: Arc<TransportShared>,
    runner: Mutex<Option<Runner>>,
}

impl Transport {
    /// Create the transport. The returned receiver carries inbound sync
    /// lines (control traffic is consumed internally).
    pub fn new(
        info: HostInfo,
        config: SyncConfig,
        tuning: Tuning,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sync_tx, sync_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(TransportShared {
            info,
            config,
            tuning,
            writer: tokio::sync::Mutex::new(None),
            status: Mutex::new(StatusTracker::new()),
            callback: RwLock::new(None),
            sync_tx,
        });
        (
            Self {
                shared,
                runner: Mutex::new(None),
            },
            sync_rx,
        )
    }

    /// Register the connection-state callback (coalesced to edges).
    pub fn set_callback(&self, callback: StatusCallback) {
        *self
            .shared
            .callback
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared
            .status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state()
    }

    pub fn role(&self) -> Role {
        self.shared.info.role
    }

    /// Start the role task (idempotent while running).
    pub fn enable(&self) {
        let mut runner = self.runner.lock().unwrap_or_else(|e| e.into_inner());
        if runner.is_some() {
            debug!("transport already enabled");
            return;
        }
        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let task = match self.shared.info.role {
            Role::Listener => tokio::spawn(run_listener(shared, cancel.clone())),
            Role::Scanner => tokio::spawn(run_scanner(shared, cancel.clone())),
        };
        info!(role = self.shared.info.role.as_str(), "transport enabled");
        *runner = Some(Runner { cancel, task });
    }

    /// Stop the role task, drop any connection, and go `Disconnected`.
    pub async fn disable(&self) {
        let runner = self
            .runner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(Runner { cancel, task }) = runner {
            cancel.cancel();
            let grace = self.shared.tuning.shutdown_grace;
            if tokio::time::timeout(grace, task).await.is_err() {
                warn!("transport task did not stop within the grace period");
            }
        }
        self.shared.clear_writer().await;
        self.shared.set_status(ConnectionState::Disconnected);
    }

    /// Tear down and re-run the role task.
    pub async fn restart(&self) {
        self.disable().await;
        self.enable();
    }

    /// Send one sync wrapper. Returns `false` without retry when not
    /// connected, when the serialized line is oversized, or when the
    /// write fails (which also demotes the connection).
    pub async fn send(&self, wrapper: &MessageWrapper) -> bool {
        let line = wrapper.to_json();
        if line.len() > MAX_MESSAGE_SIZE {
            warn!(
                size = line.len(),
                max = MAX_MESSAGE_SIZE,
                message_id = %wrapper.message_id,
                "dropping oversized outbound message"
            );
            return false;
        }

        let mut slot = self.shared.writer.lock().await;
        match slot.as_mut() {
            None => false,
            Some(writer) => match write_line(writer, &line).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "sync write failed");
                    *slot = None;
                    false
                }
            },
        }
    }
}
