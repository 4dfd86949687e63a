//! The sync engine: wiring and lifecycle.
//!
//! Owns the transport, the outbound queue and its worker, the ingest and
//! inbound tasks, and the window-focus plumbing. The embedding IDE feeds
//! editor events through [`SyncEngine::ingest`] and receives connection
//! edges through the status callback.

use crate::apply::Applier;
use crate::inbound::{spawn_processor, InboundConfig};
use crate::ingest::EventIngest;
use crate::outbound::{spawn_worker, OutboundQueue};
use crate::transport::{StatusCallback, Transport};
use crate::window::spawn_focus_attach;
use std::sync::{Arc, Mutex};
use tabsync_core::config::{HostInfo, SyncConfig, Tuning};
use tabsync_core::host::HostAdapter;
use tabsync_core::identity::{InstanceId, MessageIdMint};
use tabsync_core::status::ConnectionState;
use tabsync_core::window::WindowState;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct SyncEngine {
    info: HostInfo,
    instance_id: InstanceId,
    transport: Arc<Transport>,
    ingest: EventIngest,
    queue: Arc<OutboundQueue>,
    tuning: Tuning,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Build and start the engine. Workers are live immediately; the
    /// transport connects only once sync is enabled (or right away with
    /// `auto_start_sync`).
    pub fn start(
        host: Arc<dyn HostAdapter>,
        info: HostInfo,
        config: SyncConfig,
        tuning: Tuning,
    ) -> Arc<Self> {
        let instance_id = InstanceId::derive(&info.project_path);
        info!(instance = %instance_id, role = info.role.as_str(), "sync engine starting");

        let mint = Arc::new(MessageIdMint::new(instance_id.clone()));
        let cancel = CancellationToken::new();
        let window = Arc::new(WindowState::new(host.is_window_focused()));
        let queue = Arc::new(OutboundQueue::new(tuning.queue_capacity));

        let auto_start = config.auto_start_sync;
        let (transport, sync_rx) = Transport::new(info.clone(), config, tuning.clone());
        let transport = Arc::new(transport);

        let (ingest, ingest_task) = EventIngest::spawn(
            Arc::clone(&host),
            Arc::clone(&window),
            info.family,
            Arc::clone(&queue),
            tuning.debounce,
            cancel.clone(),
        );

        // Focus-lost broadcasts the full workspace snapshot.
        {
            let ingest = ingest.clone();
            window.on_change(Arc::new(move |active| {
                if !active {
                    ingest.workspace_sync();
                }
            }));
        }

        let applier = Applier::new(Arc::clone(&host), Arc::clone(&window), info.family.path_style());
        let inbound_task = spawn_processor(
            sync_rx,
            instance_id.clone(),
            InboundConfig {
                dedup_capacity: tuning.dedup_capacity,
                dedup_window: tuning.dedup_window,
                stale_cutoff: tuning.stale_cutoff,
            },
            applier,
            cancel.clone(),
        );

        let outbound_task = spawn_worker(
            Arc::clone(&queue),
            mint,
            Arc::clone(&transport),
            tuning.queue_pause,
            cancel.clone(),
        );

        let attach_task = spawn_focus_attach(
            Arc::clone(&host),
            Arc::clone(&window),
            tuning.attach_attempts,
            tuning.attach_interval,
            cancel.clone(),
        );

        let engine = Arc::new(Self {
            info,
            instance_id,
            transport,
            ingest,
            queue,
            tuning,
            cancel,
            workers: Mutex::new(vec![ingest_task, inbound_task, outbound_task, attach_task]),
        });

        if auto_start {
            engine.enable_sync();
        }
        engine
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn info(&self) -> &HostInfo {
        &self.info
    }

    /// The callback surface the host glue feeds editor events into.
    pub fn ingest(&self) -> &EventIngest {
        &self.ingest
    }

    /// Register the connection-state callback (edges only).
    pub fn set_status_callback(&self, callback: StatusCallback) {
        self.transport.set_callback(callback);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn queued_messages(&self) -> usize {
        self.queue.len()
    }

    /// Turn auto-reconnect on.
    pub fn enable_sync(&self) {
        self.transport.enable();
    }

    /// Turn auto-reconnect off and drop any connection.
    pub async fn disable_sync(&self) {
        self.transport.disable().await;
    }

    /// Restart the transport (rebind or rescan).
    pub async fn restart_sync(&self) {
        self.transport.restart().await;
    }

    /// Tear everything down: cancel workers, drop the connection, clear
    /// the queue, and join with a bounded grace period.
    pub async fn dispose(&self) {
        info!(instance = %self.instance_id, "sync engine disposing");
        self.cancel.cancel();
        self.transport.disable().await;
        self.queue.clear();

        let workers: Vec<JoinHandle<()>> = {
            let mut guard = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for worker in workers {
            if tokio::time::timeout(self.tuning.shutdown_grace, worker)
                .await
                .is_err()
            {
                warn!("worker did not stop within the grace period");
            }
        }
    }
}
