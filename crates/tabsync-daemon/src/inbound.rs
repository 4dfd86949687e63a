//! The inbound processor task.
//!
//! Receives raw sync lines from the transport (control traffic never gets
//! here), parses them, runs the core filter chain, and dispatches
//! survivors to the applier. The dedup table is confined to this task.

use crate::apply::Applier;
use std::time::Duration;
use tabsync_core::dedup::DedupTable;
use tabsync_core::identity::InstanceId;
use tabsync_core::inbound::{evaluate, Verdict};
use tabsync_core::protocol::MessageWrapper;
use tabsync_core::time;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

pub(crate) struct InboundConfig {
    pub dedup_capacity: usize,
    pub dedup_window: Duration,
    pub stale_cutoff: Duration,
}

pub(crate) fn spawn_processor(
    mut rx: mpsc::UnboundedReceiver<String>,
    self_id: InstanceId,
    config: InboundConfig,
    applier: Applier,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut dedup = DedupTable::new(config.dedup_capacity, config.dedup_window);
        let stale_cutoff_ms = config.stale_cutoff.as_millis() as u64;

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => return,
                line = rx.recv() => match line {
                    Some(line) => line,
                    None => return,
                },
            };

            let Some(wrapper) = MessageWrapper::from_json(&line) else {
                warn!(size = line.len(), "dropping unparsable sync message");
                continue;
            };

            match evaluate(&wrapper, &self_id, &mut dedup, time::epoch_ms(), stale_cutoff_ms) {
                Verdict::Apply => {
                    trace!(
                        message_id = %wrapper.message_id,
                        action = wrapper.payload.action.as_str(),
                        "dispatching to apply"
                    );
                    applier.apply(wrapper.payload);
                }
                Verdict::SelfMessage | Verdict::Duplicate => {}
                Verdict::Inactive => {
                    debug!(message_id = %wrapper.message_id, "dropping observational message");
                }
                Verdict::Stale { age_ms } => {
                    debug!(message_id = %wrapper.message_id, age_ms, "dropping stale message");
                }
                Verdict::BadTimestamp => {
                    warn!(
                        message_id = %wrapper.message_id,
                        timestamp = %wrapper.payload.timestamp,
                        "dropping message with unparsable timestamp"
                    );
                }
            }
        }
    })
}
