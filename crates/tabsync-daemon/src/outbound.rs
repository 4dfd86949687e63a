//! The thread-safe outbound queue and its single drain worker.
//!
//! `push` never blocks (the core FIFO drops its head on overflow); the
//! worker wraps each state in a `MessageWrapper` and hands it to the
//! transport, pausing briefly between sends to smooth bursts. Dropped
//! sends are not retried; the next focus-lost workspace sync reconverges.

use crate::transport::Transport;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tabsync_core::editor_state::EditorState;
use tabsync_core::identity::MessageIdMint;
use tabsync_core::protocol::MessageWrapper;
use tabsync_core::queue::SendQueue;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// `SendQueue` behind a mutex with a wakeup for the worker.
pub struct OutboundQueue {
    inner: Mutex<SendQueue>,
    notify: Notify,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(SendQueue::new(capacity)),
            notify: Notify::new(),
        }
    }

    /// Enqueue without blocking; warns when the head had to be dropped.
    pub fn push(&self, state: EditorState) {
        let dropped = self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(state);
        if let Some(old) = dropped {
            warn!(
                action = old.action.as_str(),
                file = %old.file_path,
                "send queue full, dropping oldest"
            );
        }
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<EditorState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).pop()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Spawn the drain worker. On shutdown the queue is cleared and the worker
/// exits at the next loop turn.
pub(crate) fn spawn_worker(
    queue: Arc<OutboundQueue>,
    mint: Arc<MessageIdMint>,
    transport: Arc<Transport>,
    pause: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    queue.clear();
                    return;
                }
                _ = queue.wait() => {}
            }

            while let Some(state) = queue.pop() {
                if cancel.is_cancelled() {
                    queue.clear();
                    return;
                }
                let wrapper = MessageWrapper::create(&mint, state);
                if !transport.send(&wrapper).await {
                    debug!(
                        message_id = %wrapper.message_id,
                        "send failed while not connected, dropping"
                    );
                }
                tokio::time::sleep(pause).await;
            }
        }
    })
}
