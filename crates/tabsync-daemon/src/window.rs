//! Window-focus attachment.
//!
//! The host window may not exist yet when the engine starts, so listener
//! attachment is retried on an interval before giving up.

use std::sync::Arc;
use std::time::Duration;
use tabsync_core::host::{FocusCallback, HostAdapter};
use tabsync_core::window::WindowState;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn the attachment task: retry `attach_focus_listener` up to
/// `attempts` times at `interval`, then give up with a warning.
///
/// The attached callback routes host focus edges into the cached
/// [`WindowState`], which fans out to its own change callback.
pub(crate) fn spawn_focus_attach(
    host: Arc<dyn HostAdapter>,
    window: Arc<WindowState>,
    attempts: u32,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let callback: FocusCallback = {
            let window = Arc::clone(&window);
            Arc::new(move |focused| {
                window.set_active(focused);
            })
        };

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return;
            }
            match host.attach_focus_listener(Arc::clone(&callback)) {
                Ok(()) => {
                    info!(attempt, "focus listener attached");
                    // Seed the cache with the real focus state.
                    window.set_active(host.is_window_focused());
                    return;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "focus listener attach failed");
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        warn!(attempts, "giving up on focus listener attachment");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsync_core::host::MockHost;

    #[tokio::test]
    async fn test_attach_succeeds_after_retries() {
        let host = Arc::new(MockHost::new().failing_attachments(3));
        let window = Arc::new(WindowState::new(true));
        let cancel = CancellationToken::new();

        let task = spawn_focus_attach(
            Arc::clone(&host) as Arc<dyn HostAdapter>,
            Arc::clone(&window),
            10,
            Duration::from_millis(10),
            cancel,
        );
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("attach task should finish")
            .unwrap();

        // The listener is live: focus edges reach the cache.
        host.set_focused(false);
        assert!(!window.is_active());
        host.set_focused(true);
        assert!(window.is_active());
    }

    #[tokio::test]
    async fn test_attach_gives_up() {
        let host = Arc::new(MockHost::new().failing_attachments(100));
        let window = Arc::new(WindowState::new(true));
        let cancel = CancellationToken::new();

        let task = spawn_focus_attach(
            Arc::clone(&host) as Arc<dyn HostAdapter>,
            window,
            3,
            Duration::from_millis(5),
            cancel,
        );
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("attach task should give up")
            .unwrap();
    }
}
