//! Event ingest: host callbacks in, normalized `EditorState` values out.
//!
//! Normalization rules:
//! - `file_opened` and `active_tab_changed` produce `OPEN`
//! - `caret_or_selection_changed` produces `NAVIGATE` (debounced per file)
//! - `file_closed` produces `CLOSE`, suppressed while the file remains
//!   visible in another tab group, and cancels any pending `NAVIGATE`
//!
//! Virtual documents are filtered here, and only events from a focused
//! window are ever enqueued: an unfocused window observes, it does not
//! command.

use crate::outbound::OutboundQueue;
use std::sync::Arc;
use std::time::Duration;
use tabsync_core::editor_state::{Caret, EditorState, IdeFamily, Selection, SyncAction};
use tabsync_core::host::HostAdapter;
use tabsync_core::paths;
use tabsync_core::time;
use tabsync_core::window::WindowState;
use tabsync_core::DebounceTable;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

enum IngestCmd {
    /// Enqueue immediately (OPEN, CLOSE, WORKSPACE_SYNC).
    Immediate(EditorState),
    /// Coalesce per file path.
    Navigate(EditorState),
}

/// Host-facing callback surface. Clone freely; all clones feed the same
/// debounce task.
#[derive(Clone)]
pub struct EventIngest {
    tx: mpsc::UnboundedSender<IngestCmd>,
    host: Arc<dyn HostAdapter>,
    window: Arc<WindowState>,
    family: IdeFamily,
}

impl EventIngest {
    /// Create the ingest surface and spawn its debounce task.
    pub(crate) fn spawn(
        host: Arc<dyn HostAdapter>,
        window: Arc<WindowState>,
        family: IdeFamily,
        queue: Arc<OutboundQueue>,
        debounce: Duration,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_debounce(rx, queue, debounce, cancel));
        (
            Self {
                tx,
                host,
                window,
                family,
            },
            task,
        )
    }

    /// Host reports a file was opened.
    pub fn file_opened(&self, path: &str, caret: Caret, selection: Option<Selection>) {
        self.emit_open(path, caret, selection);
    }

    /// Host reports the active tab changed.
    pub fn active_tab_changed(&self, path: &str, caret: Caret, selection: Option<Selection>) {
        self.emit_open(path, caret, selection);
    }

    /// Host reports a caret or selection move.
    pub fn caret_or_selection_changed(&self, path: &str, caret: Caret, selection: Option<Selection>) {
        let Some(state) = self.normalized(SyncAction::Navigate, path, caret, selection) else {
            return;
        };
        let _ = self.tx.send(IngestCmd::Navigate(state));
    }

    /// Host reports a file was closed.
    pub fn file_closed(&self, path: &str) {
        if self.host.is_visible_elsewhere(path) {
            trace!(path, "close suppressed, still visible in another group");
            return;
        }
        let Some(state) = self.normalized(SyncAction::Close, path, Caret::new(0, 0), None) else {
            return;
        };
        let _ = self.tx.send(IngestCmd::Immediate(state));
    }

    /// Broadcast the full workspace snapshot (emitted on focus-lost).
    ///
    /// Stamped `is_active = true`: the sender was the commanding side
    /// until this very edge.
    pub fn workspace_sync(&self) {
        let files: Vec<String> = self
            .host
            .opened_files()
            .into_iter()
            .filter(|p| paths::is_local_file_path(p))
            .collect();

        let (path, caret, selection) = match self.host.active_editor() {
            Some(snapshot) if paths::is_local_file_path(&snapshot.path) => {
                (snapshot.path, snapshot.caret, snapshot.selection)
            }
            _ => (String::new(), Caret::new(0, 0), None),
        };

        let state = EditorState::new(SyncAction::WorkspaceSync, path, caret, self.family, true)
            .with_selection(selection)
            .with_opened_files(files);
        let _ = self.tx.send(IngestCmd::Immediate(state));
    }

    fn emit_open(&self, path: &str, caret: Caret, selection: Option<Selection>) {
        let Some(state) = self.normalized(SyncAction::Open, path, caret, selection) else {
            return;
        };
        let _ = self.tx.send(IngestCmd::Immediate(state));
    }

    /// Apply the shared filters and stamp the active flag.
    fn normalized(
        &self,
        action: SyncAction,
        path: &str,
        caret: Caret,
        selection: Option<Selection>,
    ) -> Option<EditorState> {
        if !paths::is_local_file_path(path) {
            trace!(path, "dropping virtual document");
            return None;
        }
        if !self.window.is_active() {
            debug!(path, action = action.as_str(), "window unfocused, not enqueuing");
            return None;
        }
        Some(EditorState::new(action, path, caret, self.family, true).with_selection(selection))
    }
}

/// The debounce task: owns the table, flushes due NAVIGATEs, and lets
/// OPEN/CLOSE/WORKSPACE_SYNC bypass (CLOSE cancelling a pending NAVIGATE
/// for its path before it is enqueued).
async fn run_debounce(
    mut rx: mpsc::UnboundedReceiver<IngestCmd>,
    queue: Arc<OutboundQueue>,
    debounce: Duration,
    cancel: CancellationToken,
) {
    let mut table = DebounceTable::new(debounce);
    loop {
        let sleep_for = table
            .next_due()
            .map(|due| Duration::from_millis(due.saturating_sub(time::epoch_ms())))
            .unwrap_or(Duration::from_secs(3600));

        tokio::select! {
            _ = cancel.cancelled() => {
                table.clear();
                return;
            }
            cmd = rx.recv() => {
                let Some(cmd) = cmd else { return };
                match cmd {
                    IngestCmd::Immediate(state) => {
                        if state.action == SyncAction::Close && table.cancel(&state.file_path).is_some() {
                            trace!(path = %state.file_path, "close cancelled pending navigate");
                        }
                        queue.push(state);
                    }
                    IngestCmd::Navigate(state) => {
                        table.schedule(state, time::epoch_ms());
                    }
                }
            }
            _ = tokio::time::sleep(sleep_for) => {
                for state in table.take_due(time::epoch_ms()) {
                    queue.push(state);
                }
            }
        }
    }
}
