//! Apply: execute inbound actions against the host.
//!
//! Every mutation runs as one task on the host's UI thread. Failures are
//! logged and skipped; the next focus-lost workspace sync reconverges the
//! two sides.

use std::sync::Arc;
use tabsync_core::editor_state::{EditorState, SyncAction};
use tabsync_core::host::HostAdapter;
use tabsync_core::paths::{self, PathStyle};
use tabsync_core::reconcile;
use tabsync_core::window::WindowState;
use tracing::{debug, warn};

/// Executes inbound payloads on the host thread.
#[derive(Clone)]
pub struct Applier {
    host: Arc<dyn HostAdapter>,
    window: Arc<WindowState>,
    style: PathStyle,
}

impl Applier {
    pub fn new(host: Arc<dyn HostAdapter>, window: Arc<WindowState>, style: PathStyle) -> Self {
        Self {
            host,
            window,
            style,
        }
    }

    /// Enqueue one apply task on the host thread.
    pub fn apply(&self, payload: EditorState) {
        let this = self.clone();
        self.host
            .run_on_host(Box::new(move || this.apply_on_host(payload)));
    }

    fn apply_on_host(&self, payload: EditorState) {
        let path = payload.normalized_path(self.style).to_string();
        match payload.action {
            SyncAction::Close => self.close(&path),
            SyncAction::Open => self.open_and_view(&path, &payload),
            SyncAction::Navigate => self.navigate(&path, &payload),
            SyncAction::WorkspaceSync => self.reconcile_workspace(&payload),
        }
    }

    fn close(&self, path: &str) {
        match self.host.close_file(path) {
            Ok(true) => debug!(path, "closed"),
            Ok(false) => warn!(path, "close requested for a tab that is not open"),
            Err(e) => warn!(path, error = %e, "close failed"),
        }
    }

    /// OPEN: open without stealing focus, then place caret and selection.
    fn open_and_view(&self, path: &str, payload: &EditorState) {
        if let Err(e) = self.host.open_file(path, false) {
            warn!(path, error = %e, "open failed");
            return;
        }
        self.set_view(path, payload);
    }

    /// NAVIGATE: the file is expected open; open it first when it is not.
    fn navigate(&self, path: &str, payload: &EditorState) {
        let already_open = self.host.opened_files().iter().any(|p| p == path);
        if !already_open {
            debug!(path, "navigate target not open, opening");
            if let Err(e) = self.host.open_file(path, false) {
                warn!(path, error = %e, "open failed");
                return;
            }
        }
        self.set_view(path, payload);
    }

    fn set_view(&self, path: &str, payload: &EditorState) {
        let (caret, selection) = payload.view();
        if let Err(e) = self.host.set_view(path, caret, selection) {
            warn!(path, caret = %caret.display(), error = %e, "view update failed");
        }
    }

    /// WORKSPACE_SYNC: align the tab set, then either restore the local
    /// view (if this side is the one being used) or follow the remote.
    fn reconcile_workspace(&self, payload: &EditorState) {
        let was_active = self.window.is_active_force(self.host.as_ref());
        let saved = if was_active {
            self.host.active_editor()
        } else {
            None
        };

        let current = self.host.opened_files();
        let target = payload.opened_files.clone().unwrap_or_default();
        let plan = reconcile::plan(&current, &target, self.style);
        debug!(
            closing = plan.to_close.len(),
            opening = plan.to_open.len(),
            "workspace reconcile"
        );

        for path in &plan.to_close {
            self.close(path);
        }

        let mut opened_any = false;
        for path in &plan.to_open {
            match self.host.open_file(path, false) {
                Ok(()) => opened_any = true,
                Err(e) => warn!(path, error = %e, "open failed during reconcile"),
            }
        }

        // Focus may have shifted while the tab I/O ran.
        let still_active = self.window.is_active_force(self.host.as_ref());
        let restore = match saved {
            Some(saved) if reconcile::should_restore_local(still_active, true, opened_any) => {
                Some(saved)
            }
            _ => None,
        };

        if let Some(saved) = restore {
            debug!(path = %saved.path, "restoring local view");
            if let Err(e) = self.host.set_view(&saved.path, saved.caret, saved.selection) {
                warn!(path = %saved.path, error = %e, "restore failed");
            }
        } else if !payload.file_path.is_empty() {
            let path = paths::normalize_incoming(&payload.file_path, self.style);
            if !self.host.opened_files().iter().any(|p| p == &path) {
                if let Err(e) = self.host.open_file(&path, false) {
                    warn!(path, error = %e, "open failed");
                    return;
                }
            }
            self.set_view(&path, payload);
        }
    }
}
