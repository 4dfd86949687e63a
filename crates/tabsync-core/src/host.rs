//! The host-adapter seam: everything the core needs from the embedding IDE.
//!
//! The adapter is external and outlives the core; the core holds a borrow
//! (an `Arc<dyn HostAdapter>`), never ownership. All tab and caret
//! mutations must happen on the host's UI thread, reached via
//! [`HostAdapter::run_on_host`].

use crate::editor_state::{Caret, Selection};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("file is not open: {0}")]
    NotOpen(String),

    #[error("cannot open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("host window is not available yet")]
    WindowUnavailable,
}

/// Snapshot of the active editor: path, caret, and optional selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub path: String,
    pub caret: Caret,
    pub selection: Option<Selection>,
}

/// A deferred mutation for the host's UI thread.
pub type HostTask = Box<dyn FnOnce() + Send + 'static>;

pub type FocusCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Surface the embedding IDE must provide.
pub trait HostAdapter: Send + Sync {
    /// Open a file, optionally without stealing focus from other windows.
    fn open_file(&self, path: &str, focus: bool) -> Result<(), HostError>;

    /// Close the tab matching `path`. `Ok(false)` when no tab matched.
    fn close_file(&self, path: &str) -> Result<bool, HostError>;

    /// Paths of all open tabs, in tab order.
    fn opened_files(&self) -> Vec<String>;

    /// The currently active editor, if any.
    fn active_editor(&self) -> Option<EditorSnapshot>;

    /// Set caret and selection in an open file, revealing the caret if it
    /// sits outside the viewport. `selection = None` clears any selection.
    fn set_view(
        &self,
        path: &str,
        caret: Caret,
        selection: Option<Selection>,
    ) -> Result<(), HostError>;

    /// Whether the host window is focused right now.
    fn is_window_focused(&self) -> bool;

    /// Whether the file remains visible in another tab group (suppresses
    /// CLOSE events at ingest).
    fn is_visible_elsewhere(&self, path: &str) -> bool;

    /// Subscribe to focus-gained / focus-lost edges. May fail while the
    /// host window is still initializing; callers retry.
    fn attach_focus_listener(&self, callback: FocusCallback) -> Result<(), HostError>;

    /// Run a mutation on the host's UI thread (or its moral equivalent,
    /// a cooperatively single-threaded queue).
    fn run_on_host(&self, task: HostTask);
}

/// One recorded host mutation, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    Open { path: String, focus: bool },
    Close { path: String },
    SetView {
        path: String,
        caret: Caret,
        selection: Option<Selection>,
    },
}

struct MockHostState {
    open_files: Vec<String>,
    active: Option<EditorSnapshot>,
    focused: bool,
    visible_elsewhere: Vec<String>,
    ops: Vec<HostOp>,
    attach_failures_left: u32,
    missing_files: Vec<String>,
}

/// In-memory host for tests and the headless peer: tabs are a vector,
/// `run_on_host` executes inline (a cooperatively single-threaded queue),
/// and every mutation is recorded in an op log.
pub struct MockHost {
    state: Mutex<MockHostState>,
    focus_callbacks: Mutex<VecDeque<FocusCallback>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockHostState {
                open_files: Vec::new(),
                active: None,
                focused: true,
                visible_elsewhere: Vec::new(),
                ops: Vec::new(),
                attach_failures_left: 0,
                missing_files: Vec::new(),
            }),
            focus_callbacks: Mutex::new(VecDeque::new()),
        }
    }

    /// Seed the open tab set.
    pub fn with_open_files(self, files: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.open_files = files.iter().map(|s| s.to_string()).collect();
        }
        self
    }

    /// Seed the active editor.
    pub fn with_active(self, snapshot: EditorSnapshot) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.active = Some(snapshot);
        }
        self
    }

    /// Make the first `n` focus-listener attachments fail.
    pub fn failing_attachments(self, n: u32) -> Self {
        self.state.lock().unwrap().attach_failures_left = n;
        self
    }

    /// Make `open_file` fail for this path.
    pub fn with_missing_file(self, path: &str) -> Self {
        self.state.lock().unwrap().missing_files.push(path.to_string());
        self
    }

    /// Mark a path visible in another tab group.
    pub fn set_visible_elsewhere(&self, path: &str) {
        self.state.lock().unwrap().visible_elsewhere.push(path.to_string());
    }

    /// Flip window focus and fire attached listeners.
    pub fn set_focused(&self, focused: bool) {
        self.state.lock().unwrap().focused = focused;
        let callbacks: Vec<FocusCallback> =
            self.focus_callbacks.lock().unwrap().iter().cloned().collect();
        for cb in callbacks {
            cb(focused);
        }
    }

    /// Snapshot of the recorded mutations.
    pub fn ops(&self) -> Vec<HostOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.lock().unwrap().ops.clear();
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostAdapter for MockHost {
    fn open_file(&self, path: &str, focus: bool) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        if state.missing_files.iter().any(|p| p == path) {
            return Err(HostError::OpenFailed {
                path: path.to_string(),
                reason: "no such file".into(),
            });
        }
        state.ops.push(HostOp::Open {
            path: path.to_string(),
            focus,
        });
        if !state.open_files.iter().any(|p| p == path) {
            state.open_files.push(path.to_string());
        }
        if focus {
            state.active = Some(EditorSnapshot {
                path: path.to_string(),
                caret: Caret::new(0, 0),
                selection: None,
            });
        }
        Ok(())
    }

    fn close_file(&self, path: &str) -> Result<bool, HostError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(HostOp::Close {
            path: path.to_string(),
        });
        let before = state.open_files.len();
        state.open_files.retain(|p| p != path);
        if state.active.as_ref().map(|a| a.path == path).unwrap_or(false) {
            state.active = None;
        }
        Ok(state.open_files.len() != before)
    }

    fn opened_files(&self) -> Vec<String> {
        self.state.lock().unwrap().open_files.clone()
    }

    fn active_editor(&self) -> Option<EditorSnapshot> {
        self.state.lock().unwrap().active.clone()
    }

    fn set_view(
        &self,
        path: &str,
        caret: Caret,
        selection: Option<Selection>,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        if !state.open_files.iter().any(|p| p == path) {
            return Err(HostError::NotOpen(path.to_string()));
        }
        state.ops.push(HostOp::SetView {
            path: path.to_string(),
            caret,
            selection,
        });
        state.active = Some(EditorSnapshot {
            path: path.to_string(),
            caret,
            selection,
        });
        Ok(())
    }

    fn is_window_focused(&self) -> bool {
        self.state.lock().unwrap().focused
    }

    fn is_visible_elsewhere(&self, path: &str) -> bool {
        self.state.lock().unwrap().visible_elsewhere.iter().any(|p| p == path)
    }

    fn attach_focus_listener(&self, callback: FocusCallback) -> Result<(), HostError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.attach_failures_left > 0 {
                state.attach_failures_left -= 1;
                return Err(HostError::WindowUnavailable);
            }
        }
        self.focus_callbacks.lock().unwrap().push_back(callback);
        Ok(())
    }

    fn run_on_host(&self, task: HostTask) {
        task();
    }
}
