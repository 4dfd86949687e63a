//! Per-file NAVIGATE coalescing.
//!
//! At most one pending entry exists per file path; scheduling replaces the
//! prior entry and restarts its window. The table holds no timers itself:
//! the ingest task asks for `next_due()` and flushes with `take_due()`.

use crate::editor_state::EditorState;
use std::collections::HashMap;
use std::time::Duration;

struct Pending {
    state: EditorState,
    due_at_ms: u64,
}

/// Pending NAVIGATE events keyed by file path.
pub struct DebounceTable {
    delay_ms: u64,
    pending: HashMap<String, Pending>,
}

impl DebounceTable {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay_ms: delay.as_millis() as u64,
            pending: HashMap::new(),
        }
    }

    /// Schedule (or reschedule) the event for its file path. Returns `true`
    /// when a prior pending event was replaced.
    pub fn schedule(&mut self, state: EditorState, now_ms: u64) -> bool {
        let due_at_ms = now_ms + self.delay_ms;
        self.pending
            .insert(state.file_path.clone(), Pending { state, due_at_ms })
            .is_some()
    }

    /// Cancel the pending event for a path, returning it if one existed.
    pub fn cancel(&mut self, file_path: &str) -> Option<EditorState> {
        self.pending.remove(file_path).map(|p| p.state)
    }

    /// Remove and return every event whose window has elapsed, oldest first.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<EditorState> {
        let due_paths: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due_at_ms <= now_ms)
            .map(|(path, _)| path.clone())
            .collect();

        let mut due: Vec<Pending> = due_paths
            .into_iter()
            .filter_map(|path| self.pending.remove(&path))
            .collect();
        due.sort_by_key(|p| p.due_at_ms);
        due.into_iter().map(|p| p.state).collect()
    }

    /// Earliest pending deadline, if any.
    pub fn next_due(&self) -> Option<u64> {
        self.pending.values().map(|p| p.due_at_ms).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
