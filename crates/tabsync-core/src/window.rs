//! Cached window-focus state.
//!
//! The host pushes focus edges asynchronously; `is_active` reads the cache,
//! and `is_active_force` re-queries the host, repairing the cache (and
//! firing the change callback) when they disagree.

use crate::host::HostAdapter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

pub type ActiveCallback = Arc<dyn Fn(bool) + Send + Sync>;

pub struct WindowState {
    active: AtomicBool,
    callback: RwLock<Option<ActiveCallback>>,
}

impl WindowState {
    pub fn new(initially_active: bool) -> Self {
        Self {
            active: AtomicBool::new(initially_active),
            callback: RwLock::new(None),
        }
    }

    /// Register the change callback fired on every focus edge.
    pub fn on_change(&self, callback: ActiveCallback) {
        *self.callback.write().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    /// Cached focus flag.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Query the host directly; on disagreement the cache is updated and
    /// the change callback fires.
    pub fn is_active_force(&self, host: &dyn HostAdapter) -> bool {
        let real = host.is_window_focused();
        self.set_active(real);
        real
    }

    /// Update the cache from a host focus edge. Returns `true` when the
    /// value changed (callback fired).
    pub fn set_active(&self, active: bool) -> bool {
        let previous = self.active.swap(active, Ordering::SeqCst);
        if previous == active {
            return false;
        }
        let callback = self
            .callback
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(cb) = callback {
            cb(active);
        }
        true
    }
}
