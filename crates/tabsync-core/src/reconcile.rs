//! Workspace reconciliation planning.
//!
//! On focus-lost the sender broadcasts its full tab set; the receiver
//! aligns its own set against it. Planning is pure set difference over
//! platform-normalized paths; execution belongs to the daemon's apply
//! component.

use crate::paths::{self, PathStyle};
use std::collections::HashSet;

/// Tabs to close and files to open, computed from current vs. target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Host paths present locally but not in the target set (original,
    /// un-normalized form so the host can match its own tabs).
    pub to_close: Vec<String>,
    /// Target paths missing locally (already normalized for this platform).
    pub to_open: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.to_close.is_empty() && self.to_open.is_empty()
    }
}

/// Compute the plan.
///
/// `current` comes from the host and is normalized for comparison only
/// (no artifact-suffix repair, which applies to wire paths alone).
/// `target` comes off the wire and gets the full incoming normalization.
pub fn plan(current: &[String], target: &[String], style: PathStyle) -> ReconcilePlan {
    let target_normalized: Vec<String> = target
        .iter()
        .map(|p| paths::normalize_incoming(p, style))
        .collect();
    let target_set: HashSet<&str> = target_normalized.iter().map(|s| s.as_str()).collect();

    let current_normalized: Vec<String> = current
        .iter()
        .map(|p| paths::normalize_platform(p, style))
        .collect();
    let current_set: HashSet<&str> = current_normalized.iter().map(|s| s.as_str()).collect();

    let to_close = current
        .iter()
        .zip(current_normalized.iter())
        .filter(|(_, normalized)| !target_set.contains(normalized.as_str()))
        .map(|(original, _)| original.clone())
        .collect();

    let to_open = target_normalized
        .iter()
        .filter(|normalized| !current_set.contains(normalized.as_str()))
        .cloned()
        .collect();

    ReconcilePlan { to_close, to_open }
}

/// Whether the receiver should restore its own saved view after aligning
/// tabs: only when it is still the focused side, it had an active editor
/// to save, and the alignment actually opened something.
pub fn should_restore_local(still_active: bool, saved_view: bool, opened_any: bool) -> bool {
    still_active && saved_view && opened_any
}
