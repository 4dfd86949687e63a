//! The `EditorState` wire payload and its building blocks.
//!
//! One `EditorState` is a self-contained description of a single editing
//! event: which action, which file, where the caret sits, whether the
//! sending window was focused, and (for workspace syncs) the full set of
//! opened files. Receivers never need prior messages to interpret one.

use crate::config::Role;
use crate::paths::{self, PathStyle};
use crate::time;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The four synchronized operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncAction {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "CLOSE")]
    Close,
    #[serde(rename = "NAVIGATE")]
    Navigate,
    #[serde(rename = "WORKSPACE_SYNC")]
    WorkspaceSync,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
            Self::Navigate => "NAVIGATE",
            Self::WorkspaceSync => "WORKSPACE_SYNC",
        }
    }
}

/// Which of the two cooperating IDE families an instance belongs to.
///
/// Family A serializes paths POSIX-style and binds as the listener by
/// default; family B is the Windows-hosted family and scans. The tag
/// travels on the wire only for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdeFamily {
    A,
    B,
}

impl IdeFamily {
    /// The transport role this family takes unless configuration overrides it.
    pub fn default_role(&self) -> Role {
        match self {
            Self::A => Role::Listener,
            Self::B => Role::Scanner,
        }
    }

    pub fn path_style(&self) -> PathStyle {
        match self {
            Self::A => PathStyle::Posix,
            Self::B => PathStyle::Windows,
        }
    }
}

/// Zero-based caret position. Document order is line-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Caret {
    pub line: u32,
    pub column: u32,
}

impl Caret {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Human-facing rendering: 1-based, `line:column`.
    pub fn display(&self) -> String {
        format!("{}:{}", self.line + 1, self.column + 1)
    }
}

/// A non-empty selection in document order (`start <= end`).
///
/// The caret sits on one of the two endpoints; which one encodes the
/// selection direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: Caret,
    pub end: Caret,
}

impl Selection {
    /// Build a selection from two endpoints in either order.
    pub fn ordered(a: Caret, b: Caret) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The endpoint nearest to `caret`, preserving selection direction when
    /// the caret already sits on an endpoint.
    pub fn nearest_endpoint(&self, caret: Caret) -> Caret {
        if caret <= self.start {
            self.start
        } else if caret >= self.end {
            self.end
        } else {
            // Caret strictly inside: pick by line distance, then column.
            let to_start = caret.line - self.start.line;
            let to_end = self.end.line - caret.line;
            if to_start < to_end || (to_start == to_end && caret.column < self.end.column) {
                self.start
            } else {
                self.end
            }
        }
    }
}

/// The wire payload: one normalized editing event.
///
/// The four selection coordinates are present together or not at all;
/// constructors enforce this and `selection()` is the typed accessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    pub action: SyncAction,
    /// Absolute path; empty only for a `WORKSPACE_SYNC` with no active editor.
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub source: IdeFamily,
    /// Whether the sending window was focused at event time. Receivers
    /// never apply `false` messages.
    pub is_active: bool,
    /// Local wall clock, `YYYY-MM-DD HH:MM:SS.mmm`.
    pub timestamp: String,
    /// Present iff `action == WorkspaceSync`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection_start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection_start_column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection_end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection_end_column: Option<u32>,
    /// Locally normalized `file_path`, computed on first use.
    #[serde(skip)]
    normalized: OnceLock<String>,
}

impl PartialEq for EditorState {
    fn eq(&self, other: &Self) -> bool {
        // The normalization cache is derived state, not identity.
        self.action == other.action
            && self.file_path == other.file_path
            && self.line == other.line
            && self.column == other.column
            && self.source == other.source
            && self.is_active == other.is_active
            && self.timestamp == other.timestamp
            && self.opened_files == other.opened_files
            && self.selection_start_line == other.selection_start_line
            && self.selection_start_column == other.selection_start_column
            && self.selection_end_line == other.selection_end_line
            && self.selection_end_column == other.selection_end_column
    }
}

impl EditorState {
    /// A plain event with no selection and no file set, stamped now.
    pub fn new(
        action: SyncAction,
        file_path: impl Into<String>,
        caret: Caret,
        source: IdeFamily,
        is_active: bool,
    ) -> Self {
        Self {
            action,
            file_path: file_path.into(),
            line: caret.line,
            column: caret.column,
            source,
            is_active,
            timestamp: time::now_timestamp(),
            opened_files: None,
            selection_start_line: None,
            selection_start_column: None,
            selection_end_line: None,
            selection_end_column: None,
            normalized: OnceLock::new(),
        }
    }

    /// Attach a selection. Empty selections are ignored (all four fields
    /// stay absent), keeping the all-or-none wire invariant.
    pub fn with_selection(mut self, selection: Option<Selection>) -> Self {
        match selection {
            Some(sel) if !sel.is_empty() => {
                self.selection_start_line = Some(sel.start.line);
                self.selection_start_column = Some(sel.start.column);
                self.selection_end_line = Some(sel.end.line);
                self.selection_end_column = Some(sel.end.column);
            }
            _ => {
                self.selection_start_line = None;
                self.selection_start_column = None;
                self.selection_end_line = None;
                self.selection_end_column = None;
            }
        }
        self
    }

    /// Attach the ordered opened-file set of a workspace sync.
    pub fn with_opened_files(mut self, files: Vec<String>) -> Self {
        self.opened_files = Some(files);
        self
    }

    pub fn caret(&self) -> Caret {
        Caret::new(self.line, self.column)
    }

    /// The selection, iff all four coordinates are present.
    pub fn selection(&self) -> Option<Selection> {
        match (
            self.selection_start_line,
            self.selection_start_column,
            self.selection_end_line,
            self.selection_end_column,
        ) {
            (Some(sl), Some(sc), Some(el), Some(ec)) => {
                Some(Selection::ordered(Caret::new(sl, sc), Caret::new(el, ec)))
            }
            _ => None,
        }
    }

    /// The view a receiver should apply: caret snapped to the nearer
    /// selection endpoint when a selection exists.
    pub fn view(&self) -> (Caret, Option<Selection>) {
        match self.selection() {
            Some(sel) => (sel.nearest_endpoint(self.caret()), Some(sel)),
            None => (self.caret(), None),
        }
    }

    /// Payload timestamp as epoch milliseconds, if parseable.
    pub fn timestamp_ms(&self) -> Option<i64> {
        time::parse_timestamp(&self.timestamp)
    }

    /// `file_path` normalized for the local platform style, cached.
    pub fn normalized_path(&self, style: PathStyle) -> &str {
        self.normalized
            .get_or_init(|| paths::normalize_incoming(&self.file_path, style))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(action: SyncAction) -> EditorState {
        EditorState::new(action, "/home/u/proj/a.rs", Caret::new(4, 7), IdeFamily::A, true)
    }

    // ==================== Caret / Selection ====================

    #[test]
    fn test_caret_document_order() {
        assert!(Caret::new(1, 9) < Caret::new(2, 0));
        assert!(Caret::new(2, 3) < Caret::new(2, 4));
        assert_eq!(Caret::new(2, 3), Caret::new(2, 3));
    }

    #[test]
    fn test_caret_display_one_based() {
        assert_eq!(Caret::new(0, 0).display(), "1:1");
        assert_eq!(Caret::new(9, 4).display(), "10:5");
    }

    #[test]
    fn test_selection_ordered_swaps() {
        let sel = Selection::ordered(Caret::new(5, 0), Caret::new(2, 3));
        assert_eq!(sel.start, Caret::new(2, 3));
        assert_eq!(sel.end, Caret::new(5, 0));
    }

    #[test]
    fn test_nearest_endpoint_preserves_direction() {
        let sel = Selection::ordered(Caret::new(2, 0), Caret::new(8, 0));
        // Upward selection: caret at start.
        assert_eq!(sel.nearest_endpoint(Caret::new(2, 0)), sel.start);
        // Downward selection: caret at end.
        assert_eq!(sel.nearest_endpoint(Caret::new(8, 0)), sel.end);
        // Outside either way clamps.
        assert_eq!(sel.nearest_endpoint(Caret::new(0, 0)), sel.start);
        assert_eq!(sel.nearest_endpoint(Caret::new(9, 9)), sel.end);
    }

    // ==================== Wire shape ====================

    #[test]
    fn test_action_wire_names() {
        assert_eq!(serde_json::to_string(&SyncAction::Open).unwrap(), "\"OPEN\"");
        assert_eq!(
            serde_json::to_string(&SyncAction::WorkspaceSync).unwrap(),
            "\"WORKSPACE_SYNC\""
        );
    }

    #[test]
    fn test_camel_case_fields() {
        let json = serde_json::to_string(&state(SyncAction::Open)).unwrap();
        assert!(json.contains("\"filePath\""));
        assert!(json.contains("\"isActive\":true"));
        assert!(json.contains("\"source\":\"A\""));
        assert!(json.contains("\"action\":\"OPEN\""));
    }

    #[test]
    fn test_selection_absent_not_serialized() {
        let json = serde_json::to_string(&state(SyncAction::Navigate)).unwrap();
        assert!(!json.contains("selectionStartLine"));
        assert!(!json.contains("openedFiles"));
    }

    #[test]
    fn test_selection_all_four_on_wire() {
        let s = state(SyncAction::Navigate)
            .with_selection(Some(Selection::ordered(Caret::new(1, 2), Caret::new(3, 4))));
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"selectionStartLine\":1"));
        assert!(json.contains("\"selectionStartColumn\":2"));
        assert!(json.contains("\"selectionEndLine\":3"));
        assert!(json.contains("\"selectionEndColumn\":4"));
    }

    #[test]
    fn test_empty_selection_stays_absent() {
        let s = state(SyncAction::Navigate)
            .with_selection(Some(Selection::ordered(Caret::new(3, 4), Caret::new(3, 4))));
        assert!(s.selection().is_none());
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("selectionStartLine"));
    }

    #[test]
    fn test_roundtrip_preserves_absence() {
        let s = state(SyncAction::Open);
        let json = serde_json::to_string(&s).unwrap();
        let back: EditorState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert!(back.selection().is_none());
        assert!(back.opened_files.is_none());
    }

    #[test]
    fn test_roundtrip_with_everything() {
        let s = state(SyncAction::WorkspaceSync)
            .with_selection(Some(Selection::ordered(Caret::new(1, 0), Caret::new(4, 2))))
            .with_opened_files(vec!["/a".into(), "/b".into()]);
        let json = serde_json::to_string(&s).unwrap();
        let back: EditorState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.opened_files.as_deref(), Some(&["/a".to_string(), "/b".to_string()][..]));
    }

    // ==================== View resolution ====================

    #[test]
    fn test_view_without_selection() {
        let s = state(SyncAction::Navigate);
        let (caret, sel) = s.view();
        assert_eq!(caret, Caret::new(4, 7));
        assert!(sel.is_none());
    }

    #[test]
    fn test_view_snaps_caret_to_endpoint() {
        let s = EditorState::new(
            SyncAction::Navigate,
            "/f",
            Caret::new(1, 0),
            IdeFamily::B,
            true,
        )
        .with_selection(Some(Selection::ordered(Caret::new(1, 0), Caret::new(6, 0))));
        let (caret, sel) = s.view();
        assert_eq!(caret, sel.unwrap().start);
    }

    // ==================== Families ====================

    #[test]
    fn test_family_roles() {
        assert_eq!(IdeFamily::A.default_role(), Role::Listener);
        assert_eq!(IdeFamily::B.default_role(), Role::Scanner);
    }

    #[test]
    fn test_family_wire_tag() {
        assert_eq!(serde_json::to_string(&IdeFamily::B).unwrap(), "\"B\"");
    }
}
