//! Editor state snapshots and change notifications.
//!
//! # Overview
//!
//! Frontends read state through [`EditorState`] snapshots and learn about changes through
//! subscriptions. Every notification carries the state version before and after, so a
//! frontend that missed some can tell.
//!
//! # Example
//!
//! ```rust
//! use romhex_core::{Editor, MemoryModel, StateChangeType};
//! use std::sync::{Arc, Mutex};
//!
//! let mut editor = Editor::new("rom.gba", MemoryModel::new(vec![0xFF; 0x100]));
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! editor.subscribe(move |change| sink.lock().unwrap().push(change.change_type));
//!
//! editor.edit_str("12");
//! assert!(seen.lock().unwrap().contains(&StateChangeType::SaveStateChanged));
//! assert_eq!(editor.get_state().history.undo_depth, 0); // still open
//! ```

use crate::address_space::ViewPoint;
use crate::error::EditorError;

/// Kinds of change a subscriber can be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChangeType {
    /// Every cell may have changed (scroll, resize, data change, undo).
    Redraw,
    /// The selection moved.
    SelectionChanged,
    /// The saved/unsaved state flipped.
    SaveStateChanged,
    /// Back or forward availability flipped.
    NavigationChanged,
    /// Any open menu should close.
    MenuClose,
}

/// A change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// What changed.
    pub change_type: StateChangeType,
    /// Version before the change.
    pub old_version: u64,
    /// Version after the change.
    pub new_version: u64,
}

impl StateChange {
    /// Create a change record.
    pub fn new(change_type: StateChangeType, old_version: u64, new_version: u64) -> Self {
        Self {
            change_type,
            old_version,
            new_version,
        }
    }
}

/// Subscriber for [`StateChange`]s.
pub type StateChangeCallback = Box<dyn FnMut(&StateChange) + Send>;

/// Subscriber for recoverable errors.
pub type ErrorCallback = Box<dyn FnMut(&EditorError) + Send>;

/// Window state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportState {
    /// Columns.
    pub width: usize,
    /// Rows.
    pub height: usize,
    /// Address in the top-left cell.
    pub data_index: isize,
    /// Scroll position in rows.
    pub scroll_value: isize,
    /// Lowest scroll position.
    pub minimum_scroll: isize,
    /// Highest scroll position.
    pub maximum_scroll: isize,
    /// Scrolling is confined to one table.
    pub single_table_mode: bool,
}

/// Selection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    /// Start view point.
    pub start: ViewPoint,
    /// End view point.
    pub end: ViewPoint,
    /// Start address.
    pub start_address: isize,
    /// End address.
    pub end_address: isize,
    /// Back is available.
    pub can_back: bool,
    /// Forward is available.
    pub can_forward: bool,
}

/// Undo/redo and save state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryState {
    /// Undo is available.
    pub can_undo: bool,
    /// Redo is available.
    pub can_redo: bool,
    /// Sealed undo steps.
    pub undo_depth: usize,
    /// Redo steps.
    pub redo_depth: usize,
    /// The current state is the saved one.
    pub is_saved: bool,
    /// Some byte differs from the saved state.
    pub has_data_change: bool,
}

/// Complete editor state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    /// File name, with `*` while unsaved.
    pub name: String,
    /// Buffer length.
    pub data_length: usize,
    /// Window.
    pub viewport: ViewportState,
    /// Selection.
    pub selection: SelectionState,
    /// History.
    pub history: HistoryState,
    /// Row labels.
    pub headers: Vec<String>,
    /// State version.
    pub version: u64,
}
