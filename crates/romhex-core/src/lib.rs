#![warn(missing_docs)]
//! romhex-core - Headless ROM Hex-Editing Engine
//!
//! # Overview
//!
//! `romhex-core` is the data-editing kernel of a hex editor for cartridge ROM images. It maps
//! a byte buffer onto a scrolling grid of cells, interprets bytes through anchored formats
//! (pointers, strings, tables, enumerated integers), and turns keystrokes into structured,
//! undoable writes. It does no rendering and no file I/O: the host supplies both.
//!
//! # Core Features
//!
//! - **Address/View Mapping**: a window of `width × height` cells over the buffer, with
//!   negative offsets and single-table scrolling
//! - **Structured Edits**: pointers, anchors, strings, integers and enumerations typed in place
//! - **Relocation**: strings that outgrow their space move to free space and repoint their
//!   sources
//! - **Undo/Redo**: change tokens grouped by typing session, with a save point that knows
//!   whether bytes or only metadata changed
//! - **Navigation**: goto by name or address, back/forward history, following pointers
//! - **State Tracking**: versioned change notifications and state snapshots
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Command Interface & State Notifications    │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Editor (edit protocol, cell grid)          │  ← Interaction
//! ├─────────────────────────────────────────────┤
//! │  Selection & Navigation History             │  ← Caret
//! ├─────────────────────────────────────────────┤
//! │  Address Space (scroll window, headers)     │  ← Layout
//! ├─────────────────────────────────────────────┤
//! │  Change History (ModelDelta tokens)         │  ← Undo
//! ├─────────────────────────────────────────────┤
//! │  Model (bytes, runs, anchors)               │  ← Storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Typing into the buffer
//!
//! ```rust
//! use romhex_core::{Editor, MemoryModel, Model};
//!
//! let mut editor = Editor::new("rom.gba", MemoryModel::new(vec![0xFF; 0x100]));
//!
//! // name address 0x40, then point at it from 0x10
//! editor.goto("40").unwrap();
//! editor.edit_str("^items ");
//! editor.goto("10").unwrap();
//! editor.edit_str("<items>");
//!
//! // a jump puts its target in the top-left cell
//! assert_eq!(editor.model().read_pointer(0x10), Some(0x40));
//! assert_eq!(editor.cell(0, 0).text(), "<items>");
//! assert!(!editor.is_saved());
//! ```
//!
//! ## Using the command interface
//!
//! ```rust
//! use romhex_core::{Command, EditCommand, Editor, MemoryModel, Model};
//!
//! let mut editor = Editor::new("rom.gba", MemoryModel::new(vec![0x00; 0x40]));
//! editor.execute(Command::Edit(EditCommand::Type { text: "7F".to_string() })).unwrap();
//! editor.execute(Command::Edit(EditCommand::MarkSaved)).unwrap();
//!
//! assert_eq!(editor.model().byte(0), 0x7F);
//! assert!(editor.is_saved());
//! ```
//!
//! # Module Description
//!
//! - [`model`] - The model trait, runs and table layouts
//! - [`memory_model`] - In-memory model with metadata import/export
//! - [`delta`] - Reversible change records
//! - [`history`] - Undo/redo stacks and the save point
//! - [`address_space`] - Scroll window and address/view mapping
//! - [`selection`] - Selection, goto and back/forward
//! - [`format`] - Per-byte interpretations
//! - [`anchor`] - Anchor declaration grammar
//! - [`edit`] - Keystroke acceptance and completion rules
//! - [`editor`] - The editing session
//! - [`commands`] - Unified command interface
//! - [`state`] - State snapshots and notifications

pub mod address_space;
pub mod anchor;
pub mod commands;
pub mod config;
pub mod delta;
pub mod edit;
pub mod editor;
pub mod error;
pub mod format;
pub mod history;
pub mod host;
pub mod memory_model;
pub mod model;
pub mod selection;
pub mod snapshot;
pub mod state;

pub use address_space::{AddressSpace, Direction, HeaderLookup, ViewPoint};
pub use anchor::{AnchorDeclaration, FormatDeclaration, parse_declaration};
pub use commands::{Command, CommandResult, EditCommand, SelectionCommand, ViewCommand};
pub use config::EditorOptions;
pub use delta::ModelDelta;
pub use edit::EditKind;
pub use editor::{EditKey, Editor};
pub use error::{
    AnchorError, CommandError, EditError, EditorError, MetadataError, NavigationError,
};
pub use format::{
    AnchorFormat, Format, IntegerFormat, PcsByte, PcsFormat, PointerFormat, StreamFormat,
    UnderEdit,
};
pub use history::{ChangeHistory, ChangeToken};
pub use host::{DeferredWork, FileSource, QueueScheduler, ToolNotifier, WorkScheduler};
pub use memory_model::MemoryModel;
pub use model::{Model, Run, RunKind, Segment, SegmentKind, TableRun};
pub use selection::{JumpInfo, Selection, SelectionChange, coerce_width};
pub use snapshot::{Cell, CellGrid};
pub use state::{
    EditorState, ErrorCallback, HistoryState, SelectionState, StateChange, StateChangeCallback,
    StateChangeType, ViewportState,
};
pub use romhex_text::CharacterTable;
