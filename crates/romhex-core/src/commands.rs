//! Command interface.
//!
//! # Overview
//!
//! Frontends that prefer a single entry point can drive an [`Editor`] with [`Command`]
//! values instead of calling its methods directly. Commands fall into three groups:
//!
//! - **Editing**: typing, editing keys, undo/redo, clearing, saving
//! - **Selection**: caret placement, goto, back/forward, following pointers
//! - **View**: window size, scrolling, table mode
//!
//! Failures come back as [`CommandError`]. Edit and navigation failures are also reported
//! through the editor's error callback, as they are for direct calls.
//!
//! # Example
//!
//! ```rust
//! use romhex_core::{Command, EditCommand, Editor, MemoryModel, Model, SelectionCommand};
//!
//! let mut editor = Editor::new("rom.gba", MemoryModel::new(vec![0xFF; 0x100]));
//!
//! editor
//!     .execute_batch(vec![
//!         Command::Selection(SelectionCommand::Goto { target: "20".to_string() }),
//!         Command::Edit(EditCommand::Type { text: "C0DE".to_string() }),
//!     ])
//!     .unwrap();
//! assert_eq!(&editor.model().data()[0x20..0x22], &[0xC0, 0xDE]);
//!
//! editor.execute(Command::Edit(EditCommand::Undo)).unwrap();
//! assert_eq!(editor.model().byte(0x20), 0xFF);
//! ```

use crate::address_space::{Direction, ViewPoint};
use crate::editor::{EditKey, Editor};
use crate::error::CommandError;
use crate::model::Model;
use crate::snapshot::Cell;

/// Editing commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    /// Type each character of `text` at the selection.
    Type {
        /// Characters to type.
        text: String,
    },
    /// Press an editing key.
    Key(EditKey),
    /// Undo the most recent step.
    Undo,
    /// Redo the most recently undone step.
    Redo,
    /// Close the current undo step.
    EndUndoGroup,
    /// Reset the selected bytes and drop their formats.
    ClearSelection,
    /// Record the current state as saved.
    MarkSaved,
}

/// Selection and navigation commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCommand {
    /// Collapse the selection onto a cell.
    SetStart {
        /// Column.
        col: isize,
        /// Row.
        row: isize,
    },
    /// Extend the selection to a cell.
    SetEnd {
        /// Column.
        col: isize,
        /// Row.
        row: isize,
    },
    /// Move the caret one step.
    MoveStart(Direction),
    /// Extend the selection one step.
    MoveEnd(Direction),
    /// Jump to an anchor name or hex address.
    Goto {
        /// Anchor name or hex address.
        target: String,
    },
    /// Return to the location before the last jump.
    Back,
    /// Undo a [`Back`](Self::Back).
    Forward,
    /// Jump to the destination of the pointer in a cell.
    FollowLink {
        /// Column.
        col: isize,
        /// Row.
        row: isize,
    },
    /// List the pointers that refer to the anchor in a cell.
    FindSources {
        /// Column.
        col: isize,
        /// Row.
        row: isize,
    },
}

/// Window commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    /// Set the number of columns.
    SetWidth(usize),
    /// Set the number of rows.
    SetHeight(usize),
    /// Fit the row width to the available columns.
    ChangeWidth {
        /// Columns that fit on screen.
        available: usize,
    },
    /// Scroll to a row.
    SetScrollValue(isize),
    /// Scroll one step.
    Scroll(Direction),
    /// Confine scrolling to the table containing the selection.
    EnterTableMode,
    /// Return to scrolling over the whole buffer.
    ClearTableMode,
    /// Read one visible cell.
    GetCell {
        /// Column.
        col: isize,
        /// Row.
        row: isize,
    },
}

/// All commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Editing.
    Edit(EditCommand),
    /// Selection and navigation.
    Selection(SelectionCommand),
    /// Window.
    View(ViewCommand),
}

/// Command results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Success, no return value.
    Success,
    /// Pointer sources of an anchor.
    Sources(Vec<usize>),
    /// A visible cell.
    Cell(Cell),
    /// Whether table mode is now active.
    TableMode(bool),
}

impl<M: Model> Editor<M> {
    /// Execute one command.
    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        match command {
            Command::Edit(edit) => self.execute_edit(edit),
            Command::Selection(selection) => self.execute_selection(selection),
            Command::View(view) => self.execute_view(view),
        }
    }

    /// Execute commands in order, stopping at the first failure.
    pub fn execute_batch(
        &mut self,
        commands: Vec<Command>,
    ) -> Result<Vec<CommandResult>, CommandError> {
        let mut results = Vec::new();

        for command in commands {
            let result = self.execute(command)?;
            results.push(result);
        }

        Ok(results)
    }

    fn execute_edit(&mut self, command: EditCommand) -> Result<CommandResult, CommandError> {
        match command {
            EditCommand::Type { text } => self.edit_str(&text),
            EditCommand::Key(key) => self.key(key),
            EditCommand::Undo => {
                if !self.undo() {
                    return Err(CommandError::NothingToUndo);
                }
            }
            EditCommand::Redo => {
                if !self.redo() {
                    return Err(CommandError::NothingToRedo);
                }
            }
            EditCommand::EndUndoGroup => self.end_undo_group(),
            EditCommand::ClearSelection => self.clear_selection(),
            EditCommand::MarkSaved => self.mark_saved(),
        }
        Ok(CommandResult::Success)
    }

    fn execute_selection(&mut self, command: SelectionCommand) -> Result<CommandResult, CommandError> {
        match command {
            SelectionCommand::SetStart { col, row } => {
                let point = self.visible_point(col, row)?;
                self.set_selection_start(point);
            }
            SelectionCommand::SetEnd { col, row } => {
                let point = self.visible_point(col, row)?;
                self.set_selection_end(point);
            }
            SelectionCommand::MoveStart(direction) => self.move_selection_start(direction),
            SelectionCommand::MoveEnd(direction) => self.move_selection_end(direction),
            SelectionCommand::Goto { target } => self
                .goto(&target)
                .map_err(|error| CommandError::Other(error.to_string()))?,
            SelectionCommand::Back => {
                if !self.back() {
                    return Err(CommandError::NothingToGoBack);
                }
            }
            SelectionCommand::Forward => {
                if !self.forward() {
                    return Err(CommandError::NothingToGoForward);
                }
            }
            SelectionCommand::FollowLink { col, row } => {
                self.visible_point(col, row)?;
                self.follow_link(col, row)
                    .map_err(|error| CommandError::Other(error.to_string()))?;
            }
            SelectionCommand::FindSources { col, row } => {
                self.visible_point(col, row)?;
                return Ok(CommandResult::Sources(self.find_all_sources(col, row)));
            }
        }
        Ok(CommandResult::Success)
    }

    fn execute_view(&mut self, command: ViewCommand) -> Result<CommandResult, CommandError> {
        match command {
            ViewCommand::SetWidth(width) => self.set_width(width),
            ViewCommand::SetHeight(height) => self.set_height(height),
            ViewCommand::ChangeWidth { available } => self.change_width(available),
            ViewCommand::SetScrollValue(value) => self.set_scroll_value(value),
            ViewCommand::Scroll(direction) => self.scroll(direction),
            ViewCommand::EnterTableMode => {
                return Ok(CommandResult::TableMode(self.enter_table_mode()));
            }
            ViewCommand::ClearTableMode => self.clear_table_mode(),
            ViewCommand::GetCell { col, row } => {
                self.visible_point(col, row)?;
                return Ok(CommandResult::Cell(self.cell(col, row).clone()));
            }
        }
        Ok(CommandResult::Success)
    }

    fn visible_point(&self, col: isize, row: isize) -> Result<ViewPoint, CommandError> {
        let inside = (0..self.width() as isize).contains(&col) && (0..self.height() as isize).contains(&row);
        if inside {
            Ok(ViewPoint::new(col, row))
        } else {
            Err(CommandError::InvalidCell { col, row })
        }
    }
}
