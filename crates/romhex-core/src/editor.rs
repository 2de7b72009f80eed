//! The editor: a window of formatted cells over a [`Model`], with typing, navigation and
//! undo.
//!
//! # Overview
//!
//! [`Editor`] ties together a [`Selection`] (which owns the scroll window), a
//! [`ChangeHistory`] of [`ModelDelta`]s and a [`CellGrid`] holding the visible cells. Every
//! visible cell is re-read from the model whenever the window moves or the data changes.
//!
//! Typing is handled one character at a time. The first accepted character turns the cell
//! into an [`UnderEdit`] cell; further characters accumulate until the edit is complete, at
//! which point the bytes are written through the open change token and the caret moves past
//! the field. Invalid completed edits are reported through [`Editor::on_error`] and leave the
//! data untouched.
//!
//! Consecutive typed edits share one undo step. Moving the selection by hand (the selection
//! setters, goto, back, forward) closes the step.
//!
//! # Example
//!
//! ```rust
//! use romhex_core::{Editor, MemoryModel, Model};
//!
//! let mut editor = Editor::new("rom.gba", MemoryModel::new(vec![0xFF; 0x100]));
//! editor.edit_str("^target ");
//! editor.goto("10").unwrap();
//! editor.edit_str("<target>");
//!
//! assert_eq!(editor.model().read_pointer(0x10), Some(0));
//! assert_eq!(editor.selection_start_address(), 0x14);
//!
//! editor.undo();
//! assert_eq!(editor.model().read_pointer(0x10), None);
//! ```

use crate::address_space::{AddressSpace, Direction, HeaderLookup, ViewPoint};
use crate::anchor::split_declaration;
use crate::config::EditorOptions;
use crate::delta::ModelDelta;
use crate::edit::{self, EditKind};
use crate::error::{EditError, EditorError, NavigationError};
use crate::format::{AnchorFormat, Format, IntegerFormat, UnderEdit};
use crate::history::ChangeHistory;
use crate::host::{DeferredWork, FileSource, ToolNotifier, WorkScheduler};
use crate::memory_model::MemoryModel;
use crate::model::{Model, NULL_NAME, POINTER_SIZE, Run, RunKind, SegmentKind, TableLocation, TableRun};
use crate::selection::{JumpInfo, Selection, SelectionChange};
use crate::snapshot::{Cell, CellGrid};
use crate::state::{
    EditorState, ErrorCallback, HistoryState, SelectionState, StateChange, StateChangeCallback,
    StateChangeType, ViewportState,
};
use romhex_text::{DELIMITER, END_OF_STRING, ESCAPE};

/// Byte that pads a table text field after its terminator.
pub const TABLE_FILL: u8 = 0x00;

/// Keys with an editing meaning of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKey {
    /// Remove the last typed character, or step back into the previous byte.
    Backspace,
    /// Abandon the open edit and close menus.
    Escape,
    /// Finish a whitespace-terminated edit, or end a table text field.
    Enter,
    /// Move to the next field of a table.
    Tab,
}

/// What the editor looked like before an operation, for change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observed {
    saved: bool,
    can_back: bool,
    can_forward: bool,
    start: isize,
    end: isize,
}

/// Interactive editing session over a model.
pub struct Editor<M: Model = MemoryModel> {
    name: String,
    model: M,
    selection: Selection,
    history: ChangeHistory<ModelDelta>,
    cells: CellGrid,
    options: EditorOptions,
    callbacks: Vec<StateChangeCallback>,
    error_callbacks: Vec<ErrorCallback>,
    notifier: Option<Box<dyn ToolNotifier>>,
    scheduler: Option<Box<dyn WorkScheduler>>,
    file_source: Option<Box<dyn FileSource>>,
    version: u64,
}

impl<M: Model> Editor<M> {
    /// Open `model` under the file name `name` with default options.
    pub fn new(name: impl Into<String>, model: M) -> Self {
        Self::with_options(name, model, EditorOptions::default())
    }

    /// Open `model` with explicit options.
    pub fn with_options(name: impl Into<String>, model: M, options: EditorOptions) -> Self {
        let mut space = AddressSpace::new(model.len());
        space.set_allow_single_table_mode(options.allow_single_table_mode);
        space.set_use_custom_headers(options.use_custom_headers);
        space.set_width(options.width);
        space.set_height(options.height);
        let mut selection = Selection::new(space);
        selection.set_preferred_width(options.preferred_width);

        let mut editor = Self {
            name: name.into(),
            model,
            selection,
            history: ChangeHistory::with_capacity(options.max_history),
            cells: CellGrid::new(0, 0),
            options,
            callbacks: Vec::new(),
            error_callbacks: Vec::new(),
            notifier: None,
            scheduler: None,
            file_source: None,
            version: 0,
        };
        editor.rebuild_cells();
        editor
    }

    // ----- host wiring -----

    /// Subscribe to state change notifications.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&StateChange) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Subscribe to recoverable errors (invalid edits, unresolvable jumps).
    pub fn on_error<F>(&mut self, callback: F)
    where
        F: FnMut(&EditorError) + Send + 'static,
    {
        self.error_callbacks.push(Box::new(callback));
    }

    /// Receive coarse data-changed notifications, batched around [`edit_str`](Self::edit_str).
    pub fn set_notifier(&mut self, notifier: Box<dyn ToolNotifier>) {
        self.notifier = Some(notifier);
    }

    /// Route slow work through `scheduler`. Header updates and reload retries are scheduled
    /// instead of run inline, and come back through [`run_deferred`](Self::run_deferred).
    pub fn set_scheduler<S>(&mut self, scheduler: S)
    where
        S: WorkScheduler + Clone + 'static,
    {
        self.selection
            .scroll_mut()
            .set_scheduler(Box::new(scheduler.clone()));
        self.scheduler = Some(Box::new(scheduler));
    }

    /// Where scheduled reloads read the file from.
    pub fn set_file_source(&mut self, source: Box<dyn FileSource>) {
        self.file_source = Some(source);
    }

    /// Install the lookup used for custom row headers.
    pub fn set_header_lookup(&mut self, lookup: HeaderLookup) {
        self.selection.scroll_mut().set_header_lookup(lookup);
    }

    /// Switch row headers between custom labels and addresses.
    pub fn set_use_custom_headers(&mut self, value: bool) {
        self.options.use_custom_headers = value;
        self.selection.scroll_mut().set_use_custom_headers(value);
    }

    /// Run work previously handed to the scheduler.
    pub fn run_deferred(&mut self, work: DeferredWork) -> Result<(), EditorError> {
        match work {
            DeferredWork::UpdateHeaders => {
                self.selection.scroll_mut().update_headers();
                Ok(())
            }
            DeferredWork::ConsiderReload => {
                let Some(mut source) = self.file_source.take() else {
                    return Ok(());
                };
                let result = self.consider_reload(source.as_mut());
                self.file_source = Some(source);
                result.map(|_| ())
            }
        }
    }

    // ----- queries -----

    /// The model being edited.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The selection and the scroll window it owns.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Options the editor was opened with, updated by later width and header changes.
    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    /// The visible cell at `(col, row)`. Outside the window this is an undefined cell.
    pub fn cell(&self, col: isize, row: isize) -> &Cell {
        self.cells.get(col, row)
    }

    /// All visible cells.
    pub fn cells(&self) -> &CellGrid {
        &self.cells
    }

    /// Columns in the window.
    pub fn width(&self) -> usize {
        self.selection.scroll().width()
    }

    /// Rows in the window.
    pub fn height(&self) -> usize {
        self.selection.scroll().height()
    }

    /// Current scroll position in rows.
    pub fn scroll_value(&self) -> isize {
        self.selection.scroll().scroll_value()
    }

    /// Lowest scroll position.
    pub fn minimum_scroll(&self) -> isize {
        self.selection.scroll().minimum_scroll()
    }

    /// Highest scroll position.
    pub fn maximum_scroll(&self) -> isize {
        self.selection.scroll().maximum_scroll()
    }

    /// Row labels.
    pub fn headers(&self) -> &[String] {
        self.selection.scroll().headers()
    }

    /// Selection start in the window.
    pub fn selection_start(&self) -> ViewPoint {
        self.selection.start()
    }

    /// Selection end (caret) in the window.
    pub fn selection_end(&self) -> ViewPoint {
        self.selection.end()
    }

    /// Selection start address.
    pub fn selection_start_address(&self) -> isize {
        self.selection.start_address()
    }

    /// Returns `true` if `point` is selected.
    pub fn is_selected(&self, point: ViewPoint) -> bool {
        self.selection.is_selected(point)
    }

    /// File name, with `*` appended while there are unsaved changes.
    pub fn name(&self) -> String {
        if self.history.is_saved() {
            self.name.clone()
        } else {
            format!("{}*", self.name)
        }
    }

    /// Returns `true` if nothing changed since the last save.
    pub fn is_saved(&self) -> bool {
        self.history.is_saved()
    }

    /// Returns `true` if some byte differs from the saved state.
    pub fn has_data_change(&self) -> bool {
        self.history.has_data_change()
    }

    /// Returns `true` if the unsaved changes only touch names and formats.
    pub fn is_metadata_only_change(&self) -> bool {
        !self.history.is_saved() && !self.history.has_data_change()
    }

    /// Returns `true` if [`undo`](Self::undo) would do something.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns `true` if [`redo`](Self::redo) would do something.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Returns `true` if [`back`](Self::back) would do something.
    pub fn can_back(&self) -> bool {
        self.selection.can_back()
    }

    /// Returns `true` if [`forward`](Self::forward) would do something.
    pub fn can_forward(&self) -> bool {
        self.selection.can_forward()
    }

    /// State version, incremented by every notification.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Snapshot of the whole editor state.
    pub fn get_state(&self) -> EditorState {
        let space = self.selection.scroll();
        EditorState {
            name: self.name(),
            data_length: self.model.len(),
            viewport: ViewportState {
                width: space.width(),
                height: space.height(),
                data_index: space.data_index(),
                scroll_value: space.scroll_value(),
                minimum_scroll: space.minimum_scroll(),
                maximum_scroll: space.maximum_scroll(),
                single_table_mode: space.is_single_table_mode(),
            },
            selection: SelectionState {
                start: self.selection.start(),
                end: self.selection.end(),
                start_address: self.selection.start_address(),
                end_address: self.selection.end_address(),
                can_back: self.selection.can_back(),
                can_forward: self.selection.can_forward(),
            },
            history: HistoryState {
                can_undo: self.history.can_undo(),
                can_redo: self.history.can_redo(),
                undo_depth: self.history.undo_depth(),
                redo_depth: self.history.redo_depth(),
                is_saved: self.history.is_saved(),
                has_data_change: self.history.has_data_change(),
            },
            headers: space.headers().to_vec(),
            version: self.version,
        }
    }

    /// Pointers that refer to the anchor shown at `(col, row)`.
    pub fn find_all_sources(&self, col: isize, row: isize) -> Vec<usize> {
        match self.cells.get(col, row).format.committed() {
            Format::Anchor(anchor) => anchor.sources.clone(),
            _ => Vec::new(),
        }
    }

    // ----- window -----

    /// Set the number of columns.
    pub fn set_width(&mut self, width: usize) {
        let before = self.observe();
        if self.selection.scroll_mut().set_width(width) {
            self.refresh();
        }
        self.publish(before);
    }

    /// Set the number of rows.
    pub fn set_height(&mut self, height: usize) {
        let before = self.observe();
        if self.selection.scroll_mut().set_height(height) {
            self.refresh();
        }
        self.publish(before);
    }

    /// Set the row width used by [`change_width`](Self::change_width).
    pub fn set_preferred_width(&mut self, width: usize) {
        self.options.preferred_width = width;
        self.selection.set_preferred_width(width);
    }

    /// Fit the row width to `available` columns, keeping it a multiple or divisor of the
    /// preferred width.
    pub fn change_width(&mut self, available: usize) {
        let before = self.observe();
        if self.selection.change_width(available) {
            self.refresh();
        }
        self.publish(before);
    }

    /// Scroll to `value` rows.
    pub fn set_scroll_value(&mut self, value: isize) {
        let before = self.observe();
        if self.selection.scroll_mut().set_scroll_value(value) != 0 {
            self.refresh();
        }
        self.publish(before);
    }

    /// Scroll one step.
    pub fn scroll(&mut self, direction: Direction) {
        let before = self.observe();
        if self.selection.scroll_mut().scroll(direction) != 0 {
            self.refresh();
        }
        self.publish(before);
    }

    /// Confine scrolling to the table run containing the selection start.
    ///
    /// Returns `false` if the selection is not inside a table or table mode is not allowed.
    pub fn enter_table_mode(&mut self) -> bool {
        let start = self.selection.start_address();
        let Some((table_start, table, _)) = usize::try_from(start)
            .ok()
            .and_then(|address| self.table_location(address))
        else {
            return false;
        };
        self.set_table_mode(table_start, table.length());
        self.selection.scroll().is_single_table_mode()
    }

    /// Confine scrolling to `length` bytes at `start`.
    pub fn set_table_mode(&mut self, start: usize, length: usize) {
        let before = self.observe();
        let was_table = self.selection.scroll().is_single_table_mode();
        let shift = self.selection.scroll_mut().set_table_mode(start, length);
        if shift != 0 || was_table != self.selection.scroll().is_single_table_mode() {
            self.refresh();
        }
        self.publish(before);
    }

    /// Return to scrolling over the whole buffer.
    pub fn clear_table_mode(&mut self) {
        let before = self.observe();
        if self.selection.scroll().is_single_table_mode() {
            self.selection.scroll_mut().clear_table_mode();
            self.refresh();
        }
        self.publish(before);
    }

    // ----- selection and navigation -----

    /// Collapse the selection onto `point`. Closes the current undo step.
    pub fn set_selection_start(&mut self, point: ViewPoint) {
        let before = self.observe();
        self.leave_edit();
        let change = self.selection.set_start(point);
        self.manual_move(change);
        self.publish(before);
    }

    /// Extend the selection to `point`. Closes the current undo step.
    pub fn set_selection_end(&mut self, point: ViewPoint) {
        let before = self.observe();
        self.leave_edit();
        let change = self.selection.set_end(point);
        self.manual_move(change);
        self.publish(before);
    }

    /// Move the caret one step, collapsing the selection.
    pub fn move_selection_start(&mut self, direction: Direction) {
        let before = self.observe();
        self.leave_edit();
        let change = self.selection.move_start(direction);
        self.manual_move(change);
        self.publish(before);
    }

    /// Move the caret one step, extending the selection.
    pub fn move_selection_end(&mut self, direction: Direction) {
        let before = self.observe();
        self.leave_edit();
        let change = self.selection.move_end(direction);
        self.manual_move(change);
        self.publish(before);
    }

    /// Jump to an anchor name or hex address.
    ///
    /// Failures are also reported through [`on_error`](Self::on_error).
    pub fn goto(&mut self, target: &str) -> Result<(), NavigationError> {
        let before = self.observe();
        self.leave_edit();
        let result = self.jump_to_target(target);
        self.publish(before);
        result
    }

    /// Return to the location before the last jump. Returns `false` if there is none.
    pub fn back(&mut self) -> bool {
        let before = self.observe();
        self.leave_edit();
        self.history.change_completed();
        let moved = match self.selection.back() {
            Some(change) => {
                self.apply_jump(change);
                true
            }
            None => false,
        };
        self.publish(before);
        moved
    }

    /// Redo the last jump undone by [`back`](Self::back). Returns `false` if there is none.
    pub fn forward(&mut self) -> bool {
        let before = self.observe();
        self.leave_edit();
        self.history.change_completed();
        let moved = match self.selection.forward() {
            Some(change) => {
                self.apply_jump(change);
                true
            }
            None => false,
        };
        self.publish(before);
        moved
    }

    /// Jump to the destination of the pointer shown at `(col, row)`.
    ///
    /// Cells that are not pointers are ignored. Null pointers and pointers waiting for a name
    /// are reported as errors.
    pub fn follow_link(&mut self, col: isize, row: isize) -> Result<(), NavigationError> {
        let Format::Pointer(pointer) = self.cells.get(col, row).format.committed().unwrap_anchor().clone()
        else {
            return Ok(());
        };
        let Some(destination) = pointer.destination else {
            let name = pointer.name.unwrap_or_else(|| NULL_NAME.to_string());
            let error = NavigationError::UnresolvedTarget(name);
            self.report(error.clone().into());
            return Err(error);
        };
        let before = self.observe();
        self.leave_edit();
        self.history.change_completed();
        let change = self.selection.jump_to(JumpInfo {
            view_start: destination as isize,
            selection_start: destination as isize,
        });
        self.apply_jump(change);
        self.publish(before);
        Ok(())
    }

    // ----- editing -----

    /// Type one character at the selection.
    pub fn edit(&mut self, input: char) {
        let before = self.observe();
        self.edit_char(input);
        self.publish(before);
    }

    /// Type every character of `text` in order.
    pub fn edit_str(&mut self, text: &str) {
        let before = self.observe();
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.begin_deferral();
        }
        for input in text.chars() {
            self.edit_char(input);
        }
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.end_deferral();
        }
        self.publish(before);
    }

    /// Handle an editing key.
    pub fn key(&mut self, key: EditKey) {
        let before = self.observe();
        match key {
            EditKey::Backspace => self.backspace(),
            EditKey::Escape => {
                let address = self.edit_address();
                self.discard_edit(address);
                self.notify(StateChangeType::MenuClose);
            }
            EditKey::Enter => self.enter(),
            EditKey::Tab => self.tab(),
        }
        self.publish(before);
    }

    /// Reset every selected byte to its empty value and drop the formats in the selection,
    /// as one undo step.
    pub fn clear_selection(&mut self) {
        let before = self.observe();
        let address = self.edit_address();
        self.discard_edit(address);

        let (low, high) = self.selection.range();
        let low = low.max(0) as usize;
        let high = high.min(self.model.len() as isize - 1);
        if high >= low as isize {
            let high = high as usize;
            let formats: Vec<(usize, Format)> =
                (low..=high).map(|address| (address, self.model.format_at(address))).collect();
            self.history.change_completed();
            let delta = self.history.current_change();
            self.model.clear_format(delta, low, high + 1 - low);
            for (address, format) in formats {
                format.clear_data(&mut self.model, delta, address);
            }
            self.history.change_completed();
            tracing::debug!(low, high, "cleared selection");
            self.sync_length();
            self.refresh();
            self.data_changed(low);
        }
        self.publish(before);
    }

    /// Undo the most recent step. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let before = self.observe();
        let address = self.edit_address();
        self.discard_edit(address);
        let mut earliest = None;
        let model = &mut self.model;
        let undone = self.history.undo(|delta| {
            earliest = delta.earliest_change();
            delta.revert(model)
        });
        if undone {
            tracing::debug!(?earliest, "undo");
            self.after_revert(earliest);
        }
        self.publish(before);
        undone
    }

    /// Redo the most recently undone step. Returns `false` if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        let before = self.observe();
        let address = self.edit_address();
        self.discard_edit(address);
        let mut earliest = None;
        let model = &mut self.model;
        let redone = self.history.redo(|delta| {
            earliest = delta.earliest_change();
            delta.revert(model)
        });
        if redone {
            tracing::debug!(?earliest, "redo");
            self.after_revert(earliest);
        }
        self.publish(before);
        redone
    }

    /// Close the current undo step so the next edit starts a new one.
    pub fn end_undo_group(&mut self) {
        self.history.change_completed();
    }

    /// Record the current state as saved.
    pub fn mark_saved(&mut self) {
        let before = self.observe();
        self.history.tag_as_saved();
        self.publish(before);
    }

    /// Reload the file from `source` if there are no unsaved changes.
    ///
    /// Returns `Ok(true)` if new contents were loaded. Metadata supplied by the source replaces
    /// the current metadata, otherwise the current metadata is kept. A load that fails with an
    /// I/O error is retried later through the scheduler when one is installed.
    pub fn consider_reload(&mut self, source: &mut dyn FileSource) -> Result<bool, EditorError> {
        if !self.history.is_saved() {
            tracing::warn!(name = %self.name, "reload refused: unsaved changes");
            return Err(EditorError::UnsavedChanges);
        }
        let loaded = source.load(&self.name).and_then(|data| match data {
            Some(data) => Ok(Some((data, source.metadata(&self.name)?))),
            None => Ok(None),
        });
        match loaded {
            Ok(None) => Ok(false),
            Ok(Some((data, metadata))) => {
                let before = self.observe();
                self.model.load(data, metadata.as_deref())?;
                self.history = ChangeHistory::with_capacity(self.options.max_history);
                self.sync_length();
                // a shorter file may leave the selection past the end
                self.selection.select_address(self.selection.start_address());
                self.refresh();
                self.data_changed(0);
                tracing::debug!(name = %self.name, length = self.model.len(), "reloaded");
                self.publish(before);
                Ok(true)
            }
            Err(error) => match self.scheduler.as_mut() {
                Some(scheduler) => {
                    tracing::warn!(%error, "reload failed, retrying later");
                    scheduler.schedule(DeferredWork::ConsiderReload);
                    Ok(false)
                }
                None => Err(error.into()),
            },
        }
    }

    // ----- notifications -----

    fn observe(&self) -> Observed {
        Observed {
            saved: self.history.is_saved(),
            can_back: self.selection.can_back(),
            can_forward: self.selection.can_forward(),
            start: self.selection.start_address(),
            end: self.selection.end_address(),
        }
    }

    fn publish(&mut self, before: Observed) {
        let after = self.observe();
        if (before.start, before.end) != (after.start, after.end) {
            self.notify(StateChangeType::SelectionChanged);
        }
        if (before.can_back, before.can_forward) != (after.can_back, after.can_forward) {
            self.notify(StateChangeType::NavigationChanged);
        }
        if before.saved != after.saved {
            self.notify(StateChangeType::SaveStateChanged);
        }
    }

    fn notify(&mut self, change_type: StateChangeType) {
        let old_version = self.version;
        self.version += 1;
        let change = StateChange::new(change_type, old_version, self.version);
        for callback in &mut self.callbacks {
            callback(&change);
        }
    }

    fn report(&mut self, error: EditorError) {
        tracing::warn!(%error, "edit rejected");
        for callback in &mut self.error_callbacks {
            callback(&error);
        }
    }

    fn data_changed(&mut self, earliest: usize) {
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.data_changed(earliest);
        }
    }

    // ----- cells -----

    /// Re-read every visible cell from the model and announce a redraw.
    pub fn refresh(&mut self) {
        self.rebuild_cells();
        self.notify(StateChangeType::Redraw);
    }

    fn rebuild_cells(&mut self) {
        let space = self.selection.scroll();
        let (width, height) = (space.width(), space.height());
        if self.cells.width() != width || self.cells.height() != height {
            self.cells.resize(width, height);
        }
        for row in 0..height as isize {
            for col in 0..width as isize {
                let index = self.selection.scroll().view_point_to_index(ViewPoint::new(col, row));
                let cell = self.committed_cell(index);
                self.cells.set(col, row, cell);
            }
        }
    }

    fn committed_cell(&self, index: isize) -> Cell {
        let Ok(address) = usize::try_from(index) else {
            return Cell::undefined();
        };
        if address >= self.model.len() {
            return Cell::undefined();
        }
        let mut format = self.model.format_at(address);
        if let Some(run) = self.model.run_containing(address)
            && run.start == address
        {
            let name = self.model.anchor_from_address(address);
            if name.is_some() || !run.sources.is_empty() {
                format = Format::Anchor(AnchorFormat {
                    inner: Box::new(format),
                    name: name.unwrap_or_default().to_string(),
                    format: run.format_string(),
                    sources: run.sources.clone(),
                });
            }
        }
        Cell::new(self.model.byte(address), format)
    }

    fn point_of(&self, address: usize) -> ViewPoint {
        self.selection.scroll().index_to_view_point(address as isize)
    }

    fn cell_at(&self, address: usize) -> &Cell {
        let point = self.point_of(address);
        self.cells.get(point.col, point.row)
    }

    fn set_cell_format(&mut self, address: usize, format: Format) {
        let point = self.point_of(address);
        if let Some(cell) = self.cells.get_mut(point.col, point.row) {
            cell.format = format;
        }
    }

    fn sync_length(&mut self) {
        let length = self.model.len();
        self.selection.scroll_mut().set_data_length(length);
    }

    // ----- selection plumbing -----

    /// The first selected address, scrolled into view.
    fn edit_address(&mut self) -> usize {
        let (low, _) = self.selection.range();
        let address = low.max(0) as usize;
        let mut point = self.point_of(address);
        if self.selection.scroll_mut().scroll_to_point(&mut point) {
            self.refresh();
        }
        address
    }

    /// Move the caret as a side effect of editing. The undo step stays open.
    fn place_caret(&mut self, address: usize) {
        let change = self.selection.select_address(address as isize);
        if change.scrolled {
            self.rebuild_cells();
        }
    }

    fn manual_move(&mut self, change: SelectionChange) {
        if change.changed {
            self.history.change_completed();
        }
        if change.scrolled {
            self.refresh();
        }
    }

    fn apply_jump(&mut self, change: SelectionChange) {
        if change.scrolled {
            self.refresh();
        }
    }

    fn jump_to_target(&mut self, target: &str) -> Result<(), NavigationError> {
        self.history.change_completed();
        match self.selection.goto(target, &self.model) {
            Ok(change) => {
                self.apply_jump(change);
                Ok(())
            }
            Err(error) => {
                self.report(error.clone().into());
                Err(error)
            }
        }
    }

    fn table_location(&self, address: usize) -> Option<(usize, TableRun, TableLocation)> {
        let run = self.model.run_containing(address)?;
        let RunKind::Table(table) = &run.kind else {
            return None;
        };
        let location = table.locate(address - run.start)?;
        Some((run.start, table.clone(), location))
    }

    /// Start and length of the table text field containing `address`.
    fn text_field(&self, address: usize) -> Option<(usize, usize)> {
        let (start, table, location) = self.table_location(address)?;
        match table.segments[location.segment].kind {
            SegmentKind::Text { length } => Some((start + location.segment_offset, length)),
            _ => None,
        }
    }

    // ----- edit state machine -----

    fn edit_char(&mut self, input: char) {
        let address = self.edit_address();
        let format = self.cell_at(address).format.clone();
        if !edit::should_accept_input(&format, input, self.model.text_table()) {
            tracing::trace!(?input, address, "input rejected");
            self.discard_edit(address);
            return;
        }
        let address = match format {
            Format::UnderEdit(mut open) if !open.text.is_empty() => {
                open.text.push(input);
                self.set_cell_format(address, Format::UnderEdit(open));
                address
            }
            other => self.begin_edit(address, other.committed().clone(), input),
        };
        self.try_complete_edit(address);
    }

    /// Turn the cell at `address` into an edit started by `input`. Returns the edit point,
    /// which moves to the start of a pointer or integer typed into mid-field.
    fn begin_edit(&mut self, address: usize, committed: Format, input: char) -> usize {
        let text = edit::start_text(&committed, input);
        let kind = edit::edit_kind(&committed, &text);
        let (address, committed) = match (kind, committed.field()) {
            (EditKind::Pointer | EditKind::Integer, Some((start, _))) if start != address => {
                self.place_caret(start);
                (start, self.cell_at(start).format.committed().clone())
            }
            _ => (address, committed),
        };
        let width = edit::edit_width(kind, &committed);
        if width > 1 {
            self.prepare_multi_cell_edit(address, width);
        }
        self.set_cell_format(
            address,
            Format::UnderEdit(UnderEdit {
                original: Box::new(committed),
                text,
                edit_width: width,
            }),
        );
        address
    }

    /// Blank the cells after `address` that a `width`-cell edit will overwrite, and select
    /// the whole span.
    fn prepare_multi_cell_edit(&mut self, address: usize, width: usize) {
        let end = address + width - 1;
        if self.selection.extend_to_address(end as isize).scrolled {
            self.rebuild_cells();
        }
        for target in address + 1..=end {
            let original = self.cell_at(target).format.committed().clone();
            self.set_cell_format(
                target,
                Format::UnderEdit(UnderEdit {
                    original: Box::new(original),
                    text: String::new(),
                    edit_width: 1,
                }),
            );
        }
    }

    /// Drop an open edit at `address`, restoring the committed cells.
    fn discard_edit(&mut self, address: usize) {
        if !self.cell_at(address).format.is_under_edit() {
            return;
        }
        self.place_caret(address);
        self.refresh();
    }

    /// Called before a manual selection move: an open anchor edit is submitted, anything
    /// else is dropped.
    fn leave_edit(&mut self) {
        let (low, _) = self.selection.range();
        let Ok(address) = usize::try_from(low) else {
            return;
        };
        let Format::UnderEdit(open) = self.cell_at(address).format.clone() else {
            return;
        };
        if edit::edit_kind(&open.original, &open.text) == EditKind::Anchor {
            let text = format!("{} ", open.text);
            if edit::is_complete(EditKind::Anchor, &open.original, &text, self.model.text_table()) {
                if let Err(error) = self.complete_anchor(address, &text) {
                    self.discard_edit(address);
                    self.report(error.into());
                }
                return;
            }
        }
        self.discard_edit(address);
    }

    fn try_complete_edit(&mut self, address: usize) {
        let Format::UnderEdit(open) = self.cell_at(address).format.clone() else {
            return;
        };
        let kind = edit::edit_kind(&open.original, &open.text);
        if !edit::is_complete(kind, &open.original, &open.text, self.model.text_table()) {
            self.notify(StateChangeType::Redraw);
            return;
        }
        let result = match kind {
            EditKind::Pointer => self.complete_pointer(address, &open.text),
            EditKind::Anchor => self.complete_anchor(address, &open.text),
            EditKind::Goto => {
                self.complete_goto(address, &open.text);
                Ok(())
            }
            EditKind::Character => self.complete_character(address, &open),
            EditKind::EscapedByte | EditKind::Hex => self.complete_byte(address, &open.text),
            EditKind::Integer => self.complete_integer(address, &open),
        };
        if let Err(error) = result {
            self.discard_edit(address);
            self.report(error.into());
        }
    }

    /// Common tail of every completed write: sync the length, move the caret, redraw.
    fn finish_write(&mut self, earliest: usize, caret: usize) {
        self.sync_length();
        self.place_caret(caret);
        self.refresh();
        self.data_changed(earliest);
    }

    fn complete_pointer(&mut self, address: usize, text: &str) -> Result<(), EditError> {
        let target = text[1..text.len() - 1].trim();
        let length = self.model.len();
        let destination = if target.is_empty() || target.eq_ignore_ascii_case(NULL_NAME) {
            Some(None)
        } else if let Some(destination) = self.model.address_from_anchor(target) {
            Some(Some(destination))
        } else if let Some(destination) = parse_hex_address(target) {
            if destination >= length {
                return Err(EditError::PointerOutOfRange { destination, length });
            }
            Some(Some(destination))
        } else {
            None
        };

        let delta = self.history.current_change();
        self.model.expand_data(delta, address + POINTER_SIZE);
        match destination {
            Some(destination) => self.model.write_pointer(delta, address, destination),
            None => self.model.write_unmapped_pointer(delta, address, target),
        }
        tracing::debug!(address, target, "pointer written");
        self.finish_write(address, address + POINTER_SIZE);
        Ok(())
    }

    fn complete_anchor(&mut self, address: usize, text: &str) -> Result<(), EditError> {
        let (name, format) = split_declaration(text)?;
        let delta = self.history.current_change();
        self.model.apply_anchor(delta, address, name, format)?;
        self.finish_write(address, address);
        Ok(())
    }

    fn complete_goto(&mut self, address: usize, text: &str) {
        let target = text[1..].trim().to_string();
        self.discard_edit(address);
        // failures already went to the error callback
        if let Err(error) = self.jump_to_target(&target) {
            tracing::debug!(%error, "goto edit did not move the selection");
        }
    }

    fn complete_byte(&mut self, address: usize, text: &str) -> Result<(), EditError> {
        let value =
            u8::from_str_radix(text, 16).map_err(|_| EditError::InvalidNumber(text.to_string()))?;
        let delta = self.history.current_change();
        self.model.write_byte(delta, address, value);
        self.finish_write(address, address + 1);
        Ok(())
    }

    fn complete_integer(&mut self, address: usize, open: &UnderEdit) -> Result<(), EditError> {
        let Format::Integer(integer) = open.original.committed().unwrap_anchor() else {
            return self.complete_byte(address, &open.text);
        };
        let value = self.parse_integer(integer, open.text.trim())?;
        let limit = if integer.length >= 4 {
            u64::from(u32::MAX)
        } else {
            (1u64 << (8 * integer.length)) - 1
        };
        if value > limit {
            return Err(EditError::IntegerOverflow {
                value,
                length: integer.length,
            });
        }
        let (source, length) = (integer.source, integer.length);
        let delta = self.history.current_change();
        self.model.write_value(delta, source, length, value as u32);
        tracing::debug!(source, value, "integer written");
        self.finish_write(source, source + length);
        Ok(())
    }

    fn parse_integer(&self, integer: &IntegerFormat, text: &str) -> Result<u64, EditError> {
        if let Ok(value) = text.parse::<u64>() {
            return Ok(value);
        }
        let Some(table) = &integer.enum_table else {
            return Err(EditError::InvalidNumber(text.to_string()));
        };
        let name = text.trim_matches(DELIMITER);
        let options = self.model.enum_options(table).unwrap_or_default();
        options
            .iter()
            .position(|option| option == name)
            .or_else(|| options.iter().position(|option| option.eq_ignore_ascii_case(name)))
            .map(|index| index as u64)
            .ok_or_else(|| EditError::UnknownEnumValue {
                name: name.to_string(),
                table: table.clone(),
            })
    }

    fn complete_character(&mut self, address: usize, open: &UnderEdit) -> Result<(), EditError> {
        let original = open.original.committed().unwrap_anchor();
        let position = match original {
            Format::Pcs(pcs) => pcs.position,
            Format::ErrorPcs(pcs) => pcs.position,
            _ => return Ok(()),
        };
        let field = self.text_field(address);

        if edit::is_string_end(original, &open.text) {
            match field {
                Some((start, length)) => {
                    self.terminate_field(address, start + length);
                    self.finish_write(address, start + length);
                }
                None => self.end_string(address),
            }
            return Ok(());
        }

        let typed = open.text.strip_prefix(DELIMITER).unwrap_or(&open.text);
        let Some(value) = self.model.text_table().byte_for(typed) else {
            return Ok(());
        };
        match field {
            Some((start, length)) => {
                let replaced = self.model.byte(address);
                let delta = self.history.current_change();
                self.model.write_byte(delta, address, value);
                if replaced == END_OF_STRING && address + 1 < start + length {
                    self.model.write_byte(delta, address + 1, END_OF_STRING);
                }
                self.finish_write(address, address + 1);
            }
            None => self.write_string_character(address, position, value),
        }
        Ok(())
    }

    /// Write one character into a standalone string, growing it when the terminator is
    /// overwritten.
    fn write_string_character(&mut self, address: usize, position: usize, value: u8) {
        let Some(run) = self.model.run_containing(address).cloned() else {
            let delta = self.history.current_change();
            self.model.write_byte(delta, address, value);
            self.finish_write(address, address + 1);
            return;
        };
        let RunKind::PcsString { length } = run.kind else {
            return;
        };

        let mut address = address;
        if position + 1 == length {
            // the escape byte carries a raw byte after it
            let extra = if value == ESCAPE { 2 } else { 1 };
            let delta = self.history.current_change();
            let moved = self.model.relocate_for_expansion(delta, &run, length + extra);
            if moved.start != run.start {
                let target = moved.start + position;
                let offset = address as isize - self.selection.scroll().data_index();
                self.sync_length();
                self.selection.jump_to(JumpInfo {
                    view_start: target as isize - offset,
                    selection_start: target as isize,
                });
                tracing::debug!(from = run.start, to = moved.start, "string moved to grow");
                address = target;
            }
            let delta = self.history.current_change();
            for offset in 1..=extra {
                self.model.write_byte(delta, address + offset, END_OF_STRING);
            }
            self.model.write_byte(delta, address, value);
            let grown = Run::new(moved.start, RunKind::PcsString { length: length + extra })
                .with_sources(moved.sources);
            self.model.observe_run_written(delta, grown);
        } else {
            let replaced = self.model.byte(address);
            let delta = self.history.current_change();
            self.model.write_byte(delta, address, value);
            if value == ESCAPE || replaced == ESCAPE {
                let measured = self.model.text_table().read_string(self.model.data(), run.start);
                if let Some(measured) = measured.filter(|&measured| measured != length) {
                    let remeasured = Run::new(run.start, RunKind::PcsString { length: measured })
                        .with_sources(run.sources);
                    self.model.observe_run_written(delta, remeasured);
                }
            }
        }
        self.finish_write(address, address + 1);
    }

    /// Terminate a standalone string at `address`, freeing the rest of it.
    fn end_string(&mut self, address: usize) {
        let Some(run) = self.model.run_containing(address).cloned() else {
            return;
        };
        let delta = self.history.current_change();
        for target in address..run.end() {
            self.model.write_byte(delta, target, END_OF_STRING);
        }
        let shortened = Run::new(run.start, RunKind::PcsString { length: address + 1 - run.start })
            .with_sources(run.sources);
        self.model.observe_run_written(delta, shortened);
        self.finish_write(address, address + 1);
    }

    /// Write a terminator at `address` and pad the field up to `field_end`.
    fn terminate_field(&mut self, address: usize, field_end: usize) {
        let delta = self.history.current_change();
        self.model.write_byte(delta, address, END_OF_STRING);
        for target in address + 1..field_end {
            self.model.write_byte(delta, target, TABLE_FILL);
        }
    }

    fn backspace(&mut self) {
        let address = self.edit_address();
        if let Format::UnderEdit(mut open) = self.cell_at(address).format.clone() {
            if open.text.pop().is_some() {
                self.set_cell_format(address, Format::UnderEdit(open));
                self.notify(StateChangeType::Redraw);
                return;
            }
            self.discard_edit(address);
        }
        let Some(previous) = address.checked_sub(1) else {
            return;
        };
        let format = self.model.format_at(previous);
        match format {
            Format::Pcs(_) | Format::EscapedPcs(_) | Format::ErrorPcs(_) => {
                self.truncate_string(previous)
            }
            other => match other.field() {
                Some((start, length)) => self.reopen_field(start, length),
                None => self.reopen_byte(previous),
            },
        }
    }

    /// Cut the string containing `address` so that it ends there.
    fn truncate_string(&mut self, address: usize) {
        if let Some((start, length)) = self.text_field(address) {
            self.terminate_field(address, start + length);
        } else if let Some(run) = self.model.run_containing(address).cloned() {
            let delta = self.history.current_change();
            for target in address..run.end() {
                self.model.write_byte(delta, target, END_OF_STRING);
            }
            let length = self
                .model
                .text_table()
                .read_string(self.model.data(), run.start)
                .unwrap_or(address + 1 - run.start);
            let truncated = Run::new(run.start, RunKind::PcsString { length }).with_sources(run.sources);
            self.model.observe_run_written(delta, truncated);
        }
        self.finish_write(address, address);
    }

    /// Re-enter a pointer or integer field with its text minus the last character.
    fn reopen_field(&mut self, start: usize, length: usize) {
        self.place_caret(start);
        let cell = self.cell_at(start).clone();
        let committed = cell.format.committed().clone();
        let mut text = committed.to_text(cell.value);
        text.pop();
        self.prepare_multi_cell_edit(start, length);
        self.set_cell_format(
            start,
            Format::UnderEdit(UnderEdit {
                original: Box::new(committed),
                text,
                edit_width: length,
            }),
        );
        self.notify(StateChangeType::Redraw);
    }

    /// Re-enter the byte at `address` as hex with its last digit removed.
    fn reopen_byte(&mut self, address: usize) {
        self.place_caret(address);
        let cell = self.cell_at(address).clone();
        let mut text = format!("{:02X}", cell.value);
        text.pop();
        self.set_cell_format(
            address,
            Format::UnderEdit(UnderEdit {
                original: Box::new(cell.format.committed().clone()),
                text,
                edit_width: 1,
            }),
        );
        self.notify(StateChangeType::Redraw);
    }

    fn enter(&mut self) {
        let address = self.edit_address();
        let whitespace_ends_edit = match &self.cell_at(address).format {
            Format::UnderEdit(open) => {
                !open.text.is_empty()
                    && matches!(
                        edit::edit_kind(&open.original, &open.text),
                        EditKind::Anchor | EditKind::Goto | EditKind::Integer
                    )
            }
            _ => false,
        };
        if whitespace_ends_edit {
            self.edit_char('\n');
            return;
        }
        let Some((table_start, table, location)) = self.table_location(address) else {
            return;
        };
        let SegmentKind::Text { length } = table.segments[location.segment].kind else {
            return;
        };
        self.discard_edit(address);
        let field_start = table_start + location.segment_offset;
        self.terminate_field(address, field_start + length);
        let next = if location.element + 1 < table.element_count {
            field_start + table.element_width()
        } else {
            table_start + table.length()
        };
        self.finish_write(address, next);
    }

    fn tab(&mut self) {
        let address = self.edit_address();
        self.leave_edit();
        let Some((table_start, table, location)) = self.table_location(address) else {
            return;
        };
        let field_end = table_start + location.segment_offset + table.segments[location.segment].length();
        let target = field_end.min(table_start + table.length());
        self.history.change_completed();
        let change = self.selection.select_address(target as isize);
        self.manual_move(change);
    }

    fn after_revert(&mut self, earliest: Option<usize>) {
        self.sync_length();
        self.selection.select_address(self.selection.start_address());
        if let Some(address) = earliest {
            let mut point = self.point_of(address);
            self.selection.scroll_mut().scroll_to_point(&mut point);
            self.data_changed(address);
        }
        self.refresh();
    }
}

fn parse_hex_address(text: &str) -> Option<usize> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || digits.len() > 7 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    usize::from_str_radix(digits, 16).ok()
}
