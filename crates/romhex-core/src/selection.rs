//! Selection, goto, and back/forward navigation.
//!
//! # Overview
//!
//! The selection is stored as two addresses. View points are derived from them through the
//! owned [`AddressSpace`], so they stay correct after any scroll or resize without being
//! updated.
//!
//! Jumps (goto, back, forward) put the target in the top-left cell and are recorded on two
//! stacks. Plain scrolling and caret movement are not recorded.
//!
//! # Example
//!
//! ```rust
//! use romhex_core::{AddressSpace, MemoryModel, Selection, ViewPoint};
//!
//! let model = MemoryModel::new(vec![0; 0x1000]);
//! let mut selection = Selection::new(AddressSpace::new(0x1000));
//!
//! selection.goto("200", &model).unwrap();
//! assert_eq!(selection.start_address(), 0x200);
//! assert_eq!(selection.start(), ViewPoint::new(0, 0));
//!
//! selection.back().unwrap();
//! assert_eq!(selection.start_address(), 0);
//! ```

use crate::address_space::{AddressSpace, Direction, MIN_WIDTH, ViewPoint};
use crate::error::NavigationError;
use crate::model::Model;

/// Default number of bytes per row the user asks for.
pub const DEFAULT_PREFERRED_WIDTH: usize = 16;

/// Pick a row width close to `preferred` that fits in `available` columns.
///
/// - Narrower than available: the widest multiple of `preferred` that fits.
/// - Wider than available: the widest divisor of `preferred` (at least [`MIN_WIDTH`]) that
///   fits.
/// - Otherwise `available`.
pub fn coerce_width(preferred: usize, available: usize) -> usize {
    let preferred = preferred.max(1);
    if preferred < available {
        available / preferred * preferred
    } else if preferred > available {
        (MIN_WIDTH..=available)
            .rev()
            .find(|divisor| preferred % divisor == 0)
            .unwrap_or(available)
    } else {
        available
    }
}

/// A location to return to: what was on screen and where the caret was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JumpInfo {
    /// Address in the top-left cell.
    pub view_start: isize,
    /// Selection start address.
    pub selection_start: isize,
}

/// What a selection update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionChange {
    /// The selection moved.
    pub changed: bool,
    /// The window scrolled, so every cell needs redrawing.
    pub scrolled: bool,
    /// Selection start before the update, in the pre-update window.
    pub previous_start: ViewPoint,
}

impl SelectionChange {
    fn unchanged(previous_start: ViewPoint) -> Self {
        Self {
            changed: false,
            scrolled: false,
            previous_start,
        }
    }
}

/// Selection over an [`AddressSpace`].
#[derive(Debug)]
pub struct Selection {
    space: AddressSpace,
    start: isize,
    end: isize,
    preferred_width: usize,
    back: Vec<JumpInfo>,
    forward: Vec<JumpInfo>,
}

impl Selection {
    /// Create a selection at the first byte of `space`.
    pub fn new(space: AddressSpace) -> Self {
        Self {
            space,
            start: 0,
            end: 0,
            preferred_width: DEFAULT_PREFERRED_WIDTH,
            back: Vec::new(),
            forward: Vec::new(),
        }
    }

    /// The window.
    pub fn scroll(&self) -> &AddressSpace {
        &self.space
    }

    /// The window, for scrolling. The selection follows automatically.
    pub fn scroll_mut(&mut self) -> &mut AddressSpace {
        &mut self.space
    }

    /// Selection start as a view point.
    pub fn start(&self) -> ViewPoint {
        self.space.index_to_view_point(self.start)
    }

    /// Selection end (the caret) as a view point.
    pub fn end(&self) -> ViewPoint {
        self.space.index_to_view_point(self.end)
    }

    /// Selection start address.
    pub fn start_address(&self) -> isize {
        self.start
    }

    /// Selection end address.
    pub fn end_address(&self) -> isize {
        self.end
    }

    /// Lowest and highest selected address.
    pub fn range(&self) -> (isize, isize) {
        (self.start.min(self.end), self.start.max(self.end))
    }

    /// Row width the user asked for.
    pub fn preferred_width(&self) -> usize {
        self.preferred_width
    }

    /// Change the requested row width. Takes effect on the next [`change_width`](Self::change_width).
    pub fn set_preferred_width(&mut self, width: usize) {
        self.preferred_width = width.max(1);
    }

    /// Resize the window to fit `available` columns. Returns `true` if the width changed.
    pub fn change_width(&mut self, available: usize) -> bool {
        let width = coerce_width(self.preferred_width, available);
        self.space.set_width(width)
    }

    /// Move the selection to `point`, collapsing it, and scroll it into view.
    pub fn set_start(&mut self, point: ViewPoint) -> SelectionChange {
        let previous = self.start();
        let index = self.clamp(self.space.view_point_to_index(point));
        if index == self.start && index == self.end {
            return SelectionChange::unchanged(previous);
        }
        let mut point = self.space.index_to_view_point(index);
        let scrolled = self.space.scroll_to_point(&mut point);
        self.start = index;
        self.end = index;
        SelectionChange {
            changed: true,
            scrolled,
            previous_start: previous,
        }
    }

    /// Move the caret to `point`, keeping the start, and scroll it into view.
    pub fn set_end(&mut self, point: ViewPoint) -> SelectionChange {
        let previous = self.start();
        let index = self.clamp(self.space.view_point_to_index(point));
        if index == self.end {
            return SelectionChange::unchanged(previous);
        }
        let mut point = self.space.index_to_view_point(index);
        let scrolled = self.space.scroll_to_point(&mut point);
        self.end = index;
        SelectionChange {
            changed: true,
            scrolled,
            previous_start: previous,
        }
    }

    /// Collapse the selection onto `address`.
    pub fn select_address(&mut self, address: isize) -> SelectionChange {
        self.set_start(self.space.index_to_view_point(address))
    }

    /// Extend the selection to `address`.
    pub fn extend_to_address(&mut self, address: isize) -> SelectionChange {
        self.set_end(self.space.index_to_view_point(address))
    }

    /// Collapse the selection one step from the caret.
    pub fn move_start(&mut self, direction: Direction) -> SelectionChange {
        let target = self.step(direction);
        self.set_start(target)
    }

    /// Move the caret one step, extending the selection.
    pub fn move_end(&mut self, direction: Direction) -> SelectionChange {
        let target = self.step(direction);
        self.set_end(target)
    }

    fn step(&self, direction: Direction) -> ViewPoint {
        let end = self.end();
        let height = self.space.height() as isize;
        match direction {
            Direction::Up => ViewPoint::new(end.col, end.row - 1),
            Direction::Down => ViewPoint::new(end.col, end.row + 1),
            Direction::Left => ViewPoint::new(end.col - 1, end.row),
            Direction::Right => ViewPoint::new(end.col + 1, end.row),
            Direction::PageUp => ViewPoint::new(end.col, end.row - height),
            Direction::PageDown => ViewPoint::new(end.col, end.row + height),
        }
    }

    /// Returns `true` if `point` is inside the selection.
    pub fn is_selected(&self, point: ViewPoint) -> bool {
        if !(0..self.space.width() as isize).contains(&point.col) {
            return false;
        }
        let index = self.space.view_point_to_index(point);
        let (low, high) = self.range();
        (low..=high).contains(&index)
    }

    /// Jump to an anchor name or a hex address.
    pub fn goto(&mut self, text: &str, model: &dyn Model) -> Result<SelectionChange, NavigationError> {
        let address = resolve_target(text, model)?;
        tracing::debug!(target = text.trim(), address, "goto");
        Ok(self.jump_to(JumpInfo {
            view_start: address as isize,
            selection_start: address as isize,
        }))
    }

    /// Jump to `target`, recording the current location for [`back`](Self::back).
    pub fn jump_to(&mut self, target: JumpInfo) -> SelectionChange {
        self.back.push(self.current_location());
        self.forward.clear();
        self.apply_jump(target)
    }

    /// Return to the location before the last jump.
    pub fn back(&mut self) -> Option<SelectionChange> {
        let target = self.back.pop()?;
        self.forward.push(self.current_location());
        Some(self.apply_jump(target))
    }

    /// Redo the last jump undone by [`back`](Self::back).
    pub fn forward(&mut self) -> Option<SelectionChange> {
        let target = self.forward.pop()?;
        self.back.push(self.current_location());
        Some(self.apply_jump(target))
    }

    /// Returns `true` if [`back`](Self::back) has somewhere to go.
    pub fn can_back(&self) -> bool {
        !self.back.is_empty()
    }

    /// Returns `true` if [`forward`](Self::forward) has somewhere to go.
    pub fn can_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    /// Where the view is now.
    pub fn current_location(&self) -> JumpInfo {
        JumpInfo {
            view_start: self.space.data_index(),
            selection_start: self.start,
        }
    }

    fn apply_jump(&mut self, target: JumpInfo) -> SelectionChange {
        let previous = self.start();
        let shift = self.space.set_data_index(target.view_start);
        let index = self.clamp(target.selection_start);
        self.start = index;
        self.end = index;
        SelectionChange {
            changed: true,
            scrolled: shift != 0,
            previous_start: previous,
        }
    }

    fn clamp(&self, index: isize) -> isize {
        let low = self.space.data_start() as isize;
        let length = self.space.data_length() as isize;
        // one past the end is selectable so data can be appended
        let high = if self.space.is_single_table_mode() { length - 1 } else { length };
        index.clamp(low, high.max(low))
    }
}

fn resolve_target(text: &str, model: &dyn Model) -> Result<usize, NavigationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(NavigationError::UnresolvedTarget(String::new()));
    }
    let address = match model.address_from_anchor(text) {
        Some(address) => address,
        None => {
            let digits = text.strip_prefix("0x").unwrap_or(text);
            usize::from_str_radix(digits, 16)
                .map_err(|_| NavigationError::UnresolvedTarget(text.to_string()))?
        }
    };
    if address >= model.len() {
        return Err(NavigationError::OutOfRange {
            address,
            length: model.len(),
        });
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_model::MemoryModel;

    fn selection(length: usize) -> Selection {
        let mut space = AddressSpace::new(length);
        space.set_width(16);
        space.set_height(4);
        Selection::new(space)
    }

    #[test]
    fn coerce_width_cases() {
        assert_eq!(coerce_width(32, 20), 16);
        assert_eq!(coerce_width(16, 40), 32);
        assert_eq!(coerce_width(16, 16), 16);
        assert_eq!(coerce_width(7, 5), 5);
        assert_eq!(coerce_width(12, 10), 6);
    }

    #[test]
    fn setting_start_collapses_and_scrolls() {
        let mut selection = selection(0x1000);
        selection.set_end(ViewPoint::new(3, 1));
        assert_eq!(selection.range(), (0, 19));

        let change = selection.set_start(ViewPoint::new(0, 6));
        assert!(change.changed);
        assert!(change.scrolled);
        assert_eq!(selection.start_address(), 0x60);
        assert_eq!(selection.end_address(), 0x60);
        assert_eq!(selection.start(), ViewPoint::new(0, 3));
    }

    #[test]
    fn start_is_clamped_to_one_past_the_end() {
        let mut selection = selection(0x20);
        selection.set_start(ViewPoint::new(5, 3));
        assert_eq!(selection.start_address(), 0x20);
        selection.set_start(ViewPoint::new(-3, 0));
        assert_eq!(selection.start_address(), 0);
    }

    #[test]
    fn is_selected_checks_columns_and_range() {
        let mut selection = selection(0x100);
        selection.set_start(ViewPoint::new(14, 0));
        selection.set_end(ViewPoint::new(1, 1));
        assert!(selection.is_selected(ViewPoint::new(15, 0)));
        assert!(selection.is_selected(ViewPoint::new(0, 1)));
        assert!(!selection.is_selected(ViewPoint::new(2, 1)));
        assert!(!selection.is_selected(ViewPoint::new(16, 0)));
    }

    #[test]
    fn goto_prefers_anchor_names_over_hex() {
        let mut model = MemoryModel::new(vec![0xFF; 0x200]);
        let mut delta = crate::ModelDelta::new();
        model.apply_anchor(&mut delta, 0x1C0, "BEEF", "").unwrap();

        let mut selection = selection(0x200);
        selection.goto("BEEF", &model).unwrap();
        assert_eq!(selection.start_address(), 0x1C0);
        selection.goto("0x20", &model).unwrap();
        assert_eq!(selection.start_address(), 0x20);
    }

    #[test]
    fn failed_goto_changes_nothing() {
        let model = MemoryModel::new(vec![0xFF; 0x100]);
        let mut selection = selection(0x100);
        assert_eq!(
            selection.goto("nowhere", &model),
            Err(NavigationError::UnresolvedTarget("nowhere".to_string()))
        );
        assert!(matches!(
            selection.goto("400", &model),
            Err(NavigationError::OutOfRange { address: 0x400, .. })
        ));
        assert_eq!(selection.goto("  ", &model), Err(NavigationError::UnresolvedTarget(String::new())));
        assert!(!selection.can_back());
    }

    #[test]
    fn back_then_forward_restores_locations() {
        let model = MemoryModel::new(vec![0xFF; 0x1000]);
        let mut selection = selection(0x1000);
        selection.set_start(ViewPoint::new(2, 1));
        selection.goto("100", &model).unwrap();
        selection.goto("300", &model).unwrap();

        selection.back().unwrap();
        assert_eq!(selection.start_address(), 0x100);
        selection.back().unwrap();
        assert_eq!(selection.start_address(), 0x12);
        assert!(!selection.can_back());
        assert!(selection.can_forward());

        selection.forward().unwrap();
        selection.forward().unwrap();
        assert_eq!(selection.start_address(), 0x300);
        assert!(selection.forward().is_none());
    }

    #[test]
    fn new_jump_clears_forward_history() {
        let model = MemoryModel::new(vec![0xFF; 0x1000]);
        let mut selection = selection(0x1000);
        selection.goto("100", &model).unwrap();
        selection.back().unwrap();
        assert!(selection.can_forward());
        selection.goto("200", &model).unwrap();
        assert!(!selection.can_forward());
    }
}
