//! Undo/redo over caller-supplied change tokens.
//!
//! # Overview
//!
//! All mutation goes through one open token obtained from
//! [`ChangeHistory::current_change`]. The token is sealed onto the undo stack by
//! [`ChangeHistory::change_completed`]; until then, every write lands in the same undo step.
//! Undo and redo hand the sealed token to a caller-supplied revert function, which applies it
//! in reverse and returns the token that would re-apply it.
//!
//! The history also remembers the undo depth at the last save, so it can tell whether the
//! current state matches what is on disk.
//!
//! # Example
//!
//! ```rust
//! use romhex_core::{ChangeHistory, MemoryModel, Model};
//!
//! let mut model = MemoryModel::new(vec![0xFF; 16]);
//! let mut history = ChangeHistory::new();
//!
//! model.write_byte(history.current_change(), 3, 0x42);
//! history.change_completed();
//! assert!(!history.is_saved());
//!
//! history.undo(|delta| delta.revert(&mut model));
//! assert_eq!(model.byte(3), 0xFF);
//! assert!(history.is_saved());
//! ```

use std::cell::Cell;

/// Default number of undo steps kept.
pub const DEFAULT_MAX_UNDO: usize = 100;

/// A reversible batch of changes.
pub trait ChangeToken: Default {
    /// Returns `true` if any byte of the buffer was written.
    fn has_data_change(&self) -> bool;

    /// Returns `true` if anything at all was recorded, metadata included.
    fn has_any_change(&self) -> bool;

    /// Number of changes recorded so far. It increases every time a new change lands.
    fn change_count(&self) -> usize;
}

/// Marks a revert in progress for as long as it lives.
struct RevertScope<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> RevertScope<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for RevertScope<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Linear undo/redo history with a saved-state marker.
#[derive(Debug)]
pub struct ChangeHistory<T: ChangeToken> {
    undo_stack: Vec<T>,
    redo_stack: Vec<T>,
    current: Option<T>,
    max_undo: usize,
    /// Undo depth at the last save. When `redo_stack` is non-empty it may exceed the current
    /// depth. `None` once the saved state can no longer be reached.
    saved_index: Option<usize>,
    revert_in_progress: Cell<bool>,
}

impl<T: ChangeToken> Default for ChangeHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ChangeToken> ChangeHistory<T> {
    /// Create an empty history that starts out saved.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_UNDO)
    }

    /// Create an empty history keeping at most `max_undo` steps.
    pub fn with_capacity(max_undo: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            current: None,
            max_undo: max_undo.max(1),
            saved_index: Some(0),
            revert_in_progress: Cell::new(false),
        }
    }

    /// The open token, created on first use.
    ///
    /// Creating a token starts a new branch of history, so the redo stack is discarded.
    pub fn current_change(&mut self) -> &mut T {
        self.verify_not_reverting("current_change");
        if self.current.is_none() {
            self.clear_redo();
        }
        self.current.get_or_insert_with(T::default)
    }

    /// The open token, if there is one.
    pub fn peek_current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Seal the open token onto the undo stack. Tokens with no changes are dropped.
    pub fn change_completed(&mut self) {
        self.verify_not_reverting("change_completed");
        let Some(token) = self.current.take() else {
            return;
        };
        if !token.has_any_change() {
            return;
        }
        if self.undo_stack.len() >= self.max_undo {
            self.undo_stack.remove(0);
            self.saved_index = match self.saved_index {
                Some(0) | None => None,
                Some(index) => Some(index - 1),
            };
        }
        self.undo_stack.push(token);
    }

    /// Returns `true` if [`undo`](Self::undo) would do something.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.current.as_ref().is_some_and(T::has_any_change)
    }

    /// Returns `true` if [`redo`](Self::redo) would do something.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of sealed undo steps.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of redo steps.
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Undo depth recorded by the last [`tag_as_saved`](Self::tag_as_saved).
    pub fn saved_index(&self) -> Option<usize> {
        self.saved_index
    }

    /// Returns `true` while a revert callback is running.
    pub fn is_revert_in_progress(&self) -> bool {
        self.revert_in_progress.get()
    }

    /// Undo the most recent step.
    ///
    /// The open token is sealed first. `revert` receives the token, applies it in reverse, and
    /// returns the token that re-applies it. Returns `false` if there was nothing to undo.
    pub fn undo<F>(&mut self, revert: F) -> bool
    where
        F: FnOnce(T) -> T,
    {
        self.verify_not_reverting("undo");
        self.change_completed();
        let Some(token) = self.undo_stack.pop() else {
            return false;
        };
        let reversed = {
            let _scope = RevertScope::enter(&self.revert_in_progress);
            revert(token)
        };
        self.redo_stack.push(reversed);
        true
    }

    /// Redo the most recently undone step. Returns `false` if there was nothing to redo.
    pub fn redo<F>(&mut self, revert: F) -> bool
    where
        F: FnOnce(T) -> T,
    {
        self.verify_not_reverting("redo");
        self.change_completed();
        let Some(token) = self.redo_stack.pop() else {
            return false;
        };
        let reversed = {
            let _scope = RevertScope::enter(&self.revert_in_progress);
            revert(token)
        };
        self.undo_stack.push(reversed);
        true
    }

    /// Record the current state as the saved one.
    pub fn tag_as_saved(&mut self) {
        self.verify_not_reverting("tag_as_saved");
        self.change_completed();
        self.saved_index = Some(self.undo_stack.len());
    }

    /// Returns `true` if the current state is the saved one.
    pub fn is_saved(&self) -> bool {
        let open_change = self.current.as_ref().is_some_and(T::has_any_change);
        !open_change && self.saved_index == Some(self.undo_stack.len())
    }

    /// Returns `true` if any byte differs between the current and the saved state.
    ///
    /// Metadata-only steps (names, formats) do not count. If the saved state is unreachable
    /// this conservatively returns `true`.
    pub fn has_data_change(&self) -> bool {
        if self.current.as_ref().is_some_and(T::has_data_change) {
            return true;
        }
        let Some(saved) = self.saved_index else {
            return true;
        };
        let depth = self.undo_stack.len();
        if saved <= depth {
            self.undo_stack[saved..].iter().any(T::has_data_change)
        } else {
            // the top of the redo stack is the step just above the current depth
            self.redo_stack
                .iter()
                .rev()
                .take(saved - depth)
                .any(T::has_data_change)
        }
    }

    fn clear_redo(&mut self) {
        if self.redo_stack.is_empty() {
            return;
        }
        if let Some(saved) = self.saved_index
            && saved > self.undo_stack.len()
        {
            self.saved_index = None;
        }
        self.redo_stack.clear();
    }

    fn verify_not_reverting(&self, operation: &str) {
        if self.revert_in_progress.get() {
            panic!("ChangeHistory::{operation} called while a revert is in progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Token {
        data: usize,
        meta: usize,
        undone: bool,
    }

    impl ChangeToken for Token {
        fn has_data_change(&self) -> bool {
            self.data > 0
        }
        fn has_any_change(&self) -> bool {
            self.data + self.meta > 0
        }
        fn change_count(&self) -> usize {
            self.data + self.meta
        }
    }

    fn flip(mut token: Token) -> Token {
        token.undone = !token.undone;
        token
    }

    fn record(history: &mut ChangeHistory<Token>, data: usize, meta: usize) {
        let token = history.current_change();
        token.data += data;
        token.meta += meta;
        history.change_completed();
    }

    #[test]
    fn empty_tokens_are_discarded() {
        let mut history = ChangeHistory::<Token>::new();
        history.current_change();
        history.change_completed();
        assert_eq!(history.undo_depth(), 0);
        assert!(!history.can_undo());
        assert!(history.is_saved());
    }

    #[test]
    fn open_change_is_undoable_before_completion() {
        let mut history = ChangeHistory::<Token>::new();
        history.current_change().data = 1;
        assert!(history.can_undo());
        assert!(!history.is_saved());
        assert!(history.undo(flip));
        assert!(history.can_redo());
        assert!(history.is_saved());
    }

    #[test]
    fn new_branch_clears_redo_and_unreachable_save() {
        let mut history = ChangeHistory::<Token>::new();
        record(&mut history, 1, 0);
        history.tag_as_saved();
        history.undo(flip);
        assert_eq!(history.saved_index(), Some(1));

        record(&mut history, 1, 0);
        assert!(!history.can_redo());
        assert_eq!(history.saved_index(), None);
        assert!(!history.is_saved());
        assert!(history.has_data_change());
    }

    #[test]
    fn saved_state_survives_undo_then_redo() {
        let mut history = ChangeHistory::<Token>::new();
        record(&mut history, 1, 0);
        record(&mut history, 1, 0);
        history.tag_as_saved();
        history.undo(flip);
        assert!(!history.is_saved());
        history.redo(flip);
        assert!(history.is_saved());
    }

    #[test]
    fn metadata_only_steps_are_not_data_changes() {
        let mut history = ChangeHistory::<Token>::new();
        record(&mut history, 0, 2);
        assert!(!history.is_saved());
        assert!(!history.has_data_change());

        record(&mut history, 1, 0);
        assert!(history.has_data_change());
    }

    #[test]
    fn data_change_looks_above_the_current_depth_after_undo() {
        let mut history = ChangeHistory::<Token>::new();
        record(&mut history, 0, 1);
        record(&mut history, 1, 0);
        history.tag_as_saved();
        assert!(!history.has_data_change());

        history.undo(flip);
        assert!(history.has_data_change());
        history.undo(flip);
        assert!(history.has_data_change());
    }

    #[test]
    fn capacity_drops_oldest_step_and_shifts_save_point() {
        let mut history = ChangeHistory::<Token>::with_capacity(2);
        record(&mut history, 1, 0);
        history.tag_as_saved();
        record(&mut history, 1, 0);
        record(&mut history, 1, 0);
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.saved_index(), Some(0));
        record(&mut history, 1, 0);
        assert_eq!(history.saved_index(), None);
    }

    #[test]
    fn revert_flag_resets_after_revert() {
        let mut history = ChangeHistory::<Token>::new();
        record(&mut history, 1, 0);
        let mut seen = false;
        history.undo(|token| {
            seen = true;
            flip(token)
        });
        assert!(seen);
        assert!(!history.is_revert_in_progress());
    }
}
