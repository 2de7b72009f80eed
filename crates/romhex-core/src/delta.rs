//! Reversible record of everything one undo step changed.
//!
//! A [`ModelDelta`] remembers the *previous* value of every byte it saw written, plus the runs,
//! names and unmapped pointers that were added or removed. Reverting it restores all of them
//! and produces the delta that re-applies the change.

use crate::history::ChangeToken;
use crate::model::{MetadataUpdate, Model, Run};
use std::collections::BTreeMap;

/// The change token used by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelDelta {
    old_data: BTreeMap<usize, u8>,
    length_before: Option<usize>,
    added_runs: BTreeMap<usize, Run>,
    removed_runs: BTreeMap<usize, Run>,
    added_names: BTreeMap<usize, String>,
    removed_names: BTreeMap<usize, String>,
    added_unmapped: BTreeMap<usize, String>,
    removed_unmapped: BTreeMap<usize, String>,
    change_count: usize,
}

impl ModelDelta {
    /// Create an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the byte at `address` held `old` before its first write in this delta.
    pub fn record_byte(&mut self, address: usize, old: u8) {
        self.old_data.entry(address).or_insert(old);
        self.change_count += 1;
    }

    /// Record the buffer length before the first resize in this delta.
    pub fn record_length(&mut self, old_length: usize) {
        self.length_before.get_or_insert(old_length);
        self.change_count += 1;
    }

    /// Record a run being registered.
    pub fn add_run(&mut self, run: Run) {
        self.added_runs.insert(run.start, run);
        self.change_count += 1;
    }

    /// Record a run being removed from the registry.
    pub fn remove_run(&mut self, run: Run) {
        if self.added_runs.remove(&run.start).is_none() {
            self.removed_runs.entry(run.start).or_insert(run);
        }
        self.change_count += 1;
    }

    /// Record `name` being given to `address`.
    pub fn add_name(&mut self, address: usize, name: impl Into<String>) {
        self.added_names.insert(address, name.into());
        self.change_count += 1;
    }

    /// Record `name` being taken from `address`.
    pub fn remove_name(&mut self, address: usize, name: impl Into<String>) {
        if self.added_names.remove(&address).is_none() {
            self.removed_names.entry(address).or_insert_with(|| name.into());
        }
        self.change_count += 1;
    }

    /// Record a pointer at `source` starting to wait for `name`.
    pub fn add_unmapped(&mut self, source: usize, name: impl Into<String>) {
        self.added_unmapped.insert(source, name.into());
        self.change_count += 1;
    }

    /// Record a pointer at `source` no longer waiting for `name`.
    pub fn remove_unmapped(&mut self, source: usize, name: impl Into<String>) {
        if self.added_unmapped.remove(&source).is_none() {
            self.removed_unmapped.entry(source).or_insert_with(|| name.into());
        }
        self.change_count += 1;
    }

    /// Lowest address whose byte or metadata changed.
    pub fn earliest_change(&self) -> Option<usize> {
        [
            self.old_data.keys().next(),
            self.added_runs.keys().next(),
            self.removed_runs.keys().next(),
            self.added_names.keys().next(),
            self.removed_names.keys().next(),
        ]
        .into_iter()
        .flatten()
        .min()
        .copied()
    }

    /// Addresses written in this delta, ascending.
    pub fn changed_addresses(&self) -> impl Iterator<Item = usize> + '_ {
        self.old_data.keys().copied()
    }

    /// Returns `true` if only names, formats or pointers-awaiting-names changed.
    pub fn is_metadata_only(&self) -> bool {
        self.old_data.is_empty() && self.length_before.is_none() && self.has_any_change()
    }

    /// Undo this delta against `model` and return the delta that redoes it.
    pub fn revert<M: Model + ?Sized>(self, model: &mut M) -> ModelDelta {
        let mut reverse = ModelDelta {
            change_count: self.change_count,
            ..ModelDelta::default()
        };

        let current_length = model.len();
        if let Some(target) = self.length_before {
            reverse.length_before = Some(current_length);
            if target > current_length {
                model.resize(target);
            }
        }
        for (&address, &old) in &self.old_data {
            let previous = model.poke(address, old);
            reverse.old_data.insert(address, previous);
        }
        if let Some(target) = self.length_before
            && target < current_length
        {
            model.resize(target);
        }

        let update = MetadataUpdate {
            remove_runs: self.added_runs.keys().copied().collect(),
            add_runs: self.removed_runs.values().cloned().collect(),
            remove_names: self.added_names.keys().copied().collect(),
            add_names: self.removed_names.clone().into_iter().collect(),
            remove_unmapped: self.added_unmapped.keys().copied().collect(),
            add_unmapped: self.removed_unmapped.clone().into_iter().collect(),
        };
        model.mass_update(update);

        reverse.added_runs = self.removed_runs;
        reverse.removed_runs = self.added_runs;
        reverse.added_names = self.removed_names;
        reverse.removed_names = self.added_names;
        reverse.added_unmapped = self.removed_unmapped;
        reverse.removed_unmapped = self.added_unmapped;
        reverse
    }
}

impl ChangeToken for ModelDelta {
    fn has_data_change(&self) -> bool {
        !self.old_data.is_empty() || self.length_before.is_some()
    }

    fn has_any_change(&self) -> bool {
        self.has_data_change()
            || !self.added_runs.is_empty()
            || !self.removed_runs.is_empty()
            || !self.added_names.is_empty()
            || !self.removed_names.is_empty()
            || !self.added_unmapped.is_empty()
            || !self.removed_unmapped.is_empty()
    }

    fn change_count(&self) -> usize {
        self.change_count
    }
}
