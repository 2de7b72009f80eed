//! In-memory [`Model`] implementation.
//!
//! # Overview
//!
//! `MemoryModel` keeps the bytes in a `Vec<u8>` and the metadata in ordered maps keyed by
//! address:
//!
//! - **runs**: non-overlapping classified ranges (pointers, strings, tables, streams)
//! - **names**: anchor names
//! - **unmapped pointers**: pointers written against a name that does not exist yet; they
//!   are stored as null and repointed when the name is declared
//!
//! It does not discover formats from raw bytes; it only records what it is told.
//!
//! # Example
//!
//! ```rust
//! use romhex_core::{MemoryModel, Model, ModelDelta};
//!
//! let mut model = MemoryModel::new(vec![0xFF; 0x40]);
//! let mut delta = ModelDelta::new();
//! model.apply_anchor(&mut delta, 0x20, "target", "").unwrap();
//! model.write_pointer(&mut delta, 0x00, Some(0x20));
//!
//! assert_eq!(model.read_pointer(0x00), Some(0x20));
//! assert_eq!(model.sources_of(0x20), vec![0x00]);
//! assert_eq!(model.run_containing(0x20).unwrap().sources, vec![0x00]);
//! ```

use crate::anchor::{FormatDeclaration, parse_format};
use crate::delta::ModelDelta;
use crate::error::{AnchorError, MetadataError};
use crate::format::{Format, IntegerFormat, PcsByte, PcsFormat, PointerFormat, StreamFormat};
use crate::model::{
    FREE_SPACE, MetadataUpdate, Model, NULL_NAME, POINTER_SIZE, Run, RunKind, SegmentKind,
    TableRun, encode_pointer,
};
use romhex_text::{CharacterTable, END_OF_STRING, ESCAPE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free bytes required after a relocated run.
pub const RELOCATION_PADDING: usize = 0x10;

/// Metadata in its serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMetadata {
    /// Anchor names by address.
    pub names: BTreeMap<usize, String>,
    /// Every registered run.
    pub runs: Vec<Run>,
    /// Pointers waiting for a name, by source address.
    pub unmapped: BTreeMap<usize, String>,
    /// Where relocation starts looking for free space.
    pub free_space_start: usize,
}

/// A [`Model`] backed by memory.
#[derive(Debug, Clone)]
pub struct MemoryModel {
    data: Vec<u8>,
    runs: BTreeMap<usize, Run>,
    names: BTreeMap<usize, String>,
    unmapped: BTreeMap<usize, String>,
    text: CharacterTable,
    free_space_start: usize,
}

impl MemoryModel {
    /// Wrap `data` with the default character table and no metadata.
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_table(data, CharacterTable::pokemon())
    }

    /// Wrap `data` using `text` for strings.
    pub fn with_table(data: Vec<u8>, text: CharacterTable) -> Self {
        Self {
            data,
            runs: BTreeMap::new(),
            names: BTreeMap::new(),
            unmapped: BTreeMap::new(),
            text,
            free_space_start: 0,
        }
    }

    /// Where relocation starts looking for free space.
    pub fn free_space_start(&self) -> usize {
        self.free_space_start
    }

    /// Set where relocation starts looking for free space.
    pub fn set_free_space_start(&mut self, address: usize) {
        self.free_space_start = address;
    }

    /// All registered runs, ordered by start.
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.runs.values()
    }

    /// Serialize names, runs and unmapped pointers as JSON.
    pub fn export_metadata(&self) -> Result<String, serde_json::Error> {
        let stored = StoredMetadata {
            names: self.names.clone(),
            runs: self.runs.values().cloned().collect(),
            unmapped: self.unmapped.clone(),
            free_space_start: self.free_space_start,
        };
        serde_json::to_string_pretty(&stored)
    }

    /// Replace all metadata with a blob produced by [`export_metadata`](Self::export_metadata).
    pub fn import_metadata(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let stored: StoredMetadata = serde_json::from_str(json)?;
        self.replace_metadata(stored);
        Ok(())
    }

    fn replace_metadata(&mut self, stored: StoredMetadata) {
        self.names = stored.names;
        self.runs = stored.runs.into_iter().map(|run| (run.start, run)).collect();
        self.unmapped = stored.unmapped;
        self.free_space_start = stored.free_space_start;
        tracing::debug!(runs = self.runs.len(), names = self.names.len(), "imported metadata");
    }

    /// Drop metadata that no longer fits inside the data.
    ///
    /// A run that now ends past the data degrades to a bare anchor when it is named or
    /// referenced. Bare anchors with neither are removed.
    fn prune_metadata(&mut self) {
        let length = self.data.len();
        let fits = |address: usize, size: usize| address + size <= length;
        self.names.retain(|&address, _| address < length);
        self.unmapped.retain(|&source, _| fits(source, POINTER_SIZE));
        let names = &self.names;
        let before = self.runs.len();
        self.runs = std::mem::take(&mut self.runs)
            .into_values()
            .filter_map(|mut run| {
                run.sources.retain(|&source| fits(source, POINTER_SIZE));
                if run.end() > length {
                    run.kind = RunKind::NoInfo;
                }
                let anchored = !run.sources.is_empty() || names.contains_key(&run.start);
                let kept = run.start < length && (run.kind != RunKind::NoInfo || anchored);
                kept.then_some((run.start, run))
            })
            .collect();
        if self.runs.len() < before {
            tracing::debug!(dropped = before - self.runs.len(), "pruned runs past the end");
        }
    }

    fn pointer_format(&self, source: usize, position: usize) -> Format {
        let destination = self.read_pointer(source);
        let name = destination
            .and_then(|address| self.anchor_from_address(address))
            .or_else(|| self.unmapped_name(source))
            .map(str::to_string);
        Format::Pointer(PointerFormat {
            source,
            position,
            destination,
            name,
        })
    }

    fn pcs_format(&self, source: usize, address: usize) -> Format {
        let mut cursor = source;
        while cursor < address {
            if self.byte(cursor) == ESCAPE {
                if cursor + 1 == address {
                    return Format::EscapedPcs(PcsByte {
                        source,
                        position: address - source,
                        value: self.byte(address),
                    });
                }
                cursor += 2;
            } else {
                cursor += 1;
            }
        }
        let value = self.byte(address);
        match self.text.symbol(value) {
            Some(symbol) => Format::Pcs(PcsFormat {
                source,
                position: address - source,
                character: symbol.to_string(),
            }),
            None => Format::ErrorPcs(PcsByte {
                source,
                position: address - source,
                value,
            }),
        }
    }

    fn table_format(&self, start: usize, table: &TableRun, address: usize) -> Format {
        let Some(location) = table.locate(address - start) else {
            return Format::Plain;
        };
        let field = start + location.segment_offset;
        match &table.segments[location.segment].kind {
            SegmentKind::Text { .. } => self.pcs_format(field, address),
            SegmentKind::Pointer => self.pointer_format(field, location.position),
            SegmentKind::Integer { length } => Format::Integer(IntegerFormat {
                source: field,
                position: location.position,
                value: self.read_value(field, *length),
                length: *length,
                enum_table: None,
                enum_name: None,
            }),
            SegmentKind::Enum { length, table } => {
                let value = self.read_value(field, *length);
                let enum_name = self
                    .enum_options(table)
                    .and_then(|options| options.get(value as usize).cloned());
                Format::Integer(IntegerFormat {
                    source: field,
                    position: location.position,
                    value,
                    length: *length,
                    enum_table: Some(table.clone()),
                    enum_name,
                })
            }
        }
    }

    /// Text of a fixed-length field, stopping at the terminator.
    fn field_text(&self, start: usize, length: usize) -> String {
        let mut text = String::new();
        let mut i = 0;
        while i < length {
            let byte = self.byte(start + i);
            if byte == END_OF_STRING {
                break;
            }
            if byte == ESCAPE {
                i += 2;
                continue;
            }
            if let Some(symbol) = self.text.symbol(byte) {
                text.push_str(symbol);
            }
            i += 1;
        }
        text
    }

    fn remove_run_recorded(&mut self, delta: &mut ModelDelta, start: usize) -> Option<Run> {
        let run = self.runs.remove(&start)?;
        delta.remove_run(run.clone());
        Some(run)
    }

    fn add_run_recorded(&mut self, delta: &mut ModelDelta, run: Run) {
        if let Some(old) = self.runs.remove(&run.start) {
            delta.remove_run(old);
        }
        delta.add_run(run.clone());
        self.runs.insert(run.start, run);
    }

    fn set_name_recorded(&mut self, delta: &mut ModelDelta, address: usize, name: &str) {
        match self.names.get(&address) {
            Some(old) if old == name => return,
            Some(old) => {
                delta.remove_name(address, old.clone());
                self.names.remove(&address);
            }
            None => {}
        }
        if !name.is_empty() {
            delta.add_name(address, name);
            self.names.insert(address, name.to_string());
        }
    }

    fn remove_unmapped_recorded(&mut self, delta: &mut ModelDelta, source: usize) {
        if let Some(name) = self.unmapped.remove(&source) {
            delta.remove_unmapped(source, name);
        }
    }

    /// Register `source` on the run starting at `destination`, creating a bare anchor if
    /// nothing starts there. Pointers into the middle of a run are not registered.
    fn add_source(&mut self, delta: &mut ModelDelta, destination: usize, source: usize) {
        if destination >= self.data.len() {
            return;
        }
        match self.runs.get(&destination) {
            Some(run) => {
                if run.sources.contains(&source) {
                    return;
                }
                let mut updated = run.clone();
                updated.sources.push(source);
                updated.sources.sort_unstable();
                self.add_run_recorded(delta, updated);
            }
            None => {
                if self.run_containing(destination).is_some() {
                    return;
                }
                let run = Run::new(destination, RunKind::NoInfo).with_sources(vec![source]);
                self.add_run_recorded(delta, run);
            }
        }
    }

    fn remove_source(&mut self, delta: &mut ModelDelta, destination: usize, source: usize) {
        let Some(run) = self.runs.get(&destination) else {
            return;
        };
        if !run.sources.contains(&source) {
            return;
        }
        let mut updated = run.clone();
        updated.sources.retain(|&s| s != source);
        let bare = updated.kind == RunKind::NoInfo
            && updated.sources.is_empty()
            && !self.names.contains_key(&destination);
        if bare {
            self.remove_run_recorded(delta, destination);
        } else {
            self.add_run_recorded(delta, updated);
        }
    }

    /// Returns `true` if `[start, end)` holds only free space (or lies past the end) and no run.
    fn is_free(&self, start: usize, end: usize) -> bool {
        let bytes_free = (start..end.min(self.data.len())).all(|a| self.data[a] == FREE_SPACE);
        let runs_free = self.next_run(start).is_none_or(|run| run.start >= end);
        bytes_free && runs_free
    }

    fn find_free_space(&self, length: usize) -> Option<usize> {
        let needed = length + RELOCATION_PADDING;
        let mut start = align4(self.free_space_start);
        while start + needed <= self.data.len() {
            if let Some(run) = self.next_run(start).filter(|run| run.start < start + needed) {
                start = align4(run.end());
                continue;
            }
            if let Some(last) = (start..start + needed).rev().find(|&a| self.data[a] != FREE_SPACE) {
                start = align4(last + 1);
                continue;
            }
            return Some(start);
        }
        None
    }

    fn register_table_pointers(&mut self, delta: &mut ModelDelta, start: usize, table: &TableRun) {
        for element in 0..table.element_count {
            for (index, segment) in table.segments.iter().enumerate() {
                if segment.kind != SegmentKind::Pointer {
                    continue;
                }
                let source = start + table.segment_offset(element, index);
                if let Some(destination) = self.read_pointer(source) {
                    self.add_source(delta, destination, source);
                }
            }
        }
    }

    fn validate_run(&self, address: usize, name: &str, run: &Run) -> Result<(), AnchorError> {
        if let RunKind::Table(table) = &run.kind {
            if run.end() > self.data.len() {
                return Err(AnchorError::TableOutOfBounds {
                    start: address,
                    length: table.length(),
                });
            }
            for segment in &table.segments {
                if let SegmentKind::Enum { table: other, .. } = &segment.kind
                    && other != name
                    && self.address_from_anchor(other).is_none()
                {
                    return Err(AnchorError::UnknownEnumTable(other.clone()));
                }
            }
        }
        let conflict = self
            .runs
            .range(address + 1..run.end())
            .map(|(_, other)| other)
            .find(|other| !other.sources.is_empty() || self.names.contains_key(&other.start));
        if let Some(other) = conflict {
            return Err(AnchorError::OverlapsAnchor {
                start: address,
                existing: other.start,
            });
        }
        Ok(())
    }
}

fn align4(address: usize) -> usize {
    address.div_ceil(4) * 4
}

impl Model for MemoryModel {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn next_run(&self, address: usize) -> Option<&Run> {
        let containing = self
            .runs
            .range(..=address)
            .next_back()
            .map(|(_, run)| run)
            .filter(|run| run.end() > address);
        containing.or_else(|| self.runs.range(address + 1..).next().map(|(_, run)| run))
    }

    fn format_at(&self, address: usize) -> Format {
        if address >= self.data.len() {
            return Format::Undefined;
        }
        let Some(run) = self.run_containing(address) else {
            return Format::Plain;
        };
        let position = address - run.start;
        match &run.kind {
            RunKind::NoInfo => Format::Plain,
            RunKind::Pointer => self.pointer_format(run.start, position),
            RunKind::PcsString { .. } => self.pcs_format(run.start, address),
            RunKind::Table(table) => self.table_format(run.start, table, address),
            RunKind::Stream { .. } => Format::StreamMarker(StreamFormat {
                source: run.start,
                position,
            }),
        }
    }

    fn text_table(&self) -> &CharacterTable {
        &self.text
    }

    fn address_from_anchor(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&address, _)| address)
    }

    fn anchor_from_address(&self, address: usize) -> Option<&str> {
        self.names.get(&address).map(String::as_str)
    }

    fn enum_options(&self, table: &str) -> Option<Vec<String>> {
        let start = self.address_from_anchor(table)?;
        let RunKind::Table(run) = &self.runs.get(&start)?.kind else {
            return None;
        };
        let (index, length) = run.segments.iter().enumerate().find_map(|(i, s)| match s.kind {
            SegmentKind::Text { length } => Some((i, length)),
            _ => None,
        })?;
        let options = (0..run.element_count)
            .map(|element| self.field_text(start + run.segment_offset(element, index), length))
            .collect();
        Some(options)
    }

    fn sources_of(&self, address: usize) -> Vec<usize> {
        let target = encode_pointer(Some(address)).to_le_bytes();
        self.data
            .chunks_exact(POINTER_SIZE)
            .enumerate()
            .filter(|(_, chunk)| *chunk == target)
            .map(|(i, _)| i * POINTER_SIZE)
            .collect()
    }

    fn unmapped_name(&self, source: usize) -> Option<&str> {
        self.unmapped.get(&source).map(String::as_str)
    }

    fn write_byte(&mut self, delta: &mut ModelDelta, address: usize, value: u8) {
        if address >= self.data.len() {
            self.expand_data(delta, address + 1);
        }
        delta.record_byte(address, self.data[address]);
        self.data[address] = value;
    }

    fn write_pointer(&mut self, delta: &mut ModelDelta, address: usize, destination: Option<usize>) {
        self.clear_format(delta, address, POINTER_SIZE);
        self.write_value(delta, address, POINTER_SIZE, encode_pointer(destination));
        let sources = self
            .runs
            .get(&address)
            .map(|run| run.sources.clone())
            .unwrap_or_default();
        self.add_run_recorded(delta, Run::new(address, RunKind::Pointer).with_sources(sources));
        if let Some(destination) = destination {
            self.add_source(delta, destination, address);
        }
    }

    fn write_unmapped_pointer(&mut self, delta: &mut ModelDelta, address: usize, name: &str) {
        self.write_pointer(delta, address, None);
        delta.add_unmapped(address, name);
        self.unmapped.insert(address, name.to_string());
    }

    fn expand_data(&mut self, delta: &mut ModelDelta, minimum_length: usize) {
        if self.data.len() >= minimum_length {
            return;
        }
        delta.record_length(self.data.len());
        self.data.resize(minimum_length, FREE_SPACE);
    }

    fn relocate_for_expansion(&mut self, delta: &mut ModelDelta, run: &Run, new_length: usize) -> Run {
        if new_length <= run.length() || self.is_free(run.end(), run.start + new_length) {
            return run.clone();
        }

        let new_start = match self.find_free_space(new_length) {
            Some(start) => start,
            None => {
                let start = align4(self.data.len());
                self.expand_data(delta, start + new_length + RELOCATION_PADDING);
                start
            }
        };
        tracing::debug!(from = run.start, to = new_start, new_length, "relocating run");

        for offset in 0..run.length() {
            let value = self.byte(run.start + offset);
            self.write_byte(delta, new_start + offset, value);
            self.write_byte(delta, run.start + offset, FREE_SPACE);
        }
        self.remove_run_recorded(delta, run.start);
        let moved = Run {
            start: new_start,
            kind: run.kind.clone(),
            sources: run.sources.clone(),
        };
        self.add_run_recorded(delta, moved.clone());
        if let Some(name) = self.names.get(&run.start).cloned() {
            self.set_name_recorded(delta, run.start, "");
            self.set_name_recorded(delta, new_start, &name);
        }
        for &source in &run.sources {
            self.write_value(delta, source, POINTER_SIZE, encode_pointer(Some(new_start)));
        }
        moved
    }

    fn apply_anchor(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        name: &str,
        format: &str,
    ) -> Result<(), AnchorError> {
        if address >= self.data.len() {
            return Err(AnchorError::OutOfData(address));
        }
        if name.eq_ignore_ascii_case(NULL_NAME) {
            return Err(AnchorError::ReservedName);
        }
        let declaration = parse_format(format)?;
        if !name.is_empty()
            && let Some(existing) = self.address_from_anchor(name)
            && existing != address
        {
            return Err(AnchorError::NameInUse {
                name: name.to_string(),
                address: existing,
            });
        }

        let existing = self.runs.get(&address).cloned();
        let mut sources = self.sources_of(address);
        if let Some(run) = &existing {
            sources.extend(run.sources.iter().copied());
        }
        sources.sort_unstable();
        sources.dedup();
        let waiting = !name.is_empty() && self.unmapped.values().any(|n| n == name);
        if name.is_empty() && sources.is_empty() && !waiting {
            return Err(AnchorError::UnnamedWithoutSources);
        }

        let kind = match declaration {
            FormatDeclaration::None => existing.as_ref().map_or(RunKind::NoInfo, |run| run.kind.clone()),
            FormatDeclaration::String => {
                let length = self
                    .text
                    .read_string(&self.data, address)
                    .ok_or(AnchorError::NotAString(address))?;
                RunKind::PcsString { length }
            }
            FormatDeclaration::Table(table) => RunKind::Table(table),
        };
        let run = Run::new(address, kind).with_sources(sources);
        self.validate_run(address, name, &run)?;

        // validated: from here on every change is recorded
        let keeps_existing = existing.as_ref().is_some_and(|old| old.kind == run.kind);
        if !keeps_existing {
            self.clear_format(delta, address, run.length());
        }
        self.add_run_recorded(delta, run.clone());
        self.set_name_recorded(delta, address, name);
        if let RunKind::Table(table) = &run.kind {
            self.register_table_pointers(delta, address, table);
        }

        if !name.is_empty() {
            let waiting: Vec<usize> = self
                .unmapped
                .iter()
                .filter(|(_, n)| n.as_str() == name)
                .map(|(&source, _)| source)
                .collect();
            for source in waiting {
                self.remove_unmapped_recorded(delta, source);
                self.write_value(delta, source, POINTER_SIZE, encode_pointer(Some(address)));
                self.add_source(delta, address, source);
            }
        }
        tracing::debug!(address, name, format, "anchor applied");
        Ok(())
    }

    fn observe_run_written(&mut self, delta: &mut ModelDelta, mut run: Run) {
        if let Some(existing) = self.runs.get(&run.start) {
            run.sources.extend(existing.sources.iter().copied());
            run.sources.sort_unstable();
            run.sources.dedup();
        }
        self.clear_format(delta, run.start, run.length());
        self.add_run_recorded(delta, run);
    }

    fn clear_format(&mut self, delta: &mut ModelDelta, start: usize, length: usize) {
        let end = start + length;
        let first = self.run_containing(start).map_or(start, |run| run.start);
        if first >= end {
            return;
        }
        let starts: Vec<usize> = self.runs.range(first..end).map(|(&s, _)| s).collect();
        for run_start in starts {
            // earlier iterations may have removed or changed this run
            let Some(run) = self.runs.get(&run_start).cloned() else {
                continue;
            };
            if run.kind == RunKind::NoInfo {
                continue;
            }
            self.remove_run_recorded(delta, run_start);
            if run.kind == RunKind::Pointer {
                if let Some(destination) = self.read_pointer(run_start) {
                    self.remove_source(delta, destination, run_start);
                }
                self.remove_unmapped_recorded(delta, run_start);
            }
            if !run.sources.is_empty() || self.names.contains_key(&run_start) {
                let anchor = Run::new(run_start, RunKind::NoInfo).with_sources(run.sources);
                self.add_run_recorded(delta, anchor);
            }
        }
    }

    fn poke(&mut self, address: usize, value: u8) -> u8 {
        if address >= self.data.len() {
            self.data.resize(address + 1, FREE_SPACE);
        }
        std::mem::replace(&mut self.data[address], value)
    }

    fn resize(&mut self, length: usize) {
        self.data.resize(length, FREE_SPACE);
    }

    fn mass_update(&mut self, update: MetadataUpdate) {
        for start in update.remove_runs {
            self.runs.remove(&start);
        }
        for run in update.add_runs {
            self.runs.insert(run.start, run);
        }
        for address in update.remove_names {
            self.names.remove(&address);
        }
        for (address, name) in update.add_names {
            self.names.insert(address, name);
        }
        for source in update.remove_unmapped {
            self.unmapped.remove(&source);
        }
        for (source, name) in update.add_unmapped {
            self.unmapped.insert(source, name);
        }
    }

    fn load(&mut self, data: Vec<u8>, metadata: Option<&str>) -> Result<(), MetadataError> {
        let stored = metadata
            .map(serde_json::from_str::<StoredMetadata>)
            .transpose()?;
        self.data = data;
        if let Some(stored) = stored {
            self.replace_metadata(stored);
        }
        self.prune_metadata();
        Ok(())
    }
}
