//! The byte buffer and its registry of classified runs.
//!
//! The editor never owns the bytes. It talks to a [`Model`], which stores the data and the
//! runs describing what is where (pointers, strings, tables), and answers the editor's
//! questions about them. Every write takes the open [`ModelDelta`] so that it can be undone.
//!
//! [`MemoryModel`](crate::MemoryModel) is the in-memory implementation.

use crate::delta::ModelDelta;
use crate::error::{AnchorError, MetadataError};
use crate::format::Format;
use romhex_text::CharacterTable;
use serde::{Deserialize, Serialize};

/// Address at which the cartridge is mapped. Stored pointers are `address + POINTER_BASE`.
pub const POINTER_BASE: usize = 0x0800_0000;

/// Largest mappable cartridge size.
pub const MAX_ROM_SIZE: usize = 0x0200_0000;

/// Width of a stored pointer in bytes.
pub const POINTER_SIZE: usize = 4;

/// Byte value of unused space.
pub const FREE_SPACE: u8 = 0xFF;

/// Anchor name reserved for the null pointer.
pub const NULL_NAME: &str = "null";

/// Encode a destination as the 32-bit value stored in the buffer. `None` is the null pointer.
pub fn encode_pointer(destination: Option<usize>) -> u32 {
    match destination {
        Some(address) => (address + POINTER_BASE) as u32,
        None => 0,
    }
}

/// Decode a stored 32-bit value. Returns `None` for null and for values outside the
/// cartridge mapping.
pub fn decode_pointer(value: u32) -> Option<usize> {
    let value = value as usize;
    (POINTER_BASE..POINTER_BASE + MAX_ROM_SIZE)
        .contains(&value)
        .then(|| value - POINTER_BASE)
}

/// One field of a table element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Field name.
    pub name: String,
    /// Field layout.
    pub kind: SegmentKind,
}

/// Layout of a table field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Fixed-length text, terminated early by the end-of-string byte.
    Text {
        /// Bytes reserved for the field.
        length: usize,
    },
    /// Little-endian unsigned integer.
    Integer {
        /// Width in bytes: 1, 2 or 4.
        length: usize,
    },
    /// Integer whose values name the elements of another table.
    Enum {
        /// Width in bytes: 1, 2 or 4.
        length: usize,
        /// Anchor name of the table providing the names.
        table: String,
    },
    /// Stored pointer.
    Pointer,
}

impl Segment {
    /// Width of the field in bytes.
    pub fn length(&self) -> usize {
        match &self.kind {
            SegmentKind::Text { length }
            | SegmentKind::Integer { length }
            | SegmentKind::Enum { length, .. } => *length,
            SegmentKind::Pointer => POINTER_SIZE,
        }
    }

    /// The field in declaration syntax, e.g. `name""10` or `type.types`.
    pub fn declaration(&self) -> String {
        let suffix = match &self.kind {
            SegmentKind::Text { length } => format!("\"\"{length}"),
            SegmentKind::Integer { length } => integer_marker(*length).to_string(),
            SegmentKind::Enum { length, table } => format!("{}{table}", integer_marker(*length)),
            SegmentKind::Pointer => "<>".to_string(),
        };
        format!("{}{suffix}", self.name)
    }
}

fn integer_marker(length: usize) -> &'static str {
    match length {
        1 => ".",
        2 => ":",
        _ => "::",
    }
}

/// A repeated fixed-width record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRun {
    /// Number of elements.
    pub element_count: usize,
    /// Fields of one element, in order.
    pub segments: Vec<Segment>,
}

/// Where an address falls inside a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLocation {
    /// Element index.
    pub element: usize,
    /// Segment index within the element.
    pub segment: usize,
    /// Offset of the segment from the table start.
    pub segment_offset: usize,
    /// Offset of the address within the segment.
    pub position: usize,
}

impl TableRun {
    /// Width of one element in bytes.
    pub fn element_width(&self) -> usize {
        self.segments.iter().map(Segment::length).sum()
    }

    /// Width of the whole table in bytes.
    pub fn length(&self) -> usize {
        self.element_width() * self.element_count
    }

    /// Locate `offset` (relative to the table start).
    pub fn locate(&self, offset: usize) -> Option<TableLocation> {
        let width = self.element_width();
        if width == 0 || offset >= self.length() {
            return None;
        }
        let element = offset / width;
        let mut within = offset % width;
        let mut segment_offset = element * width;
        for (segment, field) in self.segments.iter().enumerate() {
            if within < field.length() {
                return Some(TableLocation {
                    element,
                    segment,
                    segment_offset,
                    position: within,
                });
            }
            within -= field.length();
            segment_offset += field.length();
        }
        None
    }

    /// Offset of segment `segment` of element `element` from the table start.
    pub fn segment_offset(&self, element: usize, segment: usize) -> usize {
        element * self.element_width()
            + self.segments[..segment].iter().map(Segment::length).sum::<usize>()
    }

    /// The table in declaration syntax, e.g. `[name""10 hp.]13`.
    pub fn declaration(&self) -> String {
        let segments: Vec<String> = self.segments.iter().map(Segment::declaration).collect();
        format!("[{}]{}", segments.join(" "), self.element_count)
    }
}

/// What a run holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunKind {
    /// Nothing known except that something points here or it has a name.
    NoInfo,
    /// A stored pointer.
    Pointer,
    /// A terminated string.
    PcsString {
        /// Length including the terminator.
        length: usize,
    },
    /// A table of records.
    Table(TableRun),
    /// Domain-specific data shown opaquely.
    Stream {
        /// Length in bytes.
        length: usize,
    },
}

/// A classified range of the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// First address.
    pub start: usize,
    /// What the range holds.
    pub kind: RunKind,
    /// Addresses of pointers that refer to `start`.
    pub sources: Vec<usize>,
}

impl Run {
    /// Create a run with no sources.
    pub fn new(start: usize, kind: RunKind) -> Self {
        Self {
            start,
            kind,
            sources: Vec::new(),
        }
    }

    /// Attach pointer sources.
    pub fn with_sources(mut self, sources: Vec<usize>) -> Self {
        self.sources = sources;
        self
    }

    /// Length in bytes. Runs without content occupy one byte.
    pub fn length(&self) -> usize {
        match &self.kind {
            RunKind::NoInfo => 1,
            RunKind::Pointer => POINTER_SIZE,
            RunKind::PcsString { length } | RunKind::Stream { length } => *length,
            RunKind::Table(table) => table.length(),
        }
    }

    /// One past the last address.
    pub fn end(&self) -> usize {
        self.start + self.length()
    }

    /// Returns `true` if `address` is inside the run.
    pub fn contains(&self, address: usize) -> bool {
        (self.start..self.end()).contains(&address)
    }

    /// The run's format in anchor declaration syntax. Empty when there is none.
    pub fn format_string(&self) -> String {
        match &self.kind {
            RunKind::PcsString { .. } => "\"\"".to_string(),
            RunKind::Table(table) => table.declaration(),
            RunKind::NoInfo | RunKind::Pointer | RunKind::Stream { .. } => String::new(),
        }
    }
}

/// Metadata to restore when a delta is reverted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    /// Starts of runs to remove.
    pub remove_runs: Vec<usize>,
    /// Runs to (re)insert, after removal.
    pub add_runs: Vec<Run>,
    /// Addresses whose name must go.
    pub remove_names: Vec<usize>,
    /// Names to (re)insert.
    pub add_names: Vec<(usize, String)>,
    /// Pointer sources no longer waiting for a name.
    pub remove_unmapped: Vec<usize>,
    /// Pointer sources waiting for a name.
    pub add_unmapped: Vec<(usize, String)>,
}

/// A byte buffer with a registry of runs and anchor names.
///
/// Recording methods take the open [`ModelDelta`]; the raw primitives
/// ([`poke`](Self::poke), [`resize`](Self::resize), [`mass_update`](Self::mass_update)) exist only
/// for [`ModelDelta::revert`] and bypass recording.
pub trait Model {
    /// Length of the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole buffer.
    fn data(&self) -> &[u8];

    /// Byte at `address`, or [`FREE_SPACE`] past the end.
    fn byte(&self, address: usize) -> u8 {
        self.data().get(address).copied().unwrap_or(FREE_SPACE)
    }

    /// Little-endian value of `length` bytes at `address`.
    fn read_value(&self, address: usize, length: usize) -> u32 {
        (0..length.min(4)).fold(0, |value, i| value | (self.byte(address + i) as u32) << (8 * i))
    }

    /// Destination of the pointer stored at `address`, if it is a valid non-null pointer.
    fn read_pointer(&self, address: usize) -> Option<usize> {
        if address + POINTER_SIZE > self.len() {
            return None;
        }
        decode_pointer(self.read_value(address, POINTER_SIZE))
    }

    /// The first run that ends after `address`: the run containing it, or the next one.
    fn next_run(&self, address: usize) -> Option<&Run>;

    /// The run containing `address`.
    fn run_containing(&self, address: usize) -> Option<&Run> {
        self.next_run(address).filter(|run| run.start <= address)
    }

    /// How the byte at `address` should be interpreted. Never returns an anchor decoration.
    fn format_at(&self, address: usize) -> Format;

    /// Character table used for text.
    fn text_table(&self) -> &CharacterTable;

    /// Address that carries `name`.
    fn address_from_anchor(&self, name: &str) -> Option<usize>;

    /// Name carried by `address`.
    fn anchor_from_address(&self, address: usize) -> Option<&str>;

    /// Names of the elements of the table anchored at `table`, taken from its first text
    /// field.
    fn enum_options(&self, table: &str) -> Option<Vec<String>>;

    /// Addresses of stored pointers whose destination is `address`.
    fn sources_of(&self, address: usize) -> Vec<usize>;

    /// Name a pointer at `source` is waiting for, if it was written before the name existed.
    fn unmapped_name(&self, source: usize) -> Option<&str>;

    /// Write one byte, growing the buffer if `address` is at or past the end.
    fn write_byte(&mut self, delta: &mut ModelDelta, address: usize, value: u8);

    /// Write `length` bytes of `value`, little-endian.
    fn write_value(&mut self, delta: &mut ModelDelta, address: usize, length: usize, value: u32) {
        for i in 0..length {
            self.write_byte(delta, address + i, (value >> (8 * i)) as u8);
        }
    }

    /// Store a pointer to `destination` (null for `None`) and register it as a source.
    fn write_pointer(&mut self, delta: &mut ModelDelta, address: usize, destination: Option<usize>);

    /// Store a null pointer that will be repointed once an anchor called `name` exists.
    fn write_unmapped_pointer(&mut self, delta: &mut ModelDelta, address: usize, name: &str);

    /// Grow the buffer with free space until it is at least `minimum_length` long.
    fn expand_data(&mut self, delta: &mut ModelDelta, minimum_length: usize);

    /// Make room for `run` to become `new_length` bytes long.
    ///
    /// Returns the run at its (possibly new) location. When the run moves, its bytes, name and
    /// sources move with it and the old bytes become free space.
    fn relocate_for_expansion(&mut self, delta: &mut ModelDelta, run: &Run, new_length: usize) -> Run;

    /// Apply an anchor declaration: name `address` and give it `format`.
    ///
    /// The declaration is checked completely before anything is recorded.
    fn apply_anchor(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        name: &str,
        format: &str,
    ) -> Result<(), AnchorError>;

    /// Register `run`, replacing whatever overlaps it.
    fn observe_run_written(&mut self, delta: &mut ModelDelta, run: Run);

    /// Remove the formats of runs overlapping the range. Anchors survive as bare anchors.
    fn clear_format(&mut self, delta: &mut ModelDelta, start: usize, length: usize);

    /// Remove the formats of runs overlapping the range and fill it with free space.
    fn clear_format_and_data(&mut self, delta: &mut ModelDelta, start: usize, length: usize) {
        self.clear_format(delta, start, length);
        for address in start..(start + length).min(self.len()) {
            self.write_byte(delta, address, FREE_SPACE);
        }
    }

    /// Set a byte without recording it. Returns the previous value.
    fn poke(&mut self, address: usize, value: u8) -> u8;

    /// Set the buffer length without recording it. New bytes are free space.
    fn resize(&mut self, length: usize);

    /// Replace metadata without recording it.
    fn mass_update(&mut self, update: MetadataUpdate);

    /// Replace the buffer contents without recording it.
    ///
    /// `metadata` is a blob in the form written by
    /// [`MemoryModel::export_metadata`](crate::MemoryModel::export_metadata) and replaces all
    /// metadata. Without one the current metadata is kept. Either way anything that no longer
    /// fits inside the new data is dropped. An unreadable blob changes nothing.
    fn load(&mut self, data: Vec<u8>, metadata: Option<&str>) -> Result<(), MetadataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableRun {
        TableRun {
            element_count: 3,
            segments: vec![
                Segment {
                    name: "name".to_string(),
                    kind: SegmentKind::Text { length: 6 },
                },
                Segment {
                    name: "hp".to_string(),
                    kind: SegmentKind::Integer { length: 2 },
                },
            ],
        }
    }

    #[test]
    fn pointers_encode_relative_to_the_cartridge_base() {
        assert_eq!(encode_pointer(Some(0x123)), 0x0800_0123);
        assert_eq!(encode_pointer(None), 0);
        assert_eq!(decode_pointer(0x0800_0123), Some(0x123));
        assert_eq!(decode_pointer(0), None);
        assert_eq!(decode_pointer(0x1234), None);
    }

    #[test]
    fn table_locates_fields() {
        let table = table();
        assert_eq!(table.element_width(), 8);
        assert_eq!(table.length(), 24);
        let location = table.locate(8 + 7).unwrap();
        assert_eq!(location.element, 1);
        assert_eq!(location.segment, 1);
        assert_eq!(location.segment_offset, 14);
        assert_eq!(location.position, 1);
        assert_eq!(table.locate(24), None);
        assert_eq!(table.segment_offset(2, 1), 22);
    }

    #[test]
    fn table_declaration_lists_segments() {
        assert_eq!(table().declaration(), "[name\"\"6 hp:]3");
    }
}
