//! How one byte of the buffer is interpreted.
//!
//! A [`Format`] is produced by the model for every visible address and consumed read-only by
//! the editor, except for [`Format::UnderEdit`], which the editor builds while the user types.
//! Multi-byte structures (pointers, integers) give every covered byte its own format value
//! carrying the structure's `source` address and the byte's `position` within it.

use crate::delta::ModelDelta;
use crate::model::{FREE_SPACE, Model, POINTER_SIZE};

/// A cell being typed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnderEdit {
    /// Format the cell had before the edit started.
    pub original: Box<Format>,
    /// Text typed so far.
    pub text: String,
    /// Number of cells the edit spans.
    pub edit_width: usize,
}

/// One byte of a stored pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerFormat {
    /// Address of the pointer's first byte.
    pub source: usize,
    /// Offset of this byte within the pointer (0..4).
    pub position: usize,
    /// Where it points. `None` for the null pointer.
    pub destination: Option<usize>,
    /// Anchor name at the destination, or the name an unmapped pointer waits for.
    pub name: Option<String>,
}

/// Decoration for the first byte of a named or pointed-to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorFormat {
    /// Format of the byte itself.
    pub inner: Box<Format>,
    /// Anchor name, possibly empty.
    pub name: String,
    /// Run format in declaration syntax, possibly empty.
    pub format: String,
    /// Addresses of pointers to this run.
    pub sources: Vec<usize>,
}

/// One decoded character of a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcsFormat {
    /// Start of the string or text field.
    pub source: usize,
    /// Offset within it.
    pub position: usize,
    /// Displayed symbol.
    pub character: String,
}

/// A raw byte inside a string: the byte after an escape, or one with no symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcsByte {
    /// Start of the string or text field.
    pub source: usize,
    /// Offset within it.
    pub position: usize,
    /// The byte.
    pub value: u8,
}

/// One byte of a fixed-width integer field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerFormat {
    /// Address of the field's first byte.
    pub source: usize,
    /// Offset of this byte within the field.
    pub position: usize,
    /// Decoded little-endian value.
    pub value: u32,
    /// Field width in bytes.
    pub length: usize,
    /// For enumerated fields, the table providing names.
    pub enum_table: Option<String>,
    /// For enumerated fields, the name of `value` if it has one.
    pub enum_name: Option<String>,
}

/// One byte of opaque domain-specific data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Start of the stream.
    pub source: usize,
    /// Offset within it.
    pub position: usize,
}

/// Interpretation of one byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Format {
    /// Outside the data.
    #[default]
    Undefined,
    /// Unclassified byte.
    Plain,
    /// Being typed into.
    UnderEdit(UnderEdit),
    /// Part of a stored pointer.
    Pointer(PointerFormat),
    /// First byte of an anchored run.
    Anchor(AnchorFormat),
    /// A character of a string.
    Pcs(PcsFormat),
    /// The raw byte following an escape.
    EscapedPcs(PcsByte),
    /// A byte inside a string that has no symbol.
    ErrorPcs(PcsByte),
    /// Part of an integer field.
    Integer(IntegerFormat),
    /// Part of an opaque stream.
    StreamMarker(StreamFormat),
}

impl Format {
    /// The format underneath any anchor decoration.
    pub fn unwrap_anchor(&self) -> &Format {
        match self {
            Format::Anchor(anchor) => anchor.inner.unwrap_anchor(),
            other => other,
        }
    }

    /// The format a cell had before editing started, or the format itself.
    pub fn committed(&self) -> &Format {
        match self {
            Format::UnderEdit(edit) => edit.original.committed(),
            other => other,
        }
    }

    /// Returns `true` for [`Format::UnderEdit`].
    pub fn is_under_edit(&self) -> bool {
        matches!(self, Format::UnderEdit(_))
    }

    /// Address range of the multi-byte field this byte belongs to, if any.
    pub fn field(&self) -> Option<(usize, usize)> {
        match self.unwrap_anchor() {
            Format::Pointer(pointer) => Some((pointer.source, POINTER_SIZE)),
            Format::Integer(integer) => Some((integer.source, integer.length)),
            _ => None,
        }
    }

    /// Text for the byte `value` under this format.
    ///
    /// Multi-byte fields render their whole text (`<name>`, `42`) for every byte; the caller
    /// decides which cell shows it.
    pub fn to_text(&self, value: u8) -> String {
        match self {
            Format::Undefined => String::new(),
            Format::Plain
            | Format::EscapedPcs(_)
            | Format::ErrorPcs(_)
            | Format::StreamMarker(_) => format!("{value:02X}"),
            Format::UnderEdit(edit) => edit.text.clone(),
            Format::Pointer(pointer) => match (&pointer.name, pointer.destination) {
                (Some(name), _) => format!("<{name}>"),
                (None, Some(destination)) => format!("<{destination:06X}>"),
                (None, None) => "<null>".to_string(),
            },
            Format::Anchor(anchor) => anchor.inner.to_text(value),
            Format::Pcs(pcs) => pcs.character.clone(),
            Format::Integer(integer) => match &integer.enum_name {
                Some(name) => name.clone(),
                None => integer.value.to_string(),
            },
        }
    }

    /// Reset the bytes behind this format to their empty value.
    ///
    /// Pointers become null, integers become zero, and everything else becomes free space.
    pub fn clear_data<M: Model + ?Sized>(&self, model: &mut M, delta: &mut ModelDelta, address: usize) {
        match self {
            Format::Undefined => {}
            Format::UnderEdit(edit) => edit.original.clear_data(model, delta, address),
            Format::Anchor(anchor) => anchor.inner.clear_data(model, delta, address),
            Format::Pointer(pointer) => model.write_value(delta, pointer.source, POINTER_SIZE, 0),
            Format::Integer(integer) => model.write_value(delta, integer.source, integer.length, 0),
            Format::Plain
            | Format::Pcs(_)
            | Format::EscapedPcs(_)
            | Format::ErrorPcs(_)
            | Format::StreamMarker(_) => model.write_byte(delta, address, FREE_SPACE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer(name: Option<&str>, destination: Option<usize>) -> Format {
        Format::Pointer(PointerFormat {
            source: 0x10,
            position: 2,
            destination,
            name: name.map(str::to_string),
        })
    }

    #[test]
    fn pointer_text_prefers_the_name() {
        assert_eq!(pointer(Some("items"), Some(0x40)).to_text(0), "<items>");
        assert_eq!(pointer(None, Some(0x40)).to_text(0), "<000040>");
        assert_eq!(pointer(None, None).to_text(0), "<null>");
    }

    #[test]
    fn anchors_render_and_report_fields_through_the_inner_format() {
        let anchored = Format::Anchor(AnchorFormat {
            inner: Box::new(pointer(None, Some(0x40))),
            name: "table".to_string(),
            format: String::new(),
            sources: vec![],
        });
        assert_eq!(anchored.to_text(0), "<000040>");
        assert_eq!(anchored.field(), Some((0x10, 4)));
        assert_eq!(Format::Plain.to_text(0xAB), "AB");
        assert_eq!(Format::Plain.field(), None);
    }

    #[test]
    fn enumerated_integers_show_their_name() {
        let mut integer = IntegerFormat {
            source: 0,
            position: 0,
            value: 3,
            length: 1,
            enum_table: Some("types".to_string()),
            enum_name: Some("Fire".to_string()),
        };
        assert_eq!(Format::Integer(integer.clone()).to_text(3), "Fire");
        integer.enum_name = None;
        assert_eq!(Format::Integer(integer).to_text(3), "3");
    }
}
