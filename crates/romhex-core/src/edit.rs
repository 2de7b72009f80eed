//! Keystroke rules for in-place editing.
//!
//! These are pure functions of a cell's [`Format`] and the text typed so far. The
//! [`Editor`](crate::Editor) uses them to decide whether to take a keystroke, what kind of
//! edit it starts, how many cells the edit covers, and when it is finished.
//!
//! | edit       | starts with                              | finishes when                        |
//! |------------|------------------------------------------|--------------------------------------|
//! | pointer    | `<`, or any letter/digit on a pointer    | closed by `>`                        |
//! | anchor     | `^`                                      | trailing whitespace, balanced `[]""` |
//! | goto       | `@`                                      | trailing whitespace                  |
//! | character  | `"` or the start of a symbol             | a whole symbol, or a lone `"`        |
//! | escaped    | hex digit                                | two digits                           |
//! | integer    | digit (names too for enumerations)       | trailing whitespace                  |
//! | hex        | hex digit                                | two digits                           |

use crate::anchor::is_declaration_complete;
use crate::format::Format;
use crate::model::POINTER_SIZE;
use romhex_text::{CharacterTable, DELIMITER};

/// Cells reserved while an anchor declaration is typed.
pub const ANCHOR_EDIT_WIDTH: usize = 4;

const ANCHOR_PUNCTUATION: &str = "^[]()\"<>|!?-_=+*.:/";
const GOTO_PUNCTUATION: &str = "._-";
const POINTER_PUNCTUATION: &str = "_.+>";
const ENUM_START: &str = "\"?-";
const ENUM_PUNCTUATION: &str = "'._-~\"?";

/// What an open edit will produce when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    /// A 4-byte pointer, `<name>` or `<hex>`.
    Pointer,
    /// An anchor declaration, `^name format`.
    Anchor,
    /// A jump, `@target`.
    Goto,
    /// One symbol of a string.
    Character,
    /// The raw byte after an escape inside a string.
    EscapedByte,
    /// A decimal value or enumeration name.
    Integer,
    /// One raw byte as two hex digits.
    Hex,
}

/// Classify an edit from the format being edited and the text typed so far.
pub fn edit_kind(original: &Format, text: &str) -> EditKind {
    if text.starts_with('^') {
        return EditKind::Anchor;
    }
    if text.starts_with('@') {
        return EditKind::Goto;
    }
    match original.committed().unwrap_anchor() {
        Format::Pcs(_) | Format::ErrorPcs(_) => EditKind::Character,
        Format::EscapedPcs(_) => EditKind::EscapedByte,
        Format::Integer(_) => EditKind::Integer,
        Format::Pointer(_) => EditKind::Pointer,
        _ if text.starts_with('<') => EditKind::Pointer,
        _ => EditKind::Hex,
    }
}

/// Returns `true` if `input` may be typed into a cell showing `format`.
///
/// For a committed cell this is the rule for starting an edit; for a cell under edit it is
/// the continuation rule of the open edit.
pub fn should_accept_input(format: &Format, input: char, table: &CharacterTable) -> bool {
    match format {
        Format::UnderEdit(edit) if !edit.text.is_empty() => {
            accepts_continuation(&edit.original, &edit.text, input, table)
        }
        Format::UnderEdit(edit) => accepts_start(&edit.original, input, table),
        committed => accepts_start(committed, input, table),
    }
}

fn accepts_start(format: &Format, input: char, table: &CharacterTable) -> bool {
    if input == '^' || input == '@' {
        return true;
    }
    match format.committed().unwrap_anchor() {
        Format::Pcs(pcs) => accepts_first_character(pcs.position, input, table),
        Format::ErrorPcs(pcs) => accepts_first_character(pcs.position, input, table),
        Format::EscapedPcs(_) => input.is_ascii_hexdigit(),
        Format::Pointer(_) => input == '<' || input.is_ascii_alphanumeric(),
        Format::Integer(integer) => {
            input.is_ascii_digit()
                || (integer.enum_table.is_some()
                    && (input.is_alphabetic() || ENUM_START.contains(input)))
        }
        Format::Undefined
        | Format::Plain
        | Format::StreamMarker(_)
        | Format::UnderEdit(_)
        | Format::Anchor(_) => input == '<' || input.is_ascii_hexdigit(),
    }
}

fn accepts_first_character(position: usize, input: char, table: &CharacterTable) -> bool {
    // strings and text fields never start with a space
    if position == 0 && input == ' ' {
        return false;
    }
    input == DELIMITER || table.any_starts_with(input.encode_utf8(&mut [0; 4]))
}

fn accepts_continuation(original: &Format, text: &str, input: char, table: &CharacterTable) -> bool {
    match edit_kind(original, text) {
        EditKind::Pointer => {
            !text.ends_with('>')
                && (input.is_ascii_alphanumeric() || POINTER_PUNCTUATION.contains(input))
        }
        EditKind::Anchor => {
            input.is_alphanumeric() || input.is_whitespace() || ANCHOR_PUNCTUATION.contains(input)
        }
        EditKind::Goto => {
            input.is_alphanumeric() || input.is_whitespace() || GOTO_PUNCTUATION.contains(input)
        }
        EditKind::Character => {
            let typed = text.strip_prefix(DELIMITER).unwrap_or(text);
            let mut candidate = typed.to_string();
            candidate.push(input);
            table.any_starts_with(&candidate)
        }
        EditKind::EscapedByte | EditKind::Hex => input.is_ascii_hexdigit() && text.len() < 2,
        EditKind::Integer => {
            let enumerated = matches!(
                original.committed().unwrap_anchor(),
                Format::Integer(integer) if integer.enum_table.is_some()
            );
            input.is_ascii_digit()
                || input.is_whitespace()
                || (enumerated && (input.is_alphanumeric() || ENUM_PUNCTUATION.contains(input)))
        }
    }
}

/// Text of a new edit started by `input` on a cell showing `format`.
///
/// Typing a name or address straight onto a pointer implies the opening `<`.
pub fn start_text(format: &Format, input: char) -> String {
    let implied_pointer = matches!(format.committed().unwrap_anchor(), Format::Pointer(_))
        && !matches!(input, '<' | '^' | '@');
    if implied_pointer {
        format!("<{input}")
    } else {
        input.to_string()
    }
}

/// Number of cells an edit of `kind` covers, starting at the edit point.
pub fn edit_width(kind: EditKind, original: &Format) -> usize {
    match kind {
        EditKind::Pointer => POINTER_SIZE,
        EditKind::Anchor => ANCHOR_EDIT_WIDTH,
        EditKind::Integer => match original.committed().unwrap_anchor() {
            Format::Integer(integer) => integer.length,
            _ => 1,
        },
        EditKind::Goto | EditKind::Character | EditKind::EscapedByte | EditKind::Hex => 1,
    }
}

/// Returns `true` if the typed text is a finished edit of `kind`.
pub fn is_complete(kind: EditKind, original: &Format, text: &str, table: &CharacterTable) -> bool {
    match kind {
        EditKind::Pointer => text.len() >= 2 && text.ends_with('>'),
        EditKind::Anchor => is_declaration_complete(text),
        EditKind::Goto => text.ends_with(char::is_whitespace),
        EditKind::Character => {
            if is_string_end(original, text) {
                return true;
            }
            let typed = text.strip_prefix(DELIMITER).unwrap_or(text);
            !typed.is_empty() && table.byte_for(typed).is_some()
        }
        EditKind::EscapedByte | EditKind::Hex => text.len() >= 2,
        EditKind::Integer => {
            !text.trim().is_empty()
                && text.ends_with(char::is_whitespace)
                && text.matches('"').count() % 2 == 0
        }
    }
}

/// Returns `true` if `text` ends the string early: a bare delimiter typed after its first
/// character.
pub fn is_string_end(original: &Format, text: &str) -> bool {
    let position = match original.committed().unwrap_anchor() {
        Format::Pcs(pcs) => pcs.position,
        Format::ErrorPcs(pcs) => pcs.position,
        _ => return false,
    };
    position != 0 && text.len() == 1 && text.starts_with(DELIMITER)
}
