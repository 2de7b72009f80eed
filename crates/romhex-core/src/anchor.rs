//! Anchor declaration grammar.
//!
//! An anchor declaration names an address and optionally says what lives there:
//!
//! ```text
//! ^name                     bare anchor
//! ^name""                   terminated string
//! ^name[label""10 hp.]13    table of 13 elements: 10-byte text, 1-byte integer
//! ```
//!
//! Table segments are `name""N` (text), `name.` / `name:` / `name::` (1-, 2-, 4-byte
//! integers), `name.table` / `name:table` (enumeration over another table's names) and
//! `name<>` (pointer).

use crate::error::AnchorError;
use crate::model::{NULL_NAME, Segment, SegmentKind, TableRun};
use regex::Regex;
use std::sync::LazyLock;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\^(?P<name>[A-Za-z0-9_.]*)(?P<format>.*)$").expect("valid declaration regex")
});

static TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<segments>[^\[\]]*)\](?P<count>\d+)$").expect("valid table regex")
});

static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?:""(?P<text>\d+)|(?P<pointer><>)|(?P<int>::|:|\.)(?P<table>[A-Za-z_][A-Za-z0-9_.]*)?)$"#,
    )
    .expect("valid segment regex")
});

/// What an anchor declaration says about the data at its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatDeclaration {
    /// Nothing: keep whatever run is there.
    None,
    /// A terminated string.
    String,
    /// A table.
    Table(TableRun),
}

/// A parsed `^name format` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorDeclaration {
    /// Anchor name, possibly empty.
    pub name: String,
    /// Declared format.
    pub format: FormatDeclaration,
}

/// Parse the text of an anchor edit, including the leading `^`. Surrounding whitespace is
/// ignored.
pub fn parse_declaration(text: &str) -> Result<AnchorDeclaration, AnchorError> {
    let (name, format) = split_declaration(text)?;
    if name.eq_ignore_ascii_case(NULL_NAME) {
        return Err(AnchorError::ReservedName);
    }
    let format = parse_format(format)?;
    Ok(AnchorDeclaration {
        name: name.to_string(),
        format,
    })
}

/// Split a declaration into its name and the unparsed format text.
pub fn split_declaration(text: &str) -> Result<(&str, &str), AnchorError> {
    let text = text.trim();
    let captures = DECLARATION
        .captures(text)
        .ok_or_else(|| AnchorError::UnknownFormat(text.to_string()))?;
    let name = captures.name("name").map_or("", |m| m.as_str());
    let format = captures.name("format").map_or("", |m| m.as_str().trim());
    Ok((name, format))
}

/// Parse the format part of a declaration.
pub fn parse_format(format: &str) -> Result<FormatDeclaration, AnchorError> {
    let format = format.trim();
    if format.is_empty() {
        return Ok(FormatDeclaration::None);
    }
    if format == "\"\"" {
        return Ok(FormatDeclaration::String);
    }
    let unknown = || AnchorError::UnknownFormat(format.to_string());
    let captures = TABLE.captures(format).ok_or_else(unknown)?;
    let element_count: usize = captures["count"].parse().map_err(|_| unknown())?;
    let segments = captures["segments"]
        .split_whitespace()
        .map(parse_segment)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(unknown)?;
    if segments.is_empty() || element_count == 0 {
        return Err(unknown());
    }
    Ok(FormatDeclaration::Table(TableRun {
        element_count,
        segments,
    }))
}

fn parse_segment(text: &str) -> Option<Segment> {
    let captures = SEGMENT.captures(text)?;
    let name = captures["name"].to_string();
    let kind = if let Some(length) = captures.name("text") {
        let length: usize = length.as_str().parse().ok()?;
        if length == 0 {
            return None;
        }
        SegmentKind::Text { length }
    } else if captures.name("pointer").is_some() {
        SegmentKind::Pointer
    } else {
        let length = match captures.name("int")?.as_str() {
            "." => 1,
            ":" => 2,
            _ => 4,
        };
        match captures.name("table") {
            Some(table) => SegmentKind::Enum {
                length,
                table: table.as_str().to_string(),
            },
            None => SegmentKind::Integer { length },
        }
    };
    Some(Segment { name, kind })
}

/// Returns `true` once a partially typed declaration can be submitted: it ends in whitespace,
/// every `[` is closed, and quotes are paired.
pub fn is_declaration_complete(text: &str) -> bool {
    if !text.ends_with(char::is_whitespace) {
        return false;
    }
    let opened = text.matches('[').count();
    let closed = text.matches(']').count();
    let quotes = text.matches('"').count();
    opened == closed && quotes % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_and_string_declarations() {
        assert_eq!(
            parse_declaration("^start ").unwrap(),
            AnchorDeclaration {
                name: "start".to_string(),
                format: FormatDeclaration::None,
            }
        );
        let string = parse_declaration("^data.names\"\"").unwrap();
        assert_eq!(string.name, "data.names");
        assert_eq!(string.format, FormatDeclaration::String);
    }

    #[test]
    fn table_declaration_with_every_segment_kind() {
        let declaration = parse_declaration("^mons[name\"\"10 hp. atk: id:: type.types ptr<>]4").unwrap();
        let FormatDeclaration::Table(table) = declaration.format else {
            panic!("expected a table");
        };
        assert_eq!(table.element_count, 4);
        assert_eq!(table.element_width(), 10 + 1 + 2 + 4 + 1 + 4);
        assert_eq!(
            table.segments[4].kind,
            SegmentKind::Enum {
                length: 1,
                table: "types".to_string()
            }
        );
        assert_eq!(table.declaration(), "[name\"\"10 hp. atk: id:: type.types ptr<>]4");
    }

    #[test]
    fn reserved_and_malformed_declarations_are_rejected() {
        assert_eq!(parse_declaration("^null"), Err(AnchorError::ReservedName));
        assert_eq!(parse_declaration("^NULL"), Err(AnchorError::ReservedName));
        assert!(matches!(parse_declaration("^a{}"), Err(AnchorError::UnknownFormat(_))));
        assert!(matches!(parse_declaration("^a[x\"\"0]3"), Err(AnchorError::UnknownFormat(_))));
        assert!(matches!(parse_declaration("^a[hp.]0"), Err(AnchorError::UnknownFormat(_))));
    }

    #[test]
    fn completion_waits_for_balanced_brackets() {
        assert!(!is_declaration_complete("^abc"));
        assert!(is_declaration_complete("^abc "));
        assert!(!is_declaration_complete("^abc[name\"\"4 "));
        assert!(is_declaration_complete("^abc[name\"\"4 hp.]2 "));
        assert!(!is_declaration_complete("^abc\" "));
    }
}
