#![warn(missing_docs)]
//! `romhex-text` - character tables for the single-byte text encoding used by romhex.
//!
//! A [`CharacterTable`] maps each byte to an optional printable symbol. Symbols may be longer
//! than one character (`\pk`, `\n`), so the table also answers prefix queries for
//! character-by-character entry.
//!
//! # Example
//!
//! ```rust
//! use romhex_text::CharacterTable;
//!
//! let table = CharacterTable::pokemon();
//! let bytes = table.encode("\"Hi");
//! assert_eq!(bytes, vec![0xC2, 0xDD, 0xFF]);
//! assert_eq!(table.decode(&bytes, 0, bytes.len()).as_deref(), Some("\"Hi\""));
//! ```

/// Byte that terminates a string.
pub const END_OF_STRING: u8 = 0xFF;

/// Byte whose successor is stored raw instead of as a symbol.
pub const ESCAPE: u8 = 0xFD;

/// Delimiter shown at both ends of a decoded string. It is also the terminator's symbol.
pub const DELIMITER: char = '"';

/// Longest run of one repeated byte still accepted as text by [`CharacterTable::read_string`].
pub const MAX_REPEATS: usize = 3;

/// A 256-entry byte/symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterTable {
    symbols: Vec<Option<String>>,
    newlines: Vec<u8>,
}

impl CharacterTable {
    /// Create a table with no symbols at all.
    pub fn empty() -> Self {
        Self {
            symbols: vec![None; 0x100],
            newlines: Vec::new(),
        }
    }

    /// The table used by the third-generation handheld monster games.
    pub fn pokemon() -> Self {
        let mut table = Self::empty();
        table.set(0x00, " ");
        table.set(0x1B, "é");
        table.set(0x2D, "&");
        table.fill_words(0x53, "\\pk \\mn \\Po \\Ke \\Bl \\Lo \\Ck");
        table.fill_chars(0x5B, "%()");
        table.fill_chars(0xA1, "0123456789");
        table.fill_words(0xAB, "! ? . - ‧ \\. \\qo \\qc ‘ ' \\sm \\sf $ , * /");
        table.fill_chars(0xBB, "ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        table.fill_chars(0xD5, "abcdefghijklmnopqrstuvwxyz");
        table.set(0xF0, ":");
        table.set(0xF9, "\\9");
        table.set(0xFA, "\\l");
        table.set(0xFB, "\\pn");
        table.set(0xFC, "\\CC");
        table.set(ESCAPE, "\\\\");
        table.set(0xFE, "\\n");
        table.set(END_OF_STRING, "\"");
        table.newlines = vec![0xFB, 0xFE];
        table
    }

    /// Assign a symbol to a byte, replacing any previous symbol.
    pub fn set(&mut self, byte: u8, symbol: impl Into<String>) {
        self.symbols[byte as usize] = Some(symbol.into());
    }

    fn fill_chars(&mut self, start: u8, characters: &str) {
        for (i, ch) in characters.chars().enumerate() {
            self.set(start + i as u8, ch.to_string());
        }
    }

    fn fill_words(&mut self, start: u8, words: &str) {
        for (i, word) in words.split(' ').enumerate() {
            self.set(start + i as u8, word);
        }
    }

    /// The symbol for `byte`, if it has one.
    pub fn symbol(&self, byte: u8) -> Option<&str> {
        self.symbols[byte as usize].as_deref()
    }

    /// The byte whose symbol is exactly `symbol`.
    pub fn byte_for(&self, symbol: &str) -> Option<u8> {
        self.symbols
            .iter()
            .position(|s| s.as_deref() == Some(symbol))
            .map(|i| i as u8)
    }

    /// Returns `true` if some symbol starts with `prefix`.
    ///
    /// Used while a symbol is typed one character at a time.
    pub fn any_starts_with(&self, prefix: &str) -> bool {
        self.symbols
            .iter()
            .flatten()
            .any(|symbol| symbol.starts_with(prefix))
    }

    /// Returns `true` if `byte` ends a displayed line.
    pub fn is_newline(&self, byte: u8) -> bool {
        self.newlines.contains(&byte)
    }

    /// Measure the string starting at `start`.
    ///
    /// Returns the length including the terminator, or `None` if the bytes are not text: an
    /// unmapped byte, more than [`MAX_REPEATS`] copies of one byte in a row, or no terminator
    /// before the end of `data`.
    pub fn read_string(&self, data: &[u8], start: usize) -> Option<usize> {
        let mut length = 0;
        let mut recent = *data.get(start)?;
        let mut repeats = 0;
        while start + length < data.len() {
            let byte = data[start + length];
            if byte == recent {
                repeats += 1;
            } else {
                repeats = 1;
                recent = byte;
            }
            if repeats > MAX_REPEATS || self.symbol(byte).is_none() {
                return None;
            }
            if byte == END_OF_STRING {
                return Some(length + 1);
            }
            if byte == ESCAPE {
                length += 1;
            }
            length += 1;
        }
        None
    }

    /// Decode `length` bytes starting at `start` into display text with a leading delimiter.
    ///
    /// Escaped bytes are rendered as two hex digits. Returns `None` if any byte has no symbol
    /// or the range runs past the end of `data`.
    pub fn decode(&self, data: &[u8], start: usize, length: usize) -> Option<String> {
        let mut result = String::from(DELIMITER);
        let mut i = 0;
        while i < length {
            let byte = *data.get(start + i)?;
            result.push_str(self.symbol(byte)?);
            if self.is_newline(byte) {
                result.push('\n');
            }
            if byte == ESCAPE {
                i += 1;
                let raw = *data.get(start + i)?;
                result.push_str(&format!("{raw:02X}"));
            }
            i += 1;
        }
        Some(result)
    }

    /// Encode text into bytes, always ending with [`END_OF_STRING`].
    ///
    /// A leading delimiter is ignored. At each position the longest matching symbol wins.
    /// Characters that match nothing (including the line breaks [`decode`](Self::decode)
    /// inserts) are skipped.
    pub fn encode(&self, input: &str) -> Vec<u8> {
        let input = input.strip_prefix(DELIMITER).unwrap_or(input);
        let mut result = Vec::new();
        let mut rest = input;
        while !rest.is_empty() {
            match self.longest_match(rest) {
                Some((byte, symbol_len)) => {
                    result.push(byte);
                    rest = &rest[symbol_len..];
                    if byte == ESCAPE
                        && let Some(raw) = rest.get(..2).and_then(parse_hex_byte)
                    {
                        result.push(raw);
                        rest = &rest[2..];
                    }
                }
                None => {
                    let skip = rest.chars().next().map_or(1, char::len_utf8);
                    rest = &rest[skip..];
                }
            }
        }
        if result.last() != Some(&END_OF_STRING) {
            result.push(END_OF_STRING);
        }
        result
    }

    fn longest_match(&self, text: &str) -> Option<(u8, usize)> {
        self.symbols
            .iter()
            .enumerate()
            .filter_map(|(byte, symbol)| {
                let symbol = symbol.as_deref()?;
                text.starts_with(symbol).then_some((byte as u8, symbol.len()))
            })
            .max_by_key(|&(_, len)| len)
    }
}

impl Default for CharacterTable {
    fn default() -> Self {
        Self::pokemon()
    }
}

fn parse_hex_byte(digits: &str) -> Option<u8> {
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}
