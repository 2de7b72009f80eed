//! Error types for edits, anchor declarations, navigation, reloads, and commands.
//!
//! Rejected keystrokes are not errors: they are dropped without a report. Everything here is
//! recoverable. The one unrecoverable condition (re-entering the history while a revert runs)
//! panics instead.

use thiserror::Error;

/// A completed edit that failed semantic validation. Nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("pointer destination {destination:#X} is outside the data (length {length:#X})")]
    /// A pointer was typed with a hex destination past the end of the data.
    PointerOutOfRange {
        /// Requested destination.
        destination: usize,
        /// Current data length.
        length: usize,
    },
    #[error("{value} does not fit in {length} byte(s)")]
    /// An integer too large for its field.
    IntegerOverflow {
        /// Parsed value.
        value: u64,
        /// Field width in bytes.
        length: usize,
    },
    #[error("'{0}' is not a number")]
    /// Integer text that could not be parsed.
    InvalidNumber(String),
    #[error("'{name}' is not one of the options in '{table}'")]
    /// An enumerated field was given a name that its table does not contain.
    UnknownEnumValue {
        /// Typed name.
        name: String,
        /// Table that provides the options.
        table: String,
    },
    #[error(transparent)]
    /// An anchor declaration was rejected by the model.
    Anchor(#[from] AnchorError),
}

/// Reasons an anchor declaration can be refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    #[error("'null' is a reserved word and cannot be used as an anchor name")]
    /// The name `null` is reserved for null pointers.
    ReservedName,
    #[error("anchor name '{name}' is already used at {address:06X}")]
    /// Another address already owns this name.
    NameInUse {
        /// Requested name.
        name: String,
        /// Address that already has it.
        address: usize,
    },
    #[error("an anchor with nothing pointing to it must have a name")]
    /// A nameless anchor was declared where no pointer refers.
    UnnamedWithoutSources,
    #[error("data at {0:06X} is not a string")]
    /// A string format was declared over bytes that do not decode as text.
    NotAString(usize),
    #[error("the new format at {start:06X} would overlap the anchor at {existing:06X}")]
    /// The declared run would cover another anchored run.
    OverlapsAnchor {
        /// Start of the new run.
        start: usize,
        /// Start of the existing anchor.
        existing: usize,
    },
    #[error("'{0}' is not a recognized anchor format")]
    /// The declaration grammar did not match.
    UnknownFormat(String),
    #[error("table at {start:06X} needs {length} bytes, past the end of the data")]
    /// A table declaration runs past the end of the buffer.
    TableOutOfBounds {
        /// Table start.
        start: usize,
        /// Declared table length in bytes.
        length: usize,
    },
    #[error("address {0:06X} is outside the data")]
    /// The anchor address is past the end of the buffer.
    OutOfData(usize),
    #[error("enumeration table '{0}' does not exist")]
    /// An enumerated segment names a table that is not declared.
    UnknownEnumTable(String),
}

/// A goto target that could not be resolved. The selection is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("'{0}' is neither an anchor nor an address")]
    /// Text that is neither an anchor name nor a hex address.
    UnresolvedTarget(String),
    #[error("address {address:06X} is outside the data (length {length:#X})")]
    /// A well-formed address past the end of the data.
    OutOfRange {
        /// Requested address.
        address: usize,
        /// Current data length.
        length: usize,
    },
}

/// Everything reported through the editor's error callback.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    /// A completed edit was invalid.
    Edit(#[from] EditError),
    #[error(transparent)]
    /// A navigation target was invalid.
    Navigation(#[from] NavigationError),
    #[error("cannot reload while there are unsaved changes")]
    /// A reload was requested with unsaved local edits.
    UnsavedChanges,
    #[error("I/O error: {0}")]
    /// The file source failed.
    Io(#[from] std::io::Error),
    #[error(transparent)]
    /// The file source supplied metadata that could not be read.
    Metadata(#[from] MetadataError),
}

/// A stored metadata blob that could not be parsed. The model is unchanged.
#[derive(Debug, Error)]
#[error("invalid metadata: {0}")]
pub struct MetadataError(#[from] serde_json::Error);

/// Errors returned by [`Editor::execute`](crate::Editor::execute).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("nothing to undo")]
    /// Undo with an empty undo stack and no open change.
    NothingToUndo,
    #[error("nothing to redo")]
    /// Redo with an empty redo stack.
    NothingToRedo,
    #[error("no earlier location to go back to")]
    /// Back with an empty back stack.
    NothingToGoBack,
    #[error("no later location to go forward to")]
    /// Forward with an empty forward stack.
    NothingToGoForward,
    #[error("cell ({col}, {row}) is outside the visible window")]
    /// A view point outside the current window.
    InvalidCell {
        /// Column.
        col: isize,
        /// Row.
        row: isize,
    },
    #[error("{0}")]
    /// Anything else.
    Other(String),
}
