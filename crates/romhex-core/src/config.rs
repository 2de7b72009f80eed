//! Editor options.
//!
//! Options can be built in code or read from JSON. Missing fields take their defaults.
//!
//! ```rust
//! use romhex_core::EditorOptions;
//!
//! let options = EditorOptions::from_json(r#"{ "width": 32, "max_history": 20 }"#).unwrap();
//! assert_eq!(options.width, 32);
//! assert_eq!(options.height, EditorOptions::default().height);
//! ```

use crate::history::DEFAULT_MAX_UNDO;
use crate::selection::DEFAULT_PREFERRED_WIDTH;
use serde::Deserialize;

/// Startup configuration for an [`Editor`](crate::Editor).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    /// Columns in the window.
    pub width: usize,
    /// Rows in the window.
    pub height: usize,
    /// Row width used by [`Editor::change_width`](crate::Editor::change_width).
    pub preferred_width: usize,
    /// Whether scrolling may be confined to a single table.
    pub allow_single_table_mode: bool,
    /// Whether row headers use the custom header lookup.
    pub use_custom_headers: bool,
    /// Undo steps kept.
    pub max_history: usize,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_PREFERRED_WIDTH,
            height: 16,
            preferred_width: DEFAULT_PREFERRED_WIDTH,
            allow_single_table_mode: true,
            use_custom_headers: false,
            max_history: DEFAULT_MAX_UNDO,
        }
    }
}

impl EditorOptions {
    /// Parse options from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
