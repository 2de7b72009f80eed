//! Address/view mapping for a scrollable window over the byte buffer.
//!
//! # Overview
//!
//! The visible window is `width` columns by `height` rows. Its top-left cell shows the byte
//! at `data_index`, which may be negative (blank cells before the start of the data) and need
//! not be a multiple of `width`. Every view point maps to exactly one address:
//!
//! ```text
//! address = row * width + col + data_index
//! ```
//!
//! Addresses before the window map to negative rows, and addresses after it map to rows
//! `>= height`.
//!
//! In single-table mode scrolling is confined to one table's rows.
//!
//! Methods that move the window return the signed change of `data_index` so that callers can
//! react without subscribing to anything.
//!
//! # Example
//!
//! ```rust
//! use romhex_core::{AddressSpace, ViewPoint};
//!
//! let mut space = AddressSpace::new(0x200);
//! space.set_width(16);
//! space.set_height(8);
//!
//! assert_eq!(space.view_point_to_index(ViewPoint::new(2, 1)), 18);
//! assert_eq!(space.index_to_view_point(-1), ViewPoint::new(15, -1));
//! ```

use crate::host::{DeferredWork, WorkScheduler};
use std::fmt;

/// Smallest allowed window width.
pub const MIN_WIDTH: usize = 4;

/// Smallest allowed window height.
pub const MIN_HEIGHT: usize = 1;

/// A cell coordinate in the current window. Rows and columns may be out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ViewPoint {
    /// Column, `0` is the leftmost cell.
    pub col: isize,
    /// Row, `0` is the top row of the window.
    pub row: isize,
}

impl ViewPoint {
    /// Create a view point.
    pub fn new(col: isize, row: isize) -> Self {
        Self { col, row }
    }
}

/// Direction for scrolling and caret movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// One row up.
    Up,
    /// One row down.
    Down,
    /// One byte left.
    Left,
    /// One byte right.
    Right,
    /// One window up.
    PageUp,
    /// One window down.
    PageDown,
}

/// Custom row label lookup. Returning `None` falls back to the hex address.
pub type HeaderLookup = Box<dyn Fn(isize) -> Option<String>>;

/// Scrollable window over a byte buffer.
pub struct AddressSpace {
    data_index: isize,
    width: usize,
    height: usize,
    scroll_value: isize,
    maximum_scroll: isize,
    data_length: usize,
    table_start: usize,
    table_length: usize,
    allow_single_table_mode: bool,
    use_custom_headers: bool,
    header_lookup: Option<HeaderLookup>,
    scheduler: Option<Box<dyn WorkScheduler>>,
    headers: Vec<String>,
    headers_stale: bool,
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("data_index", &self.data_index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("scroll_value", &self.scroll_value)
            .field("data_length", &self.data_length)
            .field("table_start", &self.table_start)
            .field("table_length", &self.table_length)
            .finish_non_exhaustive()
    }
}

impl AddressSpace {
    /// Create a 4x4 window at the start of a buffer of `data_length` bytes.
    pub fn new(data_length: usize) -> Self {
        let mut space = Self {
            data_index: 0,
            width: MIN_WIDTH,
            height: 4,
            scroll_value: 0,
            maximum_scroll: 0,
            data_length,
            table_start: 0,
            table_length: 0,
            allow_single_table_mode: true,
            use_custom_headers: false,
            header_lookup: None,
            scheduler: None,
            headers: Vec::new(),
            headers_stale: false,
        };
        space.update_scroll_range();
        space
    }

    /// Address shown in the top-left cell.
    pub fn data_index(&self) -> isize {
        self.data_index
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Current scroll position in rows.
    pub fn scroll_value(&self) -> isize {
        self.scroll_value
    }

    /// Lowest reachable scroll value.
    pub fn minimum_scroll(&self) -> isize {
        if self.table_length == 0 {
            return 0;
        }
        self.effective_length(self.table_start) / self.width as isize
    }

    /// Highest reachable scroll value.
    pub fn maximum_scroll(&self) -> isize {
        if self.table_length == 0 {
            return self.maximum_scroll;
        }
        let effective = self.effective_length(self.table_start + self.table_length);
        (ceil_div(effective, self.width as isize) - 1).max(0)
    }

    /// First address the selection may reach: the table start in table mode, else `0`.
    pub fn data_start(&self) -> usize {
        if self.table_length == 0 {
            0
        } else {
            self.table_start
        }
    }

    /// End of the navigable data: the table end in table mode, else the buffer length.
    pub fn data_length(&self) -> usize {
        if self.table_length == 0 {
            self.data_length
        } else {
            self.table_start + self.table_length
        }
    }

    /// Length of the whole buffer, ignoring table mode.
    pub fn buffer_length(&self) -> usize {
        self.data_length
    }

    /// Returns `true` while scrolling is confined to one table.
    pub fn is_single_table_mode(&self) -> bool {
        self.table_length != 0
    }

    /// Whether [`set_table_mode`](Self::set_table_mode) may enter table mode.
    pub fn allow_single_table_mode(&self) -> bool {
        self.allow_single_table_mode
    }

    /// Enable or disable table mode. Disabling also leaves table mode.
    pub fn set_allow_single_table_mode(&mut self, allow: bool) {
        self.allow_single_table_mode = allow;
        if !allow {
            self.clear_table_mode();
        }
    }

    /// Set the number of columns, coerced to at least [`MIN_WIDTH`].
    ///
    /// Returns `true` if the width changed.
    pub fn set_width(&mut self, width: usize) -> bool {
        let width = width.max(MIN_WIDTH);
        if width == self.width {
            return false;
        }
        self.width = width;
        self.update_scroll_range();
        true
    }

    /// Set the number of rows, coerced to at least [`MIN_HEIGHT`].
    ///
    /// Returns `true` if the height changed.
    pub fn set_height(&mut self, height: usize) -> bool {
        let height = height.max(MIN_HEIGHT);
        if height == self.height {
            return false;
        }
        self.height = height;
        self.update_scroll_range();
        true
    }

    /// Update the buffer length after the data grew or shrank.
    pub fn set_data_length(&mut self, length: usize) {
        if length == self.data_length {
            return;
        }
        self.data_length = length;
        self.update_scroll_range();
    }

    /// Scroll to `value` rows, clamped to the reachable range.
    ///
    /// Returns the change of `data_index`.
    pub fn set_scroll_value(&mut self, value: isize) -> isize {
        let minimum = self.minimum_scroll();
        let maximum = self.maximum_scroll().max(minimum);
        let value = value.clamp(minimum, maximum);
        let rows = value - self.scroll_value;
        if rows == 0 {
            return 0;
        }
        let shift = rows * self.width as isize;
        self.data_index += shift;
        self.update_scroll_range();
        shift
    }

    /// Put `address` in the top-left cell, leaving table mode.
    ///
    /// The index is clamped so at least one byte of data stays on the first row. Returns the
    /// change of `data_index`.
    pub fn set_data_index(&mut self, address: isize) -> isize {
        self.clear_table_mode();
        let width = self.width as isize;
        let upper = (self.data_length as isize - 1).max(1 - width);
        let address = address.clamp(1 - width, upper);
        let shift = address - self.data_index;
        if shift != 0 {
            self.data_index = address;
            self.update_scroll_range();
        }
        shift
    }

    /// Scroll one step. Up and down move whole rows; left and right shift the window by one
    /// byte and leave table mode.
    ///
    /// Returns the change of `data_index`.
    pub fn scroll(&mut self, direction: Direction) -> isize {
        match direction {
            Direction::Up => self.set_scroll_value(self.scroll_value - 1),
            Direction::Down => self.set_scroll_value(self.scroll_value + 1),
            Direction::PageUp => self.set_scroll_value(self.scroll_value - self.height as isize),
            Direction::PageDown => self.set_scroll_value(self.scroll_value + self.height as isize),
            Direction::Left => self.set_data_index(self.data_index - 1),
            Direction::Right => self.set_data_index(self.data_index + 1),
        }
    }

    /// Address shown at `point`. Total: points outside the window or the data still map.
    pub fn view_point_to_index(&self, point: ViewPoint) -> isize {
        point.row * self.width as isize + point.col + self.data_index
    }

    /// View point that shows `index`. Inverse of [`view_point_to_index`](Self::view_point_to_index).
    pub fn index_to_view_point(&self, index: isize) -> ViewPoint {
        let width = self.width as isize;
        let relative = index - self.data_index;
        ViewPoint::new(relative.rem_euclid(width), relative.div_euclid(width))
    }

    /// Returns `true` if `point` is a cell of the window.
    pub fn contains(&self, point: ViewPoint) -> bool {
        (0..self.width as isize).contains(&point.col) && (0..self.height as isize).contains(&point.row)
    }

    /// Scroll as little as possible so that `point` is visible.
    ///
    /// Columns outside the window are first wrapped onto the neighbouring row. Returns `true`
    /// if the window scrolled, in which case `point` has been rewritten to the same address's
    /// new location and the whole window needs redrawing.
    pub fn scroll_to_point(&mut self, point: &mut ViewPoint) -> bool {
        let index = self.view_point_to_index(*point);
        let normalized = self.index_to_view_point(index);
        *point = normalized;

        let rows = if normalized.row < 0 {
            normalized.row
        } else if normalized.row >= self.height as isize {
            normalized.row + 1 - self.height as isize
        } else {
            return false;
        };

        self.set_scroll_value(self.scroll_value + rows);
        *point = self.index_to_view_point(index);
        true
    }

    /// Confine scrolling to `length` bytes starting at `start`.
    ///
    /// Ignored unless table mode is allowed. A length of `0` leaves table mode. Returns the
    /// change of `data_index` needed to bring the window inside the table.
    pub fn set_table_mode(&mut self, start: usize, length: usize) -> isize {
        if self.table_start == start && self.table_length == length {
            return 0;
        }
        if !self.allow_single_table_mode && length != 0 {
            return 0;
        }
        self.table_start = start;
        self.table_length = length;
        tracing::debug!(start, length, "single-table mode changed");
        self.update_headers();
        self.set_scroll_value(self.scroll_value)
    }

    /// Leave table mode.
    pub fn clear_table_mode(&mut self) {
        if self.table_length != 0 {
            self.set_table_mode(0, 0);
        }
    }

    /// Row labels, one per row. May be stale while a header update is scheduled.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Returns `true` while a scheduled header update has not run yet.
    pub fn headers_stale(&self) -> bool {
        self.headers_stale
    }

    /// Whether [`set_header_lookup`](Self::set_header_lookup) labels are used.
    pub fn use_custom_headers(&self) -> bool {
        self.use_custom_headers
    }

    /// Switch between custom labels and plain hex addresses.
    pub fn set_use_custom_headers(&mut self, value: bool) {
        if self.use_custom_headers != value {
            self.use_custom_headers = value;
            self.update_headers();
        }
    }

    /// Install the lookup used for custom row labels.
    pub fn set_header_lookup(&mut self, lookup: HeaderLookup) {
        self.header_lookup = Some(lookup);
        self.update_headers();
    }

    /// Route header regeneration through `scheduler` instead of doing it inline.
    pub fn set_scheduler(&mut self, scheduler: Box<dyn WorkScheduler>) {
        self.scheduler = Some(scheduler);
    }

    /// Regenerate the row labels now.
    pub fn update_headers(&mut self) {
        let width = self.width as isize;
        let end = self.data_length() as isize;
        self.headers = (0..self.height as isize)
            .map(|row| {
                let address = self.data_index + row * width;
                if address < 0 || address >= end {
                    return String::new();
                }
                if self.use_custom_headers
                    && let Some(label) = self.header_lookup.as_ref().and_then(|lookup| lookup(address))
                {
                    return label;
                }
                format!("{address:06X}")
            })
            .collect();
        self.headers_stale = false;
    }

    fn request_headers(&mut self) {
        match self.scheduler.as_mut() {
            Some(scheduler) => {
                self.headers_stale = true;
                scheduler.schedule(DeferredWork::UpdateHeaders);
            }
            None => self.update_headers(),
        }
    }

    fn update_scroll_range(&mut self) {
        let width = self.width as isize;
        let effective = self.effective_length(self.data_length);
        self.maximum_scroll = (ceil_div(effective, width) - 1).max(0);

        let mut scroll = ceil_div(self.data_index, width);
        // resizing while scrolled above the data can push all of it out of view
        if scroll < 0 {
            self.data_index += width * -scroll;
            scroll = 0;
        }
        self.scroll_value = scroll;
        self.request_headers();
    }

    /// `length` plus the blank cells before the data on the first row of a misaligned window.
    fn effective_length(&self, length: usize) -> isize {
        let width = self.width as isize;
        let offset = self.data_index.rem_euclid(width);
        let slack = if offset != 0 { width - offset } else { 0 };
        length as isize + slack
    }
}

fn ceil_div(value: isize, divisor: isize) -> isize {
    (value + divisor - 1).div_euclid(divisor)
}
