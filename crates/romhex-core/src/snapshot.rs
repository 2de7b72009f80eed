//! The materialized window of cells handed to renderers.

use crate::format::Format;

/// One visible byte and how to show it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cell {
    /// Byte value. Meaningless for [`Format::Undefined`].
    pub value: u8,
    /// Interpretation.
    pub format: Format,
}

impl Cell {
    /// Create a cell.
    pub fn new(value: u8, format: Format) -> Self {
        Self { value, format }
    }

    /// A cell outside the data.
    pub fn undefined() -> Self {
        Self::default()
    }

    /// Display text for the cell.
    pub fn text(&self) -> String {
        self.format.to_text(self.value)
    }
}

/// A `width` x `height` grid of cells stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    undefined: Cell,
}

impl CellGrid {
    /// Create a grid of undefined cells.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::undefined(); width * height],
            undefined: Cell::undefined(),
        }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Reallocate for new dimensions. All cells become undefined.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells.resize(width * height, Cell::undefined());
    }

    fn offset(&self, col: isize, row: isize) -> Option<usize> {
        let (col, row) = (usize::try_from(col).ok()?, usize::try_from(row).ok()?);
        (col < self.width && row < self.height).then_some(row * self.width + col)
    }

    /// Cell at `(col, row)`. Coordinates outside the grid give an undefined cell.
    pub fn get(&self, col: isize, row: isize) -> &Cell {
        match self.offset(col, row) {
            Some(offset) => &self.cells[offset],
            None => &self.undefined,
        }
    }

    /// Replace the cell at `(col, row)`. Ignored outside the grid.
    pub fn set(&mut self, col: isize, row: isize, cell: Cell) {
        if let Some(offset) = self.offset(col, row) {
            self.cells[offset] = cell;
        }
    }

    /// Mutable cell at `(col, row)`.
    pub fn get_mut(&mut self, col: isize, row: isize) -> Option<&mut Cell> {
        let offset = self.offset(col, row)?;
        Some(&mut self.cells[offset])
    }

    /// One row of cells.
    pub fn row(&self, row: usize) -> &[Cell] {
        let start = (row * self.width).min(self.cells.len());
        let end = (start + self.width).min(self.cells.len());
        &self.cells[start..end]
    }

    /// Every cell, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reads_are_undefined() {
        let mut grid = CellGrid::new(4, 2);
        grid.set(1, 1, Cell::new(0x2A, Format::Plain));
        assert_eq!(grid.get(1, 1).text(), "2A");
        assert_eq!(grid.get(-1, 0).format, Format::Undefined);
        assert_eq!(grid.get(4, 0).format, Format::Undefined);
        assert_eq!(grid.row(1)[1].value, 0x2A);
    }
}
