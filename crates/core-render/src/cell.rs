//! Cell grids: the unit of differential rendering.
//!
//! A cell holds one grapheme cluster and its attributes. Wide clusters
//! occupy two cells: the cluster sits in the head cell and the follower is
//! a zero-width continuation that never reaches the terminal (the glyph
//! spills into it).

use std::fmt;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CellAttrs: u8 {
        /// Reverse video: status line, active region, search hits.
        const REVERSE = 1 << 0;
        const BOLD    = 1 << 1;
        /// Dim: gutter line numbers, continuation markers.
        const DIM     = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Grapheme cluster; empty for wide-cluster continuation cells.
    pub text: String,
    pub width: u8,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(CellAttrs::empty())
    }
}

impl Cell {
    pub fn blank(attrs: CellAttrs) -> Self {
        Self {
            text: " ".to_string(),
            width: 1,
            attrs,
        }
    }

    fn continuation(attrs: CellAttrs) -> Self {
        Self {
            text: String::new(),
            width: 0,
            attrs,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }
}

/// One changed cell to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub x: u16,
    pub y: u16,
    pub cell: Cell,
}

/// Rectangular cell store, row-major.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); usize::from(width) * usize::from(height)],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    fn idx(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(&self.cells[self.idx(x, y)])
    }

    /// Place a cluster of display width `w` at `(x, y)`; a wide cluster
    /// writes a continuation into the following cell. Out-of-grid writes
    /// are ignored (clipping).
    pub fn put_cluster(&mut self, x: u16, y: u16, cluster: &str, w: usize, attrs: CellAttrs) {
        if y >= self.height || x >= self.width {
            return;
        }
        // A wide cluster that would straddle the right edge degrades to a
        // blank so the glyph cannot bleed out of the region.
        if w == 2 && x + 1 >= self.width {
            let i = self.idx(x, y);
            self.cells[i] = Cell::blank(attrs);
            return;
        }
        let i = self.idx(x, y);
        self.cells[i] = Cell {
            text: cluster.to_string(),
            width: w.min(2) as u8,
            attrs,
        };
        if w == 2 {
            let j = self.idx(x + 1, y);
            self.cells[j] = Cell::continuation(attrs);
        }
    }

    /// Fill a whole row with blanks.
    pub fn clear_row(&mut self, y: u16, attrs: CellAttrs) {
        if y >= self.height {
            return;
        }
        let start = self.idx(0, y);
        for cell in &mut self.cells[start..start + usize::from(self.width)] {
            *cell = Cell::blank(attrs);
        }
    }

    /// Cells differing from `front`, in row-major order. Continuation
    /// cells are folded into their head cell and never reported alone
    /// unless their head also changed.
    pub fn diff(&self, front: &Grid) -> Vec<CellUpdate> {
        debug_assert_eq!(self.width, front.width);
        debug_assert_eq!(self.height, front.height);
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let i = self.idx(x, y);
                if self.cells[i] != front.cells[i] && !self.cells[i].is_continuation() {
                    out.push(CellUpdate {
                        x,
                        y,
                        cell: self.cells[i].clone(),
                    });
                }
            }
        }
        out
    }

    /// Copy every cell from `other` (sizes must match).
    pub fn copy_from(&mut self, other: &Grid) {
        debug_assert_eq!(self.width, other.width);
        debug_assert_eq!(self.height, other.height);
        self.cells.clone_from(&other.cells);
    }

    /// Row rendered as plain text (tests and snapshots).
    pub fn row_text(&self, y: u16) -> String {
        let mut s = String::new();
        for x in 0..self.width {
            if let Some(cell) = self.get(x, y) {
                s.push_str(&cell.text);
            }
        }
        s
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            writeln!(f, "{}", self.row_text(y).trim_end())?;
        }
        Ok(())
    }
}
