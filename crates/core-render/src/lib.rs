//! Differential viewport renderer.
//!
//! Views build cell rows into a screen-sized back grid; the renderer diffs
//! back against front and emits only the cells that changed, using relative
//! cursor motion. Cursor motion and byte↔visual-column arithmetic live
//! here because every decision consults the grapheme/width model.

pub mod cell;
pub mod column;
pub mod motion;
pub mod renderer;
pub mod view;

pub use cell::{Cell, CellAttrs, CellUpdate, Grid};
pub use column::{byte_to_column, column_to_byte};
pub use renderer::{RenderSink, Renderer};
pub use view::View;
