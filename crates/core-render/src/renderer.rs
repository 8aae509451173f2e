//! Back/front grid pair with minimal-diff emission.
//!
//! Per frame: `begin_frame` seeds the back grid from the front, views
//! rebuild the rows they own, `flush_frame` emits exactly the cells that
//! differ (relative cursor motion, no full-screen writes) and flips the
//! grids. An immediate-echo path lets the dispatcher paint the typed
//! cluster at the cursor before the model updates; the next frame's diff
//! reconciles any divergence.

use crate::cell::{CellAttrs, Grid};
use tracing::trace;

/// Terminal-facing cell writer, implemented by the crossterm driver and by
/// recording sinks in tests.
pub trait RenderSink {
    fn move_to(&mut self, x: u16, y: u16);
    fn write(&mut self, text: &str, attrs: CellAttrs);
    fn flush(&mut self);
}

#[derive(Debug)]
pub struct Renderer {
    front: Grid,
    back: Grid,
}

impl Renderer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            front: Grid::new(width, height),
            back: Grid::new(width, height),
        }
    }

    pub fn width(&self) -> u16 {
        self.front.width()
    }

    pub fn height(&self) -> u16 {
        self.front.height()
    }

    /// Recreate both grids; the caller must mark every view for a full
    /// rebuild afterwards. Returns whether the size actually changed.
    pub fn resize(&mut self, width: u16, height: u16) -> bool {
        if width == self.front.width() && height == self.front.height() {
            return false;
        }
        self.front = Grid::new(width, height);
        self.back = Grid::new(width, height);
        true
    }

    /// Start a frame: the back grid begins as a copy of what is on screen,
    /// so views only need to rebuild rows that may have changed.
    pub fn begin_frame(&mut self) -> &mut Grid {
        self.back.copy_from(&self.front);
        &mut self.back
    }

    /// The grid views draw into between `begin_frame` and `flush_frame`.
    pub fn back_mut(&mut self) -> &mut Grid {
        &mut self.back
    }

    /// What the terminal currently shows (tests and the echo path).
    pub fn front(&self) -> &Grid {
        &self.front
    }

    /// Diff, emit changed cells, flip. Returns the number of cell writes.
    pub fn flush_frame(&mut self, sink: &mut dyn RenderSink) -> usize {
        let updates = self.back.diff(&self.front);
        let mut expected: Option<(u16, u16)> = None;
        for update in &updates {
            if expected != Some((update.x, update.y)) {
                sink.move_to(update.x, update.y);
            }
            sink.write(&update.cell.text, update.cell.attrs);
            expected = Some((update.x + u16::from(update.cell.width.max(1)), update.y));
        }
        if !updates.is_empty() {
            sink.flush();
        }
        trace!(target: "render.frame", cells = updates.len(), "flush");
        std::mem::swap(&mut self.front, &mut self.back);
        updates.len()
    }

    /// Perceived-latency path: paint `cluster` at `(x, y)` right now and
    /// record it in the front grid so the next frame does not re-emit it
    /// when the model agrees.
    pub fn echo_at(
        &mut self,
        sink: &mut dyn RenderSink,
        x: u16,
        y: u16,
        cluster: &str,
        width: usize,
        attrs: CellAttrs,
    ) {
        sink.move_to(x, y);
        sink.write(cluster, attrs);
        sink.flush();
        self.front.put_cluster(x, y, cluster, width, attrs);
    }
}
