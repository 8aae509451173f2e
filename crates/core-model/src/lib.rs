//! Editor model: piece-table document storage and the tiled window layout.
//!
//! `Buffer` is the single mutable document representation; every edit in the
//! editor bottoms out in [`Buffer::insert`]/[`Buffer::delete`]. The window
//! layout tree carries only geometry and document bindings; presentation
//! state (cursor, scroll, grids) lives with the views that render it.

pub mod buffer;
pub mod document;
pub mod layout;

pub use buffer::{Buffer, BufferError, LineSpan};
pub use document::{DocumentId, Encoding, FileMeta, LineEnding};
pub use layout::{LayoutRegion, SplitDir, Window, WindowId, WindowLayout};
