//! Per-document editing state: undo log, cursor/mark context, kill ring,
//! the document set, and the persisted minibuffer history.

pub mod context;
pub mod history;
pub mod manager;
pub mod undo;

pub use context::{EditContext, KillRing, KILL_RING_MAX};
pub use history::{History, HistoryError, HISTORY_MAX};
pub use manager::{Document, DocumentManager};
pub use undo::{EditKind, EditRecord, UndoLog, COALESCE_WINDOW, UNDO_HISTORY_MAX};
