//! Reversible edit records with insert coalescing.
//!
//! The undo log stores `(kind, position, bytes)` deltas rather than buffer
//! snapshots: the piece table keeps the add span alive, so the bytes of an
//! inverse are cheap to hold. Higher-level edit commands call `record_*`;
//! `Buffer::insert`/`delete` themselves never touch the log.
//!
//! Coalescing: a new insert extends the top entry when the top is also an
//! insert, the new position equals the top's end, less than
//! [`COALESCE_WINDOW`] has elapsed, and no other command sealed the run in
//! between. Deletes never coalesce. Any recorded edit clears the redo
//! stack; depth is capped at [`UNDO_HISTORY_MAX`] with the oldest entry
//! dropped on overflow.

use core_model::Buffer;
use std::time::{Duration, Instant};
use tracing::{error, trace};

/// Maximum entries retained per document.
pub const UNDO_HISTORY_MAX: usize = 1_000;

/// Inserts closer together than this may coalesce.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Insert,
    Delete,
}

#[derive(Debug, Clone)]
pub struct EditRecord {
    pub kind: EditKind,
    pub pos: usize,
    pub bytes: Vec<u8>,
    pub cursor_before: usize,
    pub cursor_after: usize,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct UndoLog {
    undo: Vec<EditRecord>,
    redo: Vec<EditRecord>,
    /// Set between edits when an unrelated command ran; blocks coalescing.
    sealed: bool,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Mark the top of the stack as closed; the next insert starts a fresh
    /// entry regardless of timing. Called by the dispatcher on any command
    /// that is not plain text entry.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Record an insertion of `bytes` at `pos`. `now` is captured at
    /// dispatch time so playback and tests control the clock.
    pub fn record_insert(
        &mut self,
        pos: usize,
        bytes: Vec<u8>,
        cursor_before: usize,
        cursor_after: usize,
        now: Instant,
    ) {
        self.redo.clear();
        if !self.sealed {
            if let Some(top) = self.undo.last_mut() {
                let contiguous = top.kind == EditKind::Insert
                    && pos == top.pos + top.bytes.len()
                    && now.duration_since(top.at) < COALESCE_WINDOW;
                if contiguous {
                    top.bytes.extend_from_slice(&bytes);
                    top.cursor_after = cursor_after;
                    top.at = now;
                    trace!(target: "state.undo", depth = self.undo.len(), appended = bytes.len(), "insert_coalesced");
                    return;
                }
            }
        }
        self.sealed = false;
        self.push(EditRecord {
            kind: EditKind::Insert,
            pos,
            bytes,
            cursor_before,
            cursor_after,
            at: now,
        });
    }

    /// Record a deletion whose removed bytes were `bytes`.
    pub fn record_delete(
        &mut self,
        pos: usize,
        bytes: Vec<u8>,
        cursor_before: usize,
        cursor_after: usize,
        now: Instant,
    ) {
        self.redo.clear();
        self.sealed = false;
        self.push(EditRecord {
            kind: EditKind::Delete,
            pos,
            bytes,
            cursor_before,
            cursor_after,
            at: now,
        });
    }

    fn push(&mut self, record: EditRecord) {
        self.undo.push(record);
        if self.undo.len() > UNDO_HISTORY_MAX {
            self.undo.remove(0);
            trace!(target: "state.undo", "undo_stack_trimmed");
        }
        trace!(target: "state.undo", depth = self.undo.len(), "record");
    }

    /// Pop the top entry, apply its inverse to `buffer`, move it to the
    /// redo stack and return the cursor to restore.
    pub fn undo(&mut self, buffer: &mut Buffer) -> Option<usize> {
        let record = self.undo.pop()?;
        let cursor = record.cursor_before;
        match record.kind {
            EditKind::Insert => {
                buffer.delete(record.pos, record.bytes.len());
            }
            EditKind::Delete => {
                if let Err(e) = buffer.insert(record.pos, &record.bytes) {
                    // The log no longer matches the buffer; a record was
                    // taken against a different document state.
                    error!(target: "state.undo", error = %e, "undo_replay_failed");
                    debug_assert!(false, "undo replay failed: {e}");
                    return None;
                }
            }
        }
        trace!(target: "state.undo", depth = self.undo.len(), "undo");
        self.redo.push(record);
        Some(cursor)
    }

    /// Reapply the most recently undone entry; returns the cursor that
    /// followed the original edit.
    pub fn redo(&mut self, buffer: &mut Buffer) -> Option<usize> {
        let record = self.redo.pop()?;
        let cursor = record.cursor_after;
        match record.kind {
            EditKind::Insert => {
                if let Err(e) = buffer.insert(record.pos, &record.bytes) {
                    error!(target: "state.undo", error = %e, "redo_replay_failed");
                    debug_assert!(false, "redo replay failed: {e}");
                    return None;
                }
            }
            EditKind::Delete => {
                buffer.delete(record.pos, record.bytes.len());
            }
        }
        trace!(target: "state.undo", redo_depth = self.redo.len(), "redo");
        self.undo.push(record);
        Some(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn consecutive_inserts_coalesce() {
        let mut buf = Buffer::new();
        let mut log = UndoLog::new();
        let now = t0();
        for (i, c) in "abc".bytes().enumerate() {
            buf.insert(i, &[c]).unwrap();
            log.record_insert(i, vec![c], i, i + 1, now);
        }
        assert_eq!(log.undo_depth(), 1);
        let cursor = log.undo(&mut buf).unwrap();
        assert_eq!(buf.len(), 0);
        assert_eq!(cursor, 0);
        let cursor = log.redo(&mut buf).unwrap();
        assert_eq!(buf.text(), "abc");
        assert_eq!(cursor, 3);
    }

    #[test]
    fn stale_inserts_do_not_coalesce() {
        let mut log = UndoLog::new();
        let now = t0();
        log.record_insert(0, b"a".to_vec(), 0, 1, now);
        log.record_insert(1, b"b".to_vec(), 1, 2, now + COALESCE_WINDOW);
        assert_eq!(log.undo_depth(), 2);
    }

    #[test]
    fn non_adjacent_inserts_do_not_coalesce() {
        let mut log = UndoLog::new();
        let now = t0();
        log.record_insert(0, b"ab".to_vec(), 0, 2, now);
        log.record_insert(0, b"c".to_vec(), 0, 1, now);
        assert_eq!(log.undo_depth(), 2);
    }

    #[test]
    fn seal_blocks_coalescing() {
        let mut log = UndoLog::new();
        let now = t0();
        log.record_insert(0, b"a".to_vec(), 0, 1, now);
        log.seal();
        log.record_insert(1, b"b".to_vec(), 1, 2, now);
        assert_eq!(log.undo_depth(), 2);
    }

    #[test]
    fn delete_never_coalesces() {
        let mut log = UndoLog::new();
        let now = t0();
        log.record_insert(0, b"ab".to_vec(), 0, 2, now);
        log.record_delete(1, b"b".to_vec(), 2, 1, now);
        log.record_delete(0, b"a".to_vec(), 1, 0, now);
        assert_eq!(log.undo_depth(), 3);
    }

    #[test]
    fn undo_then_redo_is_identity() {
        let mut buf = Buffer::from_str("hello world");
        let mut log = UndoLog::new();
        let now = t0();
        let removed = buf.delete(5, 6);
        log.record_delete(5, b" world".to_vec(), 11, 5, now);
        assert_eq!(removed, 6);
        assert_eq!(buf.text(), "hello");

        let cursor = log.undo(&mut buf).unwrap();
        assert_eq!(buf.text(), "hello world");
        assert_eq!(cursor, 11);
        let cursor = log.redo(&mut buf).unwrap();
        assert_eq!(buf.text(), "hello");
        assert_eq!(cursor, 5);
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut buf = Buffer::new();
        let mut log = UndoLog::new();
        let now = t0();
        buf.insert(0, b"x").unwrap();
        log.record_insert(0, b"x".to_vec(), 0, 1, now);
        log.undo(&mut buf).unwrap();
        assert_eq!(log.redo_depth(), 1);
        buf.insert(0, b"y").unwrap();
        log.record_insert(0, b"y".to_vec(), 0, 1, now);
        assert_eq!(log.redo_depth(), 0);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut log = UndoLog::new();
        let now = t0();
        for i in 0..(UNDO_HISTORY_MAX + 5) {
            log.record_delete(0, vec![b'x'], i, 0, now);
        }
        assert_eq!(log.undo_depth(), UNDO_HISTORY_MAX);
    }
}
