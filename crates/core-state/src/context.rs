//! Per-document editing context: cursor, mark, goal column, kill ring and
//! the modified/read-only flags.

use core_model::FileMeta;
use std::collections::VecDeque;

/// Kill-ring depth; the oldest entry falls off when full.
pub const KILL_RING_MAX: usize = 60;

/// Ordered collection of recently killed/copied byte strings. Yank inserts
/// the most recent.
#[derive(Debug, Default)]
pub struct KillRing {
    entries: VecDeque<Vec<u8>>,
}

impl KillRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new kill to the front. Empty kills are discarded.
    pub fn push(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.entries.push_front(bytes);
        if self.entries.len() > KILL_RING_MAX {
            self.entries.pop_back();
        }
    }

    /// Extend the most recent kill (consecutive `C-k` presses accrete).
    pub fn append_to_front(&mut self, bytes: &[u8]) {
        match self.entries.front_mut() {
            Some(front) => front.extend_from_slice(bytes),
            None => self.push(bytes.to_vec()),
        }
    }

    pub fn most_recent(&self) -> Option<&[u8]> {
        self.entries.front().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Editing state carried by each document alongside its buffer.
#[derive(Debug, Default)]
pub struct EditContext {
    /// Byte position, always on a grapheme boundary.
    pub cursor: usize,
    /// Selection anchor; the active region is `[min, max)` of cursor/mark.
    pub mark: Option<usize>,
    /// Column that vertical motion snaps back to; cleared by any
    /// horizontal motion.
    pub goal_column: Option<usize>,
    pub kill_ring: KillRing,
    pub modified: bool,
    pub read_only: bool,
    pub last_save: FileMeta,
}

impl EditContext {
    /// The active region, ordered, when a mark is set and non-empty.
    pub fn region(&self) -> Option<(usize, usize)> {
        let mark = self.mark?;
        if mark == self.cursor {
            return None;
        }
        Some((mark.min(self.cursor), mark.max(self.cursor)))
    }

    /// Clamp cursor and mark into `[0, len]` after an external edit.
    pub fn clamp(&mut self, len: usize) {
        self.cursor = self.cursor.min(len);
        if let Some(m) = self.mark {
            self.mark = Some(m.min(len));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_ring_orders_and_bounds() {
        let mut ring = KillRing::new();
        ring.push(b"".to_vec());
        assert!(ring.is_empty());
        for i in 0..(KILL_RING_MAX + 3) {
            ring.push(format!("kill{i}").into_bytes());
        }
        assert_eq!(ring.len(), KILL_RING_MAX);
        assert_eq!(ring.most_recent(), Some(&b"kill62"[..]));
    }

    #[test]
    fn kill_ring_accretes_front() {
        let mut ring = KillRing::new();
        ring.push(b"abc".to_vec());
        ring.append_to_front(b"\n");
        assert_eq!(ring.most_recent(), Some(&b"abc\n"[..]));
    }

    #[test]
    fn region_orders_endpoints() {
        let mut ctx = EditContext::default();
        assert_eq!(ctx.region(), None);
        ctx.mark = Some(7);
        ctx.cursor = 3;
        assert_eq!(ctx.region(), Some((3, 7)));
        ctx.cursor = 7;
        assert_eq!(ctx.region(), None);
    }

    #[test]
    fn clamp_pulls_positions_in() {
        let mut ctx = EditContext {
            cursor: 10,
            mark: Some(12),
            ..Default::default()
        };
        ctx.clamp(5);
        assert_eq!(ctx.cursor, 5);
        assert_eq!(ctx.mark, Some(5));
    }
}
