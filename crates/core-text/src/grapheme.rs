//! Grapheme-cluster boundary helpers.
//!
//! Thin adapters over `unicode-segmentation` (UAX #29 extended clusters)
//! operating on a single `&str` slice with byte offsets. Cursor motion and
//! rendering never split a cluster: ZWJ emoji, regional-indicator pairs,
//! spacing marks and CR+LF all stay atomic.

use unicode_segmentation::UnicodeSegmentation;

/// Iterate grapheme clusters of `text` in order.
pub fn iter(text: &str) -> impl Iterator<Item = &str> {
    text.graphemes(true)
}

/// Iterate `(byte_offset, cluster)` pairs.
pub fn iter_indices(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.grapheme_indices(true)
}

/// First boundary strictly after `byte`. Returns `text.len()` at or past the
/// last cluster. `byte` need not itself be a boundary.
pub fn boundary_after(text: &str, byte: usize) -> usize {
    if byte >= text.len() {
        return text.len();
    }
    for (idx, _) in text.grapheme_indices(true) {
        if idx > byte {
            return idx;
        }
    }
    text.len()
}

/// Last boundary strictly before `byte`. Returns 0 at or before the first
/// cluster.
pub fn boundary_before(text: &str, byte: usize) -> usize {
    if byte == 0 {
        return 0;
    }
    let byte = byte.min(text.len());
    let mut last = 0;
    for (idx, _) in text.grapheme_indices(true) {
        if idx >= byte {
            break;
        }
        last = idx;
    }
    last
}

/// Snap `byte` down to the nearest boundary at or before it.
pub fn snap_to_boundary(text: &str, byte: usize) -> usize {
    if byte >= text.len() {
        return text.len();
    }
    if text.is_char_boundary(byte) && is_boundary(text, byte) {
        return byte;
    }
    boundary_before(text, byte.saturating_add(1).min(text.len()))
}

/// True if `byte` sits on a cluster boundary (0 and `len` always are).
pub fn is_boundary(text: &str, byte: usize) -> bool {
    if byte == 0 || byte == text.len() {
        return true;
    }
    text.grapheme_indices(true).any(|(idx, _)| idx == byte)
}

/// The cluster starting at `byte`, if any.
pub fn cluster_at(text: &str, byte: usize) -> Option<&str> {
    if byte >= text.len() {
        return None;
    }
    let end = boundary_after(text, byte);
    text.get(byte..end)
}
