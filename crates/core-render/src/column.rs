//! Byte offset ↔ visual column within one line.
//!
//! Columns accumulate grapheme display widths; a tab advances to the next
//! multiple of the tab width. Both directions stay on grapheme boundaries.

use core_text::{egc_width, grapheme, next_tab_stop};

/// Width contributed by `cluster` when it starts at `col`.
pub fn cluster_advance(cluster: &str, col: usize, tab_width: usize) -> usize {
    if cluster == "\t" {
        next_tab_stop(col, tab_width) - col
    } else {
        egc_width(cluster)
    }
}

/// Visual column of `byte_in_line` (0 at line start). Offsets inside a
/// cluster report the cluster's start column.
pub fn byte_to_column(line: &str, byte_in_line: usize, tab_width: usize) -> usize {
    let mut col = 0;
    for (idx, g) in grapheme::iter_indices(line) {
        if idx >= byte_in_line {
            break;
        }
        col += cluster_advance(g, col, tab_width);
    }
    col
}

/// Byte offset of the last grapheme boundary whose end column is at most
/// `target`. The inverse of [`byte_to_column`] for reachable columns.
pub fn column_to_byte(line: &str, target: usize, tab_width: usize) -> usize {
    let mut col = 0;
    for (idx, g) in grapheme::iter_indices(line) {
        let advance = cluster_advance(g, col, tab_width);
        if col + advance > target {
            return idx;
        }
        col += advance;
    }
    line.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ascii_columns() {
        assert_eq!(byte_to_column("hello", 0, 4), 0);
        assert_eq!(byte_to_column("hello", 3, 4), 3);
        assert_eq!(column_to_byte("hello", 3, 4), 3);
        assert_eq!(column_to_byte("hello", 99, 4), 5);
    }

    #[test]
    fn tabs_expand_to_stops() {
        // "a\tb": a at col 0, tab advances to col 4, b at col 4.
        assert_eq!(byte_to_column("a\tb", 2, 4), 4);
        assert_eq!(byte_to_column("\t\t", 2, 4), 8);
        assert_eq!(column_to_byte("a\tb", 4, 4), 2);
        // Columns inside the tab's span snap back to the tab.
        assert_eq!(column_to_byte("a\tb", 2, 4), 1);
    }

    #[test]
    fn tab_width_is_configurable() {
        assert_eq!(byte_to_column("\tx", 1, 8), 8);
        assert_eq!(byte_to_column("\tx", 1, 2), 2);
    }

    #[test]
    fn wide_chars_take_two_columns() {
        let s = "a日本b";
        assert_eq!(byte_to_column(s, 1, 4), 1);
        assert_eq!(byte_to_column(s, 4, 4), 3);
        assert_eq!(byte_to_column(s, 7, 4), 5);
        // Column 2 lands inside 日; snap to its start byte.
        assert_eq!(column_to_byte(s, 2, 4), 1);
        assert_eq!(column_to_byte(s, 3, 4), 4);
    }

    #[test]
    fn combining_cluster_is_one_column() {
        let s = "e\u{0301}x";
        assert_eq!(byte_to_column(s, 3, 4), 1);
        assert_eq!(column_to_byte(s, 1, 4), 3);
    }

    proptest! {
        #[test]
        fn round_trip_on_boundaries(line in "[a-z\\t日é]{0,24}", tw in 1usize..=16) {
            let mut byte = 0;
            while byte <= line.len() {
                let col = byte_to_column(&line, byte, tw);
                prop_assert_eq!(column_to_byte(&line, col, tw), byte);
                if byte == line.len() {
                    break;
                }
                byte = core_text::grapheme::boundary_after(&line, byte);
            }
        }
    }
}
