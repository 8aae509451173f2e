//! Normalization + segmentation adapter for externally supplied text.
//!
//! Pasted and shell-produced text arrives in arbitrary composition form;
//! it is normalized to NFC once here and segmented into grapheme clusters
//! with byte ranges and widths. Clusters are in order, non-overlapping, and
//! concatenate to the normalized string. Callers must not log the content,
//! only lengths.

use crate::width::egc_width;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Byte offset in the normalized string (inclusive).
    pub start: usize,
    /// Byte offset in the normalized string (exclusive).
    pub end: usize,
    /// Terminal cell width of the cluster.
    pub width: usize,
}

/// Normalize to NFC and segment into grapheme clusters.
pub fn normalize_and_segment(input: &str) -> (String, Vec<Segment>) {
    let normalized: String = input.nfc().collect();
    let mut out = Vec::new();
    let mut byte = 0usize;
    for g in normalized.graphemes(true) {
        let len = g.len();
        out.push(Segment {
            start: byte,
            end: byte + len,
            width: egc_width(g),
        });
        byte += len;
    }
    (normalized, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nfc_composes_decomposed_accent() {
        let (n1, s1) = normalize_and_segment("e\u{0301}");
        let (n2, s2) = normalize_and_segment("\u{00E9}");
        assert_eq!(n1, n2);
        assert_eq!(s1, s2);
        assert_eq!(s1.len(), 1);
        assert_eq!(s1[0].width, 1);
    }

    #[test]
    fn segments_cover_string() {
        let (n, segs) = normalize_and_segment("漢😀a b");
        let mut prev_end = 0;
        for seg in &segs {
            assert_eq!(seg.start, prev_end);
            prev_end = seg.end;
        }
        assert_eq!(prev_end, n.len());
    }
}
