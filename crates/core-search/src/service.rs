//! Literal and regex search with wraparound, over the assembled document
//! text. Case-sensitive throughout; at most one match per call.

use crate::cache::RegexCache;
use tracing::debug;

/// A single search hit, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Default)]
pub struct SearchService {
    cache: RegexCache,
}

impl SearchService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest literal match at or after `start`; wraps to `[0, start)`
    /// when the tail has none.
    pub fn search_forward(&self, text: &[u8], pattern: &[u8], start: usize) -> Option<Match> {
        if pattern.is_empty() || text.is_empty() {
            return None;
        }
        find_literal(text, pattern, start, text.len())
            .or_else(|| find_literal(text, pattern, 0, start))
    }

    /// Highest literal match starting before `start`; wraps to the match
    /// with the maximal start in `[start, len)`.
    pub fn search_backward(&self, text: &[u8], pattern: &[u8], start: usize) -> Option<Match> {
        if pattern.is_empty() || text.is_empty() {
            return None;
        }
        rfind_literal(text, pattern, 0, start)
            .or_else(|| rfind_literal(text, pattern, start, text.len()))
    }

    /// Regex forward search with the same wraparound shape. Invalid
    /// patterns are swallowed (`None`).
    pub fn search_regex_forward(
        &mut self,
        text: &[u8],
        pattern: &str,
        start: usize,
    ) -> Option<Match> {
        if pattern.is_empty() || text.is_empty() {
            return None;
        }
        let program = self.cache.get(pattern)?;
        let hit = program
            .search(text, start)
            .or_else(|| program.search(text, 0));
        debug!(target: "search.service", pattern_len = pattern.len(), hit = hit.is_some(), "regex_forward");
        hit.map(|(start, len)| Match { start, len })
    }

    /// Regex backward search: candidates from `start - 1` downward, then
    /// wrapping to scan from the end of the text.
    pub fn search_regex_backward(
        &mut self,
        text: &[u8],
        pattern: &str,
        start: usize,
    ) -> Option<Match> {
        if pattern.is_empty() || text.is_empty() {
            return None;
        }
        let program = self.cache.get(pattern)?;
        let hit = program
            .search_backward(text, start)
            .or_else(|| program.search_backward(text, text.len()));
        hit.map(|(start, len)| Match { start, len })
    }
}

fn find_literal(text: &[u8], pattern: &[u8], from: usize, to: usize) -> Option<Match> {
    let m = pattern.len();
    if m > text.len() {
        return None;
    }
    let last = text.len() - m;
    for s in from..to.min(last + 1) {
        if &text[s..s + m] == pattern {
            return Some(Match { start: s, len: m });
        }
    }
    None
}

fn rfind_literal(text: &[u8], pattern: &[u8], from: usize, to: usize) -> Option<Match> {
    let m = pattern.len();
    if m > text.len() {
        return None;
    }
    let last = text.len() - m;
    for s in (from..to.min(last + 1)).rev() {
        if &text[s..s + m] == pattern {
            return Some(Match { start: s, len: m });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_finds_lowest() {
        let s = SearchService::new();
        let hit = s.search_forward(b"abcabc", b"bc", 0).unwrap();
        assert_eq!(hit, Match { start: 1, len: 2 });
    }

    #[test]
    fn forward_wraps_around() {
        let s = SearchService::new();
        let hit = s.search_forward(b"hello world", b"hello", 10).unwrap();
        assert_eq!(hit, Match { start: 0, len: 5 });
    }

    #[test]
    fn backward_searches_before_start_then_wraps() {
        let s = SearchService::new();
        let text = b"abxabxab";
        let hit = s.search_backward(text, b"ab", 7).unwrap();
        assert_eq!(hit.start, 3);
        // Nothing before 2: wrap to the maximal start.
        let hit = s.search_backward(text, b"ab", 2).unwrap();
        assert_eq!(hit.start, 6);
    }

    #[test]
    fn empty_inputs_yield_none() {
        let s = SearchService::new();
        assert!(s.search_forward(b"", b"x", 0).is_none());
        assert!(s.search_forward(b"x", b"", 0).is_none());
        assert!(s.search_backward(b"", b"x", 0).is_none());
    }

    #[test]
    fn regex_forward_and_invalid_pattern() {
        let mut s = SearchService::new();
        let hit = s.search_regex_forward(b"foo123", "\\d+", 0).unwrap();
        assert_eq!(hit, Match { start: 3, len: 3 });
        assert!(s.search_regex_forward(b"foo123", "[bad", 0).is_none());
    }

    #[test]
    fn regex_backward_latest_candidate_then_wrap() {
        let mut s = SearchService::new();
        let text = b"abc123def456";
        let hit = s.search_regex_backward(text, "\\d+", 12).unwrap();
        assert_eq!(hit, Match { start: 11, len: 1 });
        let hit = s.search_regex_backward(text, "\\d+", 3).unwrap();
        assert_eq!(hit, Match { start: 11, len: 1 });
    }

    #[test]
    fn regex_forward_wraps() {
        let mut s = SearchService::new();
        let hit = s.search_regex_forward(b"12ab", "[0-9]+", 3).unwrap();
        assert_eq!(hit, Match { start: 0, len: 2 });
    }
}
