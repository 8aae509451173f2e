//! Fixed-size LRU cache of compiled patterns.
//!
//! Eight slots, keyed by pattern text, evicting the least recently used
//! entry. Instantiated per search-service owner rather than globally so
//! lifetimes stay local to a document's searches.

use crate::regex::{compile, Program};
use tracing::trace;

const CACHE_SLOTS: usize = 8;

#[derive(Debug)]
struct CacheEntry {
    pattern: String,
    program: Program,
    last_use: u64,
}

#[derive(Debug, Default)]
pub struct RegexCache {
    slots: Vec<CacheEntry>,
    tick: u64,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled program for `pattern`, compiling on miss. Invalid patterns
    /// yield `None` (callers surface the compile error separately when
    /// they need the message).
    pub fn get(&mut self, pattern: &str) -> Option<&Program> {
        self.tick += 1;
        let tick = self.tick;
        if let Some(idx) = self.slots.iter().position(|e| e.pattern == pattern) {
            self.slots[idx].last_use = tick;
            return Some(&self.slots[idx].program);
        }
        let program = match compile(pattern) {
            Ok(p) => p,
            Err(e) => {
                trace!(target: "search.cache", error = %e, "compile_rejected");
                return None;
            }
        };
        let entry = CacheEntry {
            pattern: pattern.to_string(),
            program,
            last_use: tick,
        };
        if self.slots.len() < CACHE_SLOTS {
            self.slots.push(entry);
            return self.slots.last().map(|e| &e.program);
        }
        let victim = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.last_use)
            .map(|(i, _)| i)
            .expect("cache is non-empty when full");
        trace!(target: "search.cache", evicted = %self.slots[victim].pattern, "lru_evict");
        self.slots[victim] = entry;
        Some(&self.slots[victim].program)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_reuses_compiled_program() {
        let mut cache = RegexCache::new();
        assert!(cache.get("a+").is_some());
        assert!(cache.get("a+").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalid_pattern_is_not_cached() {
        let mut cache = RegexCache::new();
        assert!(cache.get("[oops").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = RegexCache::new();
        for i in 0..CACHE_SLOTS {
            cache.get(&format!("p{i}")).unwrap();
        }
        // Touch p0 so p1 becomes the LRU victim.
        cache.get("p0").unwrap();
        cache.get("fresh").unwrap();
        assert_eq!(cache.len(), CACHE_SLOTS);
        let patterns: Vec<&str> = cache.slots.iter().map(|e| e.pattern.as_str()).collect();
        assert!(patterns.contains(&"p0"));
        assert!(patterns.contains(&"fresh"));
        assert!(!patterns.contains(&"p1"));
    }
}
