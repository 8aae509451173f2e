//! Search subsystem: a small self-contained regex engine, an LRU cache of
//! compiled patterns, and the wraparound literal/regex search service.

pub mod cache;
pub mod regex;
pub mod service;

pub use cache::RegexCache;
pub use regex::{compile, is_regex_pattern, CompileError, Program};
pub use service::{Match, SearchService};
