//! Minibuffer/command history with navigation and on-disk persistence.
//!
//! One store shared by all prompts: empty entries are discarded, a
//! consecutive duplicate of the newest entry is discarded, and the store
//! holds at most [`HISTORY_MAX`] entries with oldest-first eviction.
//! Navigation snapshots the in-progress input as a temp slot: `prev` walks
//! toward the oldest entry (which repeats at the boundary), `next` walks
//! back and finally restores the temp.
//!
//! Persistence is a line-oriented UTF-8 file under `~/.ze/`, one entry per
//! line, newest last.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maximum retained entries.
pub const HISTORY_MAX: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history io: {0}")]
    Io(#[from] std::io::Error),
    #[error("no home directory")]
    NoHome,
}

#[derive(Debug)]
struct Navigation {
    /// Index into `entries`; `entries.len()` means "at the temp slot".
    index: usize,
    temp: String,
}

#[derive(Debug, Default)]
pub struct History {
    /// Oldest first, newest last.
    entries: Vec<String>,
    nav: Option<Navigation>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry, subject to the discard rules.
    pub fn add(&mut self, entry: &str) {
        if entry.is_empty() {
            return;
        }
        if self.entries.last().is_some_and(|last| last == entry) {
            return;
        }
        self.entries.push(entry.to_string());
        if self.entries.len() > HISTORY_MAX {
            let excess = self.entries.len() - HISTORY_MAX;
            self.entries.drain(..excess);
        }
    }

    /// Begin history navigation, saving the current prompt input.
    pub fn start_navigation(&mut self, current_input: &str) {
        self.nav = Some(Navigation {
            index: self.entries.len(),
            temp: current_input.to_string(),
        });
    }

    /// The next-older entry; bounded at the oldest, which repeats.
    pub fn prev(&mut self) -> Option<&str> {
        let nav = self.nav.as_mut()?;
        if self.entries.is_empty() {
            return None;
        }
        if nav.index > 0 {
            nav.index -= 1;
        }
        self.entries.get(nav.index).map(String::as_str)
    }

    /// The next-newer entry; stepping past the newest restores the saved
    /// input once, after which there is nothing newer.
    pub fn next(&mut self) -> Option<&str> {
        let nav = self.nav.as_mut()?;
        if nav.index >= self.entries.len() {
            return None;
        }
        nav.index += 1;
        if nav.index == self.entries.len() {
            return Some(nav.temp.as_str());
        }
        self.entries.get(nav.index).map(String::as_str)
    }

    /// Drop the temp slot and position.
    pub fn reset_navigation(&mut self) {
        self.nav = None;
    }

    pub fn is_navigating(&self) -> bool {
        self.nav.is_some()
    }

    /// Replace contents from a line sequence (load path).
    pub fn set_entries(&mut self, lines: Vec<String>) {
        self.entries = lines
            .into_iter()
            .filter(|l| !l.is_empty())
            .collect();
        if self.entries.len() > HISTORY_MAX {
            let excess = self.entries.len() - HISTORY_MAX;
            self.entries.drain(..excess);
        }
        self.nav = None;
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// `~/.ze/history`.
pub fn default_history_path() -> Result<PathBuf, HistoryError> {
    let home = dirs::home_dir().ok_or(HistoryError::NoHome)?;
    Ok(home.join(".ze").join("history"))
}

/// Load history lines from `path`; a missing file is an empty history.
pub fn load_history(path: &Path) -> Result<Vec<String>, HistoryError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Write history lines to `path`, creating parent directories.
pub fn save_history(path: &Path, entries: &[String]) -> Result<(), HistoryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    for entry in entries.iter().rev().take(HISTORY_MAX).rev() {
        writeln!(file, "{entry}")?;
    }
    debug!(target: "state.history", entries = entries.len().min(HISTORY_MAX), "history_saved");
    Ok(())
}
