//! Keyboard macro recorder: capture a key sequence, replay it through the
//! dispatcher.
//!
//! States: Idle → Recording (`C-x (`), back to Idle on `C-x )` which
//! commits the capture as the last macro only when non-empty, preserving
//! the prior macro otherwise. Playback (`C-x e`) forbids reentrancy via a
//! nesting counter and suppresses starting a recording.

use core_events::Key;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroState {
    Idle,
    Recording,
    Playing,
}

#[derive(Debug)]
pub struct MacroRecorder {
    state: MacroState,
    capture: Vec<Key>,
    last: Vec<Key>,
    nesting: u32,
}

impl Default for MacroRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroRecorder {
    pub fn new() -> Self {
        Self {
            state: MacroState::Idle,
            capture: Vec::new(),
            last: Vec::new(),
            nesting: 0,
        }
    }

    pub fn state(&self) -> MacroState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == MacroState::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.state == MacroState::Playing
    }

    /// Begin capturing. Only allowed from Idle.
    pub fn start_recording(&mut self) -> bool {
        if self.state != MacroState::Idle {
            return false;
        }
        self.capture.clear();
        self.state = MacroState::Recording;
        debug!(target: "actions.macro", "record_start");
        true
    }

    pub fn record_key(&mut self, key: Key) {
        if self.state == MacroState::Recording {
            self.capture.push(key);
        }
    }

    /// Commit the capture as the last macro; an empty capture preserves
    /// the previous macro.
    pub fn stop_recording(&mut self) -> bool {
        if self.state != MacroState::Recording {
            return false;
        }
        self.state = MacroState::Idle;
        if !self.capture.is_empty() {
            self.last = std::mem::take(&mut self.capture);
        }
        debug!(target: "actions.macro", keys = self.last.len(), "record_stop");
        true
    }

    /// Abandon the capture, keeping the previous macro.
    pub fn cancel_recording(&mut self) {
        if self.state == MacroState::Recording {
            self.capture.clear();
            self.state = MacroState::Idle;
        }
    }

    /// Enter playback, returning the keys to replay. `None` while already
    /// playing (reentrancy) or with no recorded macro.
    pub fn begin_playback(&mut self) -> Option<Vec<Key>> {
        if self.nesting > 0 || self.last.is_empty() || self.state == MacroState::Recording {
            return None;
        }
        self.state = MacroState::Playing;
        self.nesting += 1;
        Some(self.last.clone())
    }

    pub fn end_playback(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
        if self.nesting == 0 && self.state == MacroState::Playing {
            self.state = MacroState::Idle;
        }
    }

    pub fn last_macro(&self) -> &[Key] {
        &self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_commit() {
        let mut m = MacroRecorder::new();
        assert!(m.start_recording());
        m.record_key(Key::Char(b'a'));
        m.record_key(Key::Enter);
        assert!(m.stop_recording());
        assert_eq!(m.last_macro(), &[Key::Char(b'a'), Key::Enter]);
    }

    #[test]
    fn empty_capture_preserves_previous() {
        let mut m = MacroRecorder::new();
        m.start_recording();
        m.record_key(Key::Char(b'x'));
        m.stop_recording();
        m.start_recording();
        m.stop_recording();
        assert_eq!(m.last_macro(), &[Key::Char(b'x')]);
    }

    #[test]
    fn cancel_reverts() {
        let mut m = MacroRecorder::new();
        m.start_recording();
        m.record_key(Key::Char(b'q'));
        m.stop_recording();
        m.start_recording();
        m.record_key(Key::Char(b'z'));
        m.cancel_recording();
        assert_eq!(m.last_macro(), &[Key::Char(b'q')]);
        assert_eq!(m.state(), MacroState::Idle);
    }

    #[test]
    fn double_start_rejected() {
        let mut m = MacroRecorder::new();
        assert!(m.start_recording());
        assert!(!m.start_recording());
    }

    #[test]
    fn playback_forbids_reentrancy() {
        let mut m = MacroRecorder::new();
        m.start_recording();
        m.record_key(Key::Char(b'a'));
        m.stop_recording();
        let keys = m.begin_playback().unwrap();
        assert_eq!(keys, vec![Key::Char(b'a')]);
        // A nested C-x e inside the playback is refused.
        assert!(m.begin_playback().is_none());
        // Recording cannot start mid-playback.
        assert!(!m.start_recording());
        m.end_playback();
        assert_eq!(m.state(), MacroState::Idle);
        assert!(m.begin_playback().is_some());
    }

    #[test]
    fn playback_without_macro_is_none() {
        let mut m = MacroRecorder::new();
        assert!(m.begin_playback().is_none());
    }
}
