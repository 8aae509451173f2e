//! Keystroke decoder: terminal bytes in, [`Key`] events out.
//!
//! A byte-oriented state machine over a bounded ring filled by the
//! terminal driver. The only time-dependent state is a lone ESC: if no
//! follow-up byte arrives within [`ESCAPE_TIMEOUT`] the ESC is delivered
//! as [`Key::Escape`], otherwise it introduces an Alt chord, a CSI or SS3
//! sequence, or a Ctrl-Alt chord (ESC followed by a control byte).
//!
//! Bracketed paste (`ESC [ 200 ~ … ESC [ 201 ~`) is consumed whole and
//! surfaced as one [`InputEvent::Paste`] so the dispatcher can treat it as
//! a single atomic insertion and keep it out of macro recordings.
//!
//! Unknown escape sequences are discarded once complete; malformed UTF-8
//! skips one byte and yields nothing, so the decoder always makes
//! progress.

use core_events::{InputEvent, Key};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Ring capacity in bytes; the driver never buffers more than this.
pub const RING_CAPACITY: usize = 4096;

/// Lone-ESC disambiguation deadline.
pub const ESCAPE_TIMEOUT: Duration = Duration::from_millis(100);

const ESC: u8 = 0x1B;
const PASTE_END: &[u8] = b"\x1b[201~";

enum Step {
    Event(InputEvent),
    /// Bytes consumed, nothing to report (skips, discards).
    Continue,
    /// Waiting on more bytes (or the ESC deadline).
    Pending,
}

#[derive(Debug, Default)]
pub struct Decoder {
    ring: VecDeque<u8>,
    /// Set while a lone ESC waits for its disambiguation deadline.
    esc_since: Option<Instant>,
    /// Accumulates bracketed-paste payload bytes.
    paste: Option<Vec<u8>>,
    cancelled: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the terminal. Overflow beyond the ring bound is
    /// dropped and logged.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let room = RING_CAPACITY.saturating_sub(self.ring.len());
        if bytes.len() > room {
            warn!(target: "input.decoder", dropped = bytes.len() - room, "ring_overflow");
        }
        self.ring.extend(bytes.iter().take(room));
    }

    /// Drop pending partial sequences on the next poll.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn pending_bytes(&self) -> usize {
        self.ring.len()
    }

    /// Decode at most one event. `now` drives the ESC deadline; the caller
    /// polls roughly every millisecond.
    pub fn poll(&mut self, now: Instant) -> Option<InputEvent> {
        if self.cancelled {
            self.ring.clear();
            self.esc_since = None;
            self.paste = None;
            self.cancelled = false;
        }
        loop {
            match self.step(now) {
                Step::Event(ev) => return Some(ev),
                Step::Continue => continue,
                Step::Pending => return None,
            }
        }
    }

    /// Decode everything currently decodable.
    pub fn drain(&mut self, now: Instant) -> Vec<InputEvent> {
        let mut out = Vec::new();
        while let Some(ev) = self.poll(now) {
            out.push(ev);
        }
        out
    }

    fn step(&mut self, now: Instant) -> Step {
        if self.paste.is_some() {
            return self.step_paste();
        }
        let Some(&first) = self.ring.front() else {
            return Step::Pending;
        };
        if first != ESC {
            self.esc_since = None;
            return self.step_plain(first);
        }
        // Lone ESC: wait out the deadline.
        if self.ring.len() == 1 {
            match self.esc_since {
                None => {
                    self.esc_since = Some(now);
                    Step::Pending
                }
                Some(since) if now.duration_since(since) >= ESCAPE_TIMEOUT => {
                    self.ring.pop_front();
                    self.esc_since = None;
                    Step::Event(InputEvent::Key(Key::Escape))
                }
                Some(_) => Step::Pending,
            }
        } else {
            self.esc_since = None;
            self.step_escape()
        }
    }

    fn step_plain(&mut self, b: u8) -> Step {
        match b {
            0x20..=0x7E => {
                self.ring.pop_front();
                Step::Event(InputEvent::Key(Key::Char(b)))
            }
            0x00 => {
                self.ring.pop_front();
                Step::Event(InputEvent::Key(Key::Ctrl(b'@')))
            }
            0x09 => {
                self.ring.pop_front();
                Step::Event(InputEvent::Key(Key::Tab))
            }
            0x0A | 0x0D => {
                self.ring.pop_front();
                Step::Event(InputEvent::Key(Key::Enter))
            }
            0x7F => {
                self.ring.pop_front();
                Step::Event(InputEvent::Key(Key::Backspace))
            }
            0x01..=0x1A => {
                self.ring.pop_front();
                Step::Event(InputEvent::Key(Key::Ctrl(b'a' + b - 1)))
            }
            // FS/GS/RS/US arrive for C-\ C-] C-^ C-_ (C-/ sends US).
            0x1C..=0x1F => {
                self.ring.pop_front();
                Step::Event(InputEvent::Key(Key::Ctrl(b + 0x40)))
            }
            0xC2..=0xF4 => self.step_utf8(),
            _ => {
                // Stray continuation or invalid lead: skip one byte.
                self.ring.pop_front();
                trace!(target: "input.decoder", byte = b, "skip_invalid_byte");
                Step::Continue
            }
        }
    }

    fn step_utf8(&mut self) -> Step {
        let slice = self.ring.make_contiguous();
        let want = match slice[0] {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            _ => 4,
        };
        if slice.len() < want {
            return Step::Pending;
        }
        match core_text::decode_next(slice, 0) {
            Some((c, len)) if c != core_text::REPLACEMENT || len > 1 => {
                self.ring.drain(..len);
                Step::Event(InputEvent::Key(Key::Codepoint(c)))
            }
            _ => {
                self.ring.pop_front();
                Step::Continue
            }
        }
    }

    /// ESC plus at least one more byte is buffered.
    fn step_escape(&mut self) -> Step {
        let second = self.ring[1];
        match second {
            b'[' => self.step_csi(),
            b'O' => self.step_ss3(),
            0x20..=0x7E => {
                self.ring.drain(..2);
                Step::Event(InputEvent::Key(Key::Alt(second)))
            }
            // ESC + control byte: Ctrl-Alt chord.
            0x01..=0x1A if !matches!(second, 0x09 | 0x0A | 0x0D) => {
                self.ring.drain(..2);
                Step::Event(InputEvent::Key(Key::CtrlAlt(b'a' + second - 1)))
            }
            ESC => {
                // ESC ESC: deliver the first, reconsider the second.
                self.ring.pop_front();
                Step::Event(InputEvent::Key(Key::Escape))
            }
            _ => {
                // ESC before an unpairable byte: deliver ESC, leave the rest.
                self.ring.pop_front();
                Step::Event(InputEvent::Key(Key::Escape))
            }
        }
    }

    fn step_ss3(&mut self) -> Step {
        let Some(&final_byte) = self.ring.get(2) else {
            return Step::Pending;
        };
        self.ring.drain(..3);
        let key = match final_byte {
            b'P' => Some(Key::F(1)),
            b'Q' => Some(Key::F(2)),
            b'R' => Some(Key::F(3)),
            b'S' => Some(Key::F(4)),
            b'A' => Some(Key::Up),
            b'B' => Some(Key::Down),
            b'C' => Some(Key::Right),
            b'D' => Some(Key::Left),
            b'H' => Some(Key::Home),
            b'F' => Some(Key::End),
            _ => None,
        };
        match key {
            Some(k) => Step::Event(InputEvent::Key(k)),
            None => Step::Continue,
        }
    }

    fn step_csi(&mut self) -> Step {
        // Find the final byte (0x40..=0x7E) after `ESC [` and any
        // parameter/intermediate bytes.
        let slice = self.ring.make_contiguous();
        let mut end = None;
        for (i, &b) in slice.iter().enumerate().skip(2) {
            if (0x40..=0x7E).contains(&b) {
                end = Some(i);
                break;
            }
            // Parameters and intermediates only; anything else aborts.
            if !(0x20..=0x3F).contains(&b) {
                self.ring.drain(..=i);
                return Step::Continue;
            }
        }
        let Some(end) = end else {
            return Step::Pending;
        };
        let params: Vec<u16> = slice[2..end]
            .split(|&b| b == b';')
            .map(|p| {
                p.iter()
                    .filter(|b| b.is_ascii_digit())
                    .fold(0u16, |acc, &b| {
                        acc.saturating_mul(10).saturating_add(u16::from(b - b'0'))
                    })
            })
            .collect();
        let final_byte = slice[end];
        self.ring.drain(..=end);
        self.csi_key(&params, final_byte)
    }

    fn csi_key(&mut self, params: &[u16], final_byte: u8) -> Step {
        // xterm modifier parameter: 2=Shift, 3=Alt, 4=Shift+Alt, 5=Ctrl.
        let modifier = params.get(1).copied().unwrap_or(1);
        let key = match final_byte {
            b'A' => arrow(modifier, Key::Up, Key::ShiftUp, Key::AltUp, Key::ShiftAltUp),
            b'B' => arrow(
                modifier,
                Key::Down,
                Key::ShiftDown,
                Key::AltDown,
                Key::ShiftAltDown,
            ),
            b'C' => arrow(
                modifier,
                Key::Right,
                Key::ShiftRight,
                Key::AltRight,
                Key::ShiftAltRight,
            ),
            b'D' => arrow(
                modifier,
                Key::Left,
                Key::ShiftLeft,
                Key::AltLeft,
                Key::ShiftAltLeft,
            ),
            b'H' => Some(Key::Home),
            b'F' => Some(Key::End),
            b'Z' => Some(Key::ShiftTab),
            b'~' => {
                let code = params.first().copied().unwrap_or(0);
                match code {
                    1 | 7 => Some(Key::Home),
                    4 | 8 => Some(Key::End),
                    3 => match modifier {
                        3 => Some(Key::AltDelete),
                        _ => Some(Key::Delete),
                    },
                    5 => match modifier {
                        2 => Some(Key::ShiftPageUp),
                        3 => Some(Key::AltPageUp),
                        _ => Some(Key::PageUp),
                    },
                    6 => match modifier {
                        2 => Some(Key::ShiftPageDown),
                        3 => Some(Key::AltPageDown),
                        _ => Some(Key::PageDown),
                    },
                    11..=15 => Some(Key::F((code - 10) as u8)),
                    17..=21 => Some(Key::F((code - 11) as u8)),
                    23 | 24 => Some(Key::F((code - 12) as u8)),
                    200 => {
                        self.paste = Some(Vec::new());
                        return Step::Continue;
                    }
                    // Stray paste terminator: discard.
                    201 => return Step::Continue,
                    _ => None,
                }
            }
            _ => None,
        };
        match key {
            Some(k) => Step::Event(InputEvent::Key(k)),
            None => {
                trace!(target: "input.decoder", final_byte, "csi_discarded");
                Step::Continue
            }
        }
    }

    fn step_paste(&mut self) -> Step {
        let buf = self.paste.as_mut().expect("paste mode active");
        while let Some(b) = self.ring.pop_front() {
            buf.push(b);
            if buf.ends_with(PASTE_END) {
                buf.truncate(buf.len() - PASTE_END.len());
                let content = String::from_utf8_lossy(buf).into_owned();
                self.paste = None;
                return Step::Event(InputEvent::Paste(content));
            }
        }
        Step::Pending
    }
}

/// Resolve the xterm modifier parameter for an arrow-style key; unknown
/// modifiers fall back to the plain key.
fn arrow(modifier: u16, plain: Key, shift: Key, alt: Key, shift_alt: Key) -> Option<Key> {
    Some(match modifier {
        2 => shift,
        3 => alt,
        4 => shift_alt,
        _ => plain,
    })
}
