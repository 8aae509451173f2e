//! Key algebra and the input-thread → main-loop event queue.
//!
//! -------------------------------------------------------------------------
//! Channel policy
//! -------------------------------------------------------------------------
//! One producer (the blocking input thread) and one consumer (the main
//! loop) share a bounded crossbeam channel. The bound (1024 events) exists
//! for memory safety only; hitting it means the main loop has stalled for
//! whole seconds, so the overflow path drops the incoming event, counts it,
//! and logs a warning rather than blocking the reader. Within the channel,
//! an event produced at time t is always observed before anything produced
//! later.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Queue capacity; comfortably above any human input burst.
pub const INPUT_QUEUE_CAP: usize = 1024;

/// Events dropped because the queue was full (pathological; logged).
pub static EVENTS_DROPPED: AtomicU64 = AtomicU64::new(0);
/// Total events enqueued.
pub static EVENTS_SENT: AtomicU64 = AtomicU64::new(0);

/// A decoded keystroke. `Char` carries printable ASCII; anything beyond
/// ASCII arrives as `Codepoint`. Modifier-carrying variants store the base
/// ASCII byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(u8),
    Codepoint(char),
    Ctrl(u8),
    Alt(u8),
    CtrlAlt(u8),
    Enter,
    Tab,
    ShiftTab,
    CtrlTab,
    CtrlShiftTab,
    Backspace,
    Escape,
    Delete,
    AltDelete,
    Home,
    End,
    PageUp,
    PageDown,
    ShiftPageUp,
    ShiftPageDown,
    AltPageUp,
    AltPageDown,
    Up,
    Down,
    Left,
    Right,
    ShiftUp,
    ShiftDown,
    ShiftLeft,
    ShiftRight,
    AltUp,
    AltDown,
    AltLeft,
    AltRight,
    ShiftAltUp,
    ShiftAltDown,
    ShiftAltLeft,
    ShiftAltRight,
    F(u8),
}

impl Key {
    /// The codepoint this key would insert into a buffer, if any.
    pub fn insertable(self) -> Option<char> {
        match self {
            Key::Char(b) => Some(b as char),
            Key::Codepoint(c) => Some(c),
            Key::Tab => Some('\t'),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(b) => write!(f, "{}", *b as char),
            Key::Codepoint(c) => write!(f, "{c}"),
            Key::Ctrl(b) => write!(f, "C-{}", *b as char),
            Key::Alt(b) => write!(f, "M-{}", *b as char),
            Key::CtrlAlt(b) => write!(f, "C-M-{}", *b as char),
            Key::Enter => write!(f, "RET"),
            Key::Tab => write!(f, "TAB"),
            Key::ShiftTab => write!(f, "S-TAB"),
            Key::CtrlTab => write!(f, "C-TAB"),
            Key::CtrlShiftTab => write!(f, "C-S-TAB"),
            Key::Backspace => write!(f, "DEL"),
            Key::Escape => write!(f, "ESC"),
            Key::Delete => write!(f, "<delete>"),
            Key::AltDelete => write!(f, "M-<delete>"),
            Key::Home => write!(f, "<home>"),
            Key::End => write!(f, "<end>"),
            Key::PageUp => write!(f, "<prior>"),
            Key::PageDown => write!(f, "<next>"),
            Key::ShiftPageUp => write!(f, "S-<prior>"),
            Key::ShiftPageDown => write!(f, "S-<next>"),
            Key::AltPageUp => write!(f, "M-<prior>"),
            Key::AltPageDown => write!(f, "M-<next>"),
            Key::Up => write!(f, "<up>"),
            Key::Down => write!(f, "<down>"),
            Key::Left => write!(f, "<left>"),
            Key::Right => write!(f, "<right>"),
            Key::ShiftUp => write!(f, "S-<up>"),
            Key::ShiftDown => write!(f, "S-<down>"),
            Key::ShiftLeft => write!(f, "S-<left>"),
            Key::ShiftRight => write!(f, "S-<right>"),
            Key::AltUp => write!(f, "M-<up>"),
            Key::AltDown => write!(f, "M-<down>"),
            Key::AltLeft => write!(f, "M-<left>"),
            Key::AltRight => write!(f, "M-<right>"),
            Key::ShiftAltUp => write!(f, "S-M-<up>"),
            Key::ShiftAltDown => write!(f, "S-M-<down>"),
            Key::ShiftAltLeft => write!(f, "S-M-<left>"),
            Key::ShiftAltRight => write!(f, "S-M-<right>"),
            Key::F(n) => write!(f, "<f{n}>"),
        }
    }
}

/// What the input thread hands the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(Key),
    /// Bracketed paste content, decoded and delivered as one unit so the
    /// dispatcher can make it a single atomic insertion. Never recorded
    /// into keyboard macros.
    Paste(String),
}

/// Producer half of the input queue.
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: crossbeam_channel::Sender<InputEvent>,
}

impl InputSender {
    /// Enqueue; a full queue drops the event (counted and logged).
    pub fn send(&self, event: InputEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {
                EVENTS_SENT.fetch_add(1, Ordering::Relaxed);
            }
            Err(crossbeam_channel::TrySendError::Full(ev)) => {
                EVENTS_DROPPED.fetch_add(1, Ordering::Relaxed);
                warn!(target: "events.queue", dropped = ?discriminant_name(&ev), "input_queue_full");
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Consumer half of the input queue. Cloned once by the driver so shell
/// cancellation can poll for `C-g` while the main loop is blocked on a
/// child process.
#[derive(Debug, Clone)]
pub struct InputReceiver {
    rx: crossbeam_channel::Receiver<InputEvent>,
}

impl InputReceiver {
    pub fn try_recv(&self) -> Option<InputEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<InputEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.rx.try_recv() {
            out.push(ev);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Build the bounded single-producer/single-consumer queue.
pub fn input_channel() -> (InputSender, InputReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(INPUT_QUEUE_CAP);
    (InputSender { tx }, InputReceiver { rx })
}

fn discriminant_name(ev: &InputEvent) -> &'static str {
    match ev {
        InputEvent::Key(_) => "key",
        InputEvent::Paste(_) => "paste",
    }
}
