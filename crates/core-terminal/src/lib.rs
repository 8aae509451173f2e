//! Terminal driver: raw-mode lifecycle, the blocking stdin reader thread,
//! and the crossterm-backed cell sink the renderer writes through.
//!
//! Everything here is the out-of-core collaborator surface: the editing
//! core only sees `Key` events coming out of the queue and a
//! [`core_render::RenderSink`] going back in.

use anyhow::{Context, Result};
use core_events::InputSender;
use core_input::Decoder;
use core_render::{CellAttrs, RenderSink};
use crossterm::style::Attribute;
use crossterm::{cursor, event, execute, queue, style, terminal};
use std::io::{Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Stdin poll granularity; also drives the decoder's ESC deadline.
const STDIN_POLL: Duration = Duration::from_millis(1);

/// RAII guard: raw mode + alternate screen + bracketed paste, restored on
/// drop (and from the panic hook via [`restore_terminal`]).
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("terminal unavailable")?;
        let mut out = std::io::stdout();
        execute!(
            out,
            terminal::EnterAlternateScreen,
            event::EnableBracketedPaste,
            cursor::Show,
        )
        .context("terminal setup failed")?;
        debug!(target: "terminal", "raw_mode_entered");
        Ok(Self { active: true })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            restore_terminal();
        }
    }
}

/// Best-effort terminal restoration; safe to call twice (panic hook and
/// guard drop).
pub fn restore_terminal() {
    let mut out = std::io::stdout();
    let _ = execute!(
        out,
        event::DisableBracketedPaste,
        terminal::LeaveAlternateScreen,
        cursor::Show,
        style::SetAttribute(Attribute::Reset),
    );
    let _ = terminal::disable_raw_mode();
}

/// Current terminal size in cells.
pub fn size() -> Result<(u16, u16)> {
    terminal::size().context("cannot query terminal size")
}

/// Spawn the dedicated input thread: poll stdin with a ~1 ms timeout,
/// decode bytes, push events. Exits when `stop` flips or stdin closes.
pub fn spawn_input_thread(tx: InputSender, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("ze-input".to_string())
        .spawn(move || {
            let mut decoder = Decoder::new();
            let mut buf = [0u8; 1024];
            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                if poll_stdin(STDIN_POLL) {
                    // SAFETY: plain read(2) on fd 0 into a stack buffer.
                    let n = unsafe {
                        libc::read(0, buf.as_mut_ptr().cast(), buf.len())
                    };
                    match n {
                        0 => {
                            warn!(target: "terminal.input", "stdin closed");
                            break;
                        }
                        n if n < 0 => {
                            let err = std::io::Error::last_os_error();
                            if err.kind() != std::io::ErrorKind::Interrupted {
                                warn!(target: "terminal.input", error = %err, "stdin read failed");
                                break;
                            }
                        }
                        n => decoder.push_bytes(&buf[..n as usize]),
                    }
                }
                for event in decoder.drain(Instant::now()) {
                    tx.send(event);
                }
            }
        })
        .expect("spawn input thread")
}

/// `poll(2)` on fd 0: readable within `timeout`?
fn poll_stdin(timeout: Duration) -> bool {
    let mut fds = libc::pollfd {
        fd: 0,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: one valid pollfd, millisecond timeout.
    let r = unsafe { libc::poll(&mut fds, 1, timeout.as_millis() as i32) };
    r > 0 && fds.revents & libc::POLLIN != 0
}

/// Crossterm implementation of the renderer's cell sink. Writes are
/// queued and flushed once per frame.
pub struct CrosstermSink {
    out: Stdout,
    attrs: CellAttrs,
}

impl CrosstermSink {
    pub fn new() -> Self {
        Self {
            out: std::io::stdout(),
            attrs: CellAttrs::empty(),
        }
    }

    /// Park the hardware cursor (end of frame).
    pub fn place_cursor(&mut self, x: u16, y: u16) {
        let _ = queue!(self.out, cursor::MoveTo(x, y), cursor::Show);
        let _ = self.out.flush();
    }

    fn apply_attrs(&mut self, attrs: CellAttrs) {
        if attrs == self.attrs {
            return;
        }
        let _ = queue!(self.out, style::SetAttribute(Attribute::Reset));
        if attrs.contains(CellAttrs::REVERSE) {
            let _ = queue!(self.out, style::SetAttribute(Attribute::Reverse));
        }
        if attrs.contains(CellAttrs::BOLD) {
            let _ = queue!(self.out, style::SetAttribute(Attribute::Bold));
        }
        if attrs.contains(CellAttrs::DIM) {
            let _ = queue!(self.out, style::SetAttribute(Attribute::Dim));
        }
        self.attrs = attrs;
    }
}

impl Default for CrosstermSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for CrosstermSink {
    fn move_to(&mut self, x: u16, y: u16) {
        let _ = queue!(self.out, cursor::MoveTo(x, y));
    }

    fn write(&mut self, text: &str, attrs: CellAttrs) {
        self.apply_attrs(attrs);
        let _ = queue!(self.out, style::Print(text));
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}
