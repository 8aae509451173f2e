//! ze: a zero-configuration terminal editor for SSH sessions.
//!
//! Startup: CLI → logging → raw terminal → editor → main loop. The loop
//! runs one frame per 8 ms tick: drain the input queue, dispatch each
//! event, rebuild and diff-flush the frame, park the cursor, sleep out
//! the tick. A dedicated thread polls stdin and feeds the decoder.

mod file_io;

use anyhow::{Context, Result};
use clap::Parser;
use core_actions::{DispatchState, Editor, EditorIo, LoadedFile};
use core_events::{input_channel, InputEvent, InputReceiver, Key};
use core_model::FileMeta;
use core_render::{CellAttrs, Grid, Renderer};
use core_state::history::{default_history_path, load_history, save_history};
use core_state::Document;
use core_terminal::{restore_terminal, size, spawn_input_thread, CrosstermSink, TerminalGuard};
use core_text::grapheme;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Frame budget: one tick of the main loop.
const TICK: Duration = Duration::from_millis(8);

#[derive(Parser, Debug)]
#[command(name = "ze", version, about = "Terminal text editor for SSH sessions")]
struct Args {
    /// Open the file read-only.
    #[arg(short = 'R', long = "read-only")]
    read_only: bool,
    /// File to open; starts with *scratch* when omitted.
    file: Option<PathBuf>,
}

/// Filesystem + cancellation driver behind the dispatcher's I/O seam.
struct FsIo {
    /// Second handle on the input queue, polled for `C-g` while a shell
    /// child runs. Other keys arriving mid-command are dropped.
    rx: InputReceiver,
}

impl EditorIo for FsIo {
    fn load(&mut self, path: &Path) -> Result<LoadedFile> {
        file_io::load_file(path)
    }

    fn save(&mut self, doc: &Document) -> Result<FileMeta> {
        file_io::save_file(doc)
    }

    fn poll_cancel(&mut self) -> bool {
        while let Some(ev) = self.rx.try_recv() {
            match ev {
                InputEvent::Key(Key::Ctrl(b'g')) => return true,
                other => {
                    warn!(target: "runtime.shell", dropped = ?std::mem::discriminant(&other), "key during shell command");
                }
            }
        }
        false
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            restore_terminal();
            eprintln!("ze: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    let (tx, rx) = input_channel();
    let _guard = TerminalGuard::enter()?;
    let (cols, rows) = size()?;

    let io = FsIo { rx: rx.clone() };
    let mut editor = Editor::new(Box::new(io), cols, rows);
    if let Some(path) = &args.file {
        editor
            .open_initial_file(&path.to_string_lossy(), args.read_only)
            .with_context(|| format!("opening {}", path.display()))?;
    }
    match default_history_path().and_then(|p| load_history(&p)) {
        Ok(lines) => editor.history.set_entries(lines),
        Err(e) => warn!(target: "runtime", error = %e, "history load failed"),
    }

    let stop = Arc::new(AtomicBool::new(false));
    let input_thread = spawn_input_thread(tx, stop.clone());

    let mut renderer = Renderer::new(cols, rows);
    let mut sink = CrosstermSink::new();
    let mut screen = (cols, rows);
    let mut parked_cursor = (u16::MAX, u16::MAX);

    'main: loop {
        let frame_start = Instant::now();

        let current = size()?;
        if current != screen {
            screen = current;
            renderer.resize(current.0, current.1);
            editor.resize(current.0, current.1);
        }

        for event in rx.drain() {
            echo_typed_cluster(&mut editor, &mut renderer, &mut sink, &event);
            editor.dispatch_event(event, Instant::now());
            if editor.should_quit() {
                break 'main;
            }
        }

        let (emitted, cursor) = render_frame(&mut editor, &mut renderer, &mut sink, screen);
        if emitted > 0 || cursor != parked_cursor {
            sink.place_cursor(cursor.0, cursor.1);
            parked_cursor = cursor;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < TICK {
            std::thread::sleep(TICK - elapsed);
        }
    }

    stop.store(true, Ordering::Relaxed);
    let _ = input_thread.join();
    if let Ok(path) = default_history_path() {
        if let Err(e) = save_history(&path, editor.history.entries()) {
            warn!(target: "runtime", error = %e, "history save failed");
        }
    }
    info!(target: "runtime", "shutdown");
    Ok(())
}

/// Perceived-latency path: paint a plain typed cluster at the cursor cell
/// before the model update; the next frame reconciles.
fn echo_typed_cluster(
    editor: &mut Editor,
    renderer: &mut Renderer,
    sink: &mut CrosstermSink,
    event: &InputEvent,
) {
    if editor.state != DispatchState::Normal {
        return;
    }
    let InputEvent::Key(key) = event else {
        return;
    };
    let Some(c) = key.insertable() else {
        return;
    };
    if c == '\n' || c == '\t' {
        return;
    }
    let doc = editor.current_doc();
    if doc.context.read_only {
        return;
    }
    let win_id = editor.layout.current().id;
    let Some(view) = editor.views.get(&win_id) else {
        return;
    };
    let (x, y) = view.cursor_screen(&doc.buffer, &doc.context);
    let mut buf = [0u8; 4];
    let cluster = c.encode_utf8(&mut buf);
    let width = core_text::egc_width(cluster);
    renderer.echo_at(sink, x, y, cluster, width, CellAttrs::empty());
}

/// Build and flush one frame; returns the emitted cell count and where
/// the hardware cursor belongs (minibuffer when prompting, else the
/// focused window's cursor cell).
fn render_frame(
    editor: &mut Editor,
    renderer: &mut Renderer,
    sink: &mut CrosstermSink,
    screen: (u16, u16),
) -> (usize, (u16, u16)) {
    let windows: Vec<_> = editor
        .layout
        .windows()
        .iter()
        .map(|w| (w.id, w.document))
        .collect();
    let statuses: Vec<String> = windows
        .iter()
        .map(|(id, _)| editor.status_line(*id))
        .collect();
    let (echo, echo_cursor) = editor.echo_line();

    let grid = renderer.begin_frame();
    for ((win_id, doc_id), status) in windows.iter().zip(&statuses) {
        let Some(doc) = editor.documents.find(*doc_id) else {
            continue;
        };
        let Some(view) = editor.views.get_mut(win_id) else {
            continue;
        };
        view.render(&doc.buffer, &doc.context, status, grid);
    }
    draw_echo_row(grid, screen.1.saturating_sub(1), &echo);
    let emitted = renderer.flush_frame(sink);

    let cursor = match echo_cursor {
        Some(col) => (
            (col as u16).min(screen.0.saturating_sub(1)),
            screen.1.saturating_sub(1),
        ),
        None => {
            let doc = editor.current_doc();
            let win_id = editor.layout.current().id;
            editor
                .views
                .get(&win_id)
                .map(|v| v.cursor_screen(&doc.buffer, &doc.context))
                .unwrap_or((0, 0))
        }
    };
    (emitted, cursor)
}

fn draw_echo_row(grid: &mut Grid, y: u16, text: &str) {
    grid.clear_row(y, CellAttrs::empty());
    let mut x = 0usize;
    let width = usize::from(grid.width());
    for g in grapheme::iter(text) {
        let w = core_text::egc_width(g);
        if x + w > width {
            break;
        }
        grid.put_cluster(x as u16, y, g, w, CellAttrs::empty());
        x += w;
    }
}

fn init_logging() -> Option<WorkerGuard> {
    let dir = dirs::home_dir()?.join(".ze");
    std::fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::never(dir, "ze.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            // Leave the terminal usable before the diagnostic prints.
            restore_terminal();
            default_hook(info);
        }));
    });
}
