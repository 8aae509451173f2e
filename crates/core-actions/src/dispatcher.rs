//! The dispatcher: one keystroke in, one state transition out.
//!
//! States: `Normal`, the `C-x`/`C-x r` prefixes, `Prompting` (minibuffer),
//! `Isearch`, `QueryReplace` and `ShellRunning`. `C-g` aborts whatever is
//! in progress and returns to `Normal`, restoring the pre-command cursor
//! where the state kept one. Commands run to completion synchronously;
//! nothing here suspends.

use crate::edit;
use crate::macros::MacroRecorder;
use crate::minibuffer::MiniBuffer;
use crate::shell::{self, ShellSink, ShellSource};
use crate::{EditorIo, LoadedFile};
use core_events::{InputEvent, Key};
use core_keymap::{describe_seq, Command, KeyLookup, Keymap, KeySeq, Prefix};
use core_model::{DocumentId, WindowId, WindowLayout};
use core_render::{motion, View};
use core_search::{Match, SearchService};
use core_state::{Document, DocumentManager, History};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPurpose {
    OpenFile,
    SwitchBuffer,
    ExecuteCommand,
    SaveAs,
    ShellCommand { with_region: bool },
    ReplaceFrom { regex: bool },
    ReplaceWith { regex: bool, from: String },
    ConfirmQuit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsearchState {
    pub forward: bool,
    pub regex: bool,
    pub pattern: String,
    pub origin: usize,
    pub last: Option<Match>,
    pub failing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceState {
    pub regex: bool,
    pub from: String,
    pub to: String,
    /// Scan position; matches before it are wrapped results and end the run.
    pub at: usize,
    pub current: Option<Match>,
    pub replaced: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    Normal,
    CxPrefix,
    CxRPrefix,
    Prompting(PromptPurpose),
    Isearch(IsearchState),
    QueryReplace(ReplaceState),
    ShellRunning,
}

/// The whole editor: documents, windows, views, and dispatch state.
pub struct Editor {
    pub documents: DocumentManager,
    pub layout: WindowLayout,
    pub views: HashMap<WindowId, View>,
    pub keymap: Keymap,
    pub search: SearchService,
    pub history: History,
    pub minibuffer: MiniBuffer,
    pub macros: MacroRecorder,
    pub state: DispatchState,
    pub message: Option<String>,
    pub last_rectangle: Option<Vec<String>>,
    io: Box<dyn EditorIo>,
    pending_keys: KeySeq,
    last_command: Option<Command>,
    should_quit: bool,
}

impl Editor {
    /// `cols × rows` is the full terminal; the bottom row is the echo
    /// line, everything above belongs to the window layout.
    pub fn new(io: Box<dyn EditorIo>, cols: u16, rows: u16) -> Self {
        let mut documents = DocumentManager::new();
        let first = documents.create();
        let layout = WindowLayout::new(first, cols, rows.saturating_sub(1));
        let mut editor = Self {
            documents,
            layout,
            views: HashMap::new(),
            keymap: Keymap::new(),
            search: SearchService::new(),
            history: History::new(),
            minibuffer: MiniBuffer::new(),
            macros: MacroRecorder::new(),
            state: DispatchState::Normal,
            message: None,
            last_rectangle: None,
            io,
            pending_keys: KeySeq::new(),
            last_command: None,
            should_quit: false,
        };
        editor.sync_views();
        editor
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Open `path` into the focused window at startup.
    pub fn open_initial_file(&mut self, path: &str, read_only: bool) -> anyhow::Result<()> {
        let loaded = self.io.load(std::path::Path::new(path))?;
        let id = self.add_loaded_document(path, loaded, read_only);
        self.layout.set_current_document(id);
        Ok(())
    }

    fn add_loaded_document(
        &mut self,
        path: &str,
        loaded: LoadedFile,
        read_only: bool,
    ) -> DocumentId {
        let path = PathBuf::from(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        self.documents.create_from_file(
            name,
            path,
            loaded.buffer,
            loaded.encoding,
            loaded.line_ending,
            loaded.had_bom,
            loaded.meta,
            read_only,
        )
    }

    /// Keep one view per window, regions in sync with the layout.
    pub fn sync_views(&mut self) {
        let regions: Vec<(WindowId, core_model::LayoutRegion)> = self
            .layout
            .windows()
            .iter()
            .map(|w| (w.id, w.region))
            .collect();
        self.views
            .retain(|id, _| regions.iter().any(|(rid, _)| rid == id));
        for (id, region) in regions {
            self.views
                .entry(id)
                .or_insert_with(|| View::new(region))
                .set_region(region);
        }
    }

    /// Terminal resized: re-layout windows, full-redraw views.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.layout.resize(cols, rows.saturating_sub(1));
        self.sync_views();
        for view in self.views.values_mut() {
            view.mark_full();
        }
    }

    pub fn current_doc(&self) -> &Document {
        self.documents
            .find(self.layout.current().document)
            .expect("focused window names a live document")
    }

    fn doc_view_mut(&mut self) -> (&mut Document, &mut View) {
        let win = self.layout.current();
        let (doc_id, win_id) = (win.document, win.id);
        let Self {
            documents, views, ..
        } = self;
        (
            documents
                .find_mut(doc_id)
                .expect("focused window names a live document"),
            views.get_mut(&win_id).expect("one view per window"),
        )
    }

    pub fn current_view_mut(&mut self) -> &mut View {
        let win_id = self.layout.current().id;
        self.views.get_mut(&win_id).expect("one view per window")
    }

    // ---- dispatch --------------------------------------------------------

    pub fn dispatch_event(&mut self, event: InputEvent, now: Instant) {
        match event {
            InputEvent::Key(key) => self.dispatch_key(key, now),
            InputEvent::Paste(text) => self.dispatch_paste(&text, now),
        }
        let (doc, view) = self.doc_view_mut();
        view.scroll_to_cursor(&doc.buffer, &doc.context);
    }

    /// Pasted text: one atomic insertion, never recorded into macros.
    fn dispatch_paste(&mut self, text: &str, now: Instant) {
        let (normalized, _) = core_text::segment::normalize_and_segment(text);
        match &self.state {
            DispatchState::Prompting(_) => self.minibuffer.insert_bytes(&normalized),
            DispatchState::Isearch(_) => {
                let DispatchState::Isearch(mut st) = std::mem::replace(
                    &mut self.state,
                    DispatchState::Normal,
                ) else {
                    unreachable!()
                };
                st.pattern.push_str(&normalized);
                self.isearch_find(&mut st, None);
                self.state = DispatchState::Isearch(st);
            }
            _ => {
                let (doc, view) = self.doc_view_mut();
                let line = doc.buffer.find_line_by_byte(doc.context.cursor).unwrap_or(0);
                if let Err(e) = edit::insert_block(doc, &normalized, now) {
                    view.set_error(e.to_string());
                } else {
                    view.mark_from(line);
                }
            }
        }
    }

    pub fn dispatch_key(&mut self, key: Key, now: Instant) {
        // Transient messages live until the next keystroke.
        self.message = None;
        self.current_view_mut().clear_error();

        if key == Key::Ctrl(b'g') {
            self.macros.record_key(key);
            self.cancel();
            return;
        }

        match std::mem::replace(&mut self.state, DispatchState::Normal) {
            DispatchState::Normal => self.dispatch_normal(key, now),
            DispatchState::CxPrefix => self.dispatch_cx(key, now),
            DispatchState::CxRPrefix => self.dispatch_cx_r(key, now),
            DispatchState::Prompting(purpose) => self.dispatch_prompt(purpose, key, now),
            DispatchState::Isearch(st) => self.dispatch_isearch(st, key, now),
            DispatchState::QueryReplace(st) => self.dispatch_replace(st, key, now),
            // Shell commands run synchronously inside their dispatch.
            DispatchState::ShellRunning => warn!(target: "actions.dispatch", "key during shell"),
        }
    }

    fn dispatch_normal(&mut self, key: Key, now: Instant) {
        match self.keymap.lookup(key) {
            KeyLookup::Prefix(Prefix::Cx) => {
                self.pending_keys.clear();
                self.pending_keys.push(key);
                self.state = DispatchState::CxPrefix;
            }
            KeyLookup::Prefix(Prefix::CxR) => unreachable!("C-x r only after C-x"),
            KeyLookup::Command(cmd) => {
                self.macros.record_key(key);
                self.run_command(cmd, now);
            }
            KeyLookup::InsertChar(c) => {
                self.macros.record_key(key);
                self.insert_char_command(c, now);
                self.last_command = None;
            }
            KeyLookup::Ignored => {}
        }
    }

    fn dispatch_cx(&mut self, key: Key, now: Instant) {
        match self.keymap.lookup_cx(key) {
            KeyLookup::Prefix(Prefix::CxR) => {
                self.pending_keys.push(key);
                self.state = DispatchState::CxRPrefix;
            }
            KeyLookup::Command(cmd) => {
                self.record_resolved(cmd, key);
                self.run_command(cmd, now);
            }
            _ => {
                self.pending_keys.push(key);
                self.message = Some(format!("{} is undefined", describe_seq(&self.pending_keys)));
                self.pending_keys.clear();
            }
        }
    }

    fn dispatch_cx_r(&mut self, key: Key, now: Instant) {
        match self.keymap.lookup_cx_r(key) {
            KeyLookup::Command(cmd) => {
                self.record_resolved(cmd, key);
                self.run_command(cmd, now);
            }
            _ => {
                self.pending_keys.push(key);
                self.message = Some(format!("{} is undefined", describe_seq(&self.pending_keys)));
                self.pending_keys.clear();
            }
        }
    }

    /// Record a resolved prefix sequence, keeping macro-control chords out
    /// of the capture so replay does not re-trigger the recorder.
    fn record_resolved(&mut self, cmd: Command, key: Key) {
        let control = matches!(
            cmd,
            Command::MacroStart | Command::MacroEnd | Command::MacroPlay
        );
        if !control {
            let pending = std::mem::take(&mut self.pending_keys);
            for k in pending {
                self.macros.record_key(k);
            }
            self.macros.record_key(key);
        }
        self.pending_keys.clear();
    }

    fn insert_char_command(&mut self, c: char, now: Instant) {
        let (doc, view) = self.doc_view_mut();
        let line = doc.buffer.find_line_by_byte(doc.context.cursor).unwrap_or(0);
        match edit::insert_char(doc, c, now) {
            Ok(()) => {
                if c == '\n' {
                    view.mark_from(line);
                } else {
                    view.mark_line(line);
                }
            }
            Err(e) => view.set_error(e.to_string()),
        }
    }

    // ---- cancellation ----------------------------------------------------

    /// `C-g`: abort the in-progress multi-step command and restore the
    /// pre-command cursor where one was kept.
    fn cancel(&mut self) {
        if self.macros.is_recording() {
            self.macros.cancel_recording();
        }
        let state = std::mem::replace(&mut self.state, DispatchState::Normal);
        match state {
            DispatchState::Normal => {
                let (doc, _) = self.doc_view_mut();
                doc.context.mark = None;
            }
            DispatchState::Prompting(_) => {
                self.minibuffer.clear();
                self.history.reset_navigation();
            }
            DispatchState::Isearch(st) => {
                let (doc, view) = self.doc_view_mut();
                doc.context.cursor = st.origin.min(doc.buffer.len());
                view.search_highlight = None;
                view.mark_full();
            }
            DispatchState::QueryReplace(st) => {
                self.current_view_mut().search_highlight = None;
                self.message = Some(format!("Replaced {} occurrences", st.replaced));
                return;
            }
            _ => {}
        }
        self.pending_keys.clear();
        self.message = Some("Quit".to_string());
    }

    // ---- commands --------------------------------------------------------

    fn run_command(&mut self, cmd: Command, now: Instant) {
        debug!(target: "actions.dispatch", command = cmd.name(), "run");
        let accrete_kill = self.last_command == Some(Command::KillLine);
        self.last_command = Some(cmd);
        match cmd {
            Command::MoveLeft => self.with_doc(|doc, _| motion::move_left(&doc.buffer, &mut doc.context)),
            Command::MoveRight => self.with_doc(|doc, _| motion::move_right(&doc.buffer, &mut doc.context)),
            Command::MoveUp => self.with_doc(|doc, view| {
                motion::move_vertical(&doc.buffer, &mut doc.context, -1, view.tab_width());
            }),
            Command::MoveDown => self.with_doc(|doc, view| {
                motion::move_vertical(&doc.buffer, &mut doc.context, 1, view.tab_width());
            }),
            Command::LineStart => self.with_doc(|doc, _| motion::line_start(&doc.buffer, &mut doc.context)),
            Command::LineEnd => self.with_doc(|doc, _| motion::line_end(&doc.buffer, &mut doc.context)),
            Command::WordForward => self.with_doc(|doc, _| motion::word_forward(&doc.buffer, &mut doc.context)),
            Command::WordBackward => self.with_doc(|doc, _| motion::word_backward(&doc.buffer, &mut doc.context)),
            Command::BufferStart => self.with_doc(|doc, _| motion::buffer_start(&mut doc.context)),
            Command::BufferEnd => self.with_doc(|doc, _| motion::buffer_end(&doc.buffer, &mut doc.context)),
            Command::PageDown => self.page_move(1),
            Command::PageUp => self.page_move(-1),

            Command::InsertNewline => self.insert_char_command('\n', now),
            Command::DeleteChar => self.edit_command(now, |doc, now| edit::delete_forward(doc, now)),
            Command::DeleteCharBackward => self.edit_command(now, |doc, now| edit::delete_backward(doc, now)),
            Command::DeleteWord => self.edit_command(now, |doc, now| edit::delete_word_forward(doc, now)),
            Command::DeleteWordBackward => self.edit_command(now, |doc, now| edit::delete_word_backward(doc, now)),
            Command::KillLine => {
                self.edit_command(now, move |doc, now| edit::kill_line(doc, now, accrete_kill))
            }
            Command::SetMark => {
                self.with_doc(|doc, _| edit::set_mark(doc));
                self.message = Some("Mark set".to_string());
            }
            Command::MarkWholeBuffer => self.with_doc(|doc, view| {
                edit::mark_whole_buffer(doc);
                view.mark_full();
            }),
            Command::KillRegion => {
                let (doc, view) = self.doc_view_mut();
                match edit::kill_region(doc, now) {
                    Ok(true) => view.mark_full(),
                    Ok(false) => view.set_error("The mark is not set now"),
                    Err(e) => view.set_error(e.to_string()),
                }
            }
            Command::CopyRegion => {
                let (doc, view) = self.doc_view_mut();
                if edit::copy_region(doc) {
                    self.message = Some("Region saved".to_string());
                } else {
                    view.set_error("The mark is not set now");
                }
            }
            Command::Yank => {
                let (doc, view) = self.doc_view_mut();
                match edit::yank(doc, now) {
                    Ok(true) => view.mark_full(),
                    Ok(false) => view.set_error("Kill ring is empty"),
                    Err(e) => view.set_error(e.to_string()),
                }
            }
            Command::Undo => {
                let (doc, view) = self.doc_view_mut();
                match edit::undo(doc) {
                    Ok(true) => {
                        view.mark_full();
                        self.message = Some("Undo".to_string());
                    }
                    Ok(false) => view.set_error("No further undo information"),
                    Err(e) => view.set_error(e.to_string()),
                }
            }
            Command::Redo => {
                let (doc, view) = self.doc_view_mut();
                match edit::redo(doc) {
                    Ok(true) => {
                        view.mark_full();
                        self.message = Some("Redo".to_string());
                    }
                    Ok(false) => view.set_error("No further redo information"),
                    Err(e) => view.set_error(e.to_string()),
                }
            }
            Command::JoinLine => self.edit_command(now, |doc, now| edit::join_line(doc, now)),
            Command::CommentToggle => self.edit_command(now, |doc, now| edit::comment_toggle(doc, now)),
            Command::RectangleKill => {
                let (doc, view) = self.doc_view_mut();
                let tab = view.tab_width();
                match edit::kill_rectangle(doc, tab, now) {
                    Ok(Some(rect)) => {
                        self.last_rectangle = Some(rect);
                        self.current_view_mut().mark_full();
                    }
                    Ok(None) => view.set_error("No rectangle between mark and point"),
                    Err(e) => view.set_error(e.to_string()),
                }
            }
            Command::RectangleYank => {
                let Some(rect) = self.last_rectangle.clone() else {
                    self.current_view_mut().set_error("No rectangle to yank");
                    return;
                };
                let (doc, view) = self.doc_view_mut();
                let tab = view.tab_width();
                match edit::yank_rectangle(doc, &rect, tab, now) {
                    Ok(()) => view.mark_full(),
                    Err(e) => view.set_error(e.to_string()),
                }
            }

            Command::IsearchForward => self.start_isearch(true, false),
            Command::IsearchBackward => self.start_isearch(false, false),
            Command::RegexIsearchForward => self.start_isearch(true, true),
            Command::RegexIsearchBackward => self.start_isearch(false, true),
            Command::QueryReplace => self.prompt(
                PromptPurpose::ReplaceFrom { regex: false },
                "Query replace: ",
            ),
            Command::RegexQueryReplace => self.prompt(
                PromptPurpose::ReplaceFrom { regex: true },
                "Query replace regexp: ",
            ),

            Command::Save => self.save_current(),
            Command::Quit => {
                if self.documents.has_unsaved_changes() {
                    self.prompt(
                        PromptPurpose::ConfirmQuit,
                        "Modified buffers exist; exit anyway? (y or n) ",
                    );
                } else {
                    self.should_quit = true;
                }
            }
            Command::OpenFile => self.prompt(PromptPurpose::OpenFile, "Find file: "),
            Command::SwitchBuffer => self.prompt(PromptPurpose::SwitchBuffer, "Switch to buffer: "),
            Command::ExecuteCommand => self.prompt(PromptPurpose::ExecuteCommand, "M-x "),

            Command::SplitHorizontal => {
                if self.layout.split_horizontal().is_none() {
                    self.current_view_mut().set_error("Window too small to split");
                }
                self.sync_views();
            }
            Command::SplitVertical => {
                if self.layout.split_vertical().is_none() {
                    self.current_view_mut().set_error("Window too small to split");
                }
                self.sync_views();
            }
            Command::CloseWindow => {
                if !self.layout.close_current() {
                    self.current_view_mut()
                        .set_error("Attempt to delete sole window");
                }
                self.sync_views();
            }
            Command::CloseOtherWindows => {
                self.layout.close_others();
                self.sync_views();
            }
            Command::OtherWindow => self.layout.focus_next(),

            Command::ShellCommand => self.prompt(
                PromptPurpose::ShellCommand { with_region: false },
                "Shell command: ",
            ),
            Command::ShellPipeRegion => self.prompt(
                PromptPurpose::ShellCommand { with_region: true },
                "Shell command on region: ",
            ),

            Command::MacroStart => {
                if self.macros.start_recording() {
                    self.message = Some("Defining keyboard macro...".to_string());
                } else {
                    self.current_view_mut()
                        .set_error("Already defining keyboard macro");
                }
            }
            Command::MacroEnd => {
                if self.macros.stop_recording() {
                    self.message = Some("Keyboard macro defined".to_string());
                } else {
                    self.current_view_mut()
                        .set_error("Not defining keyboard macro");
                }
            }
            Command::MacroPlay => self.play_macro(now),

            Command::Cancel => self.cancel(),
        }
    }

    fn with_doc(&mut self, f: impl FnOnce(&mut Document, &mut View)) {
        let (doc, view) = self.doc_view_mut();
        f(doc, view);
    }

    fn edit_command(
        &mut self,
        now: Instant,
        f: impl FnOnce(&mut Document, Instant) -> Result<(), edit::EditError>,
    ) {
        let (doc, view) = self.doc_view_mut();
        let line = doc.buffer.find_line_by_byte(doc.context.cursor).unwrap_or(0);
        match f(doc, now) {
            Ok(()) => view.mark_from(line.saturating_sub(1)),
            Err(e) => view.set_error(e.to_string()),
        }
    }

    fn page_move(&mut self, direction: isize) {
        let (doc, view) = self.doc_view_mut();
        let step = view.text_rows().saturating_sub(1).max(1) as isize;
        motion::move_vertical(&doc.buffer, &mut doc.context, direction * step, view.tab_width());
    }

    fn play_macro(&mut self, now: Instant) {
        match self.macros.begin_playback() {
            Some(keys) => {
                for key in keys {
                    self.dispatch_key(key, now);
                }
                self.macros.end_playback();
            }
            None => self
                .current_view_mut()
                .set_error("No keyboard macro to execute"),
        }
    }

    // ---- prompting -------------------------------------------------------

    fn prompt(&mut self, purpose: PromptPurpose, prompt: &str) {
        self.minibuffer.open(prompt);
        self.history.reset_navigation();
        self.state = DispatchState::Prompting(purpose);
    }

    fn dispatch_prompt(&mut self, purpose: PromptPurpose, key: Key, now: Instant) {
        self.macros.record_key(key);
        if purpose == PromptPurpose::ConfirmQuit {
            match key {
                Key::Char(b'y') | Key::Char(b'Y') => self.should_quit = true,
                Key::Char(b'n') | Key::Char(b'N') => {
                    self.minibuffer.clear();
                    self.message = Some("Quit".to_string());
                }
                _ => self.state = DispatchState::Prompting(purpose),
            }
            return;
        }
        match key {
            Key::Enter => {
                let content = self.minibuffer.content().to_string();
                self.history.reset_navigation();
                self.minibuffer.clear();
                self.commit_prompt(purpose, content, now);
            }
            Key::Up | Key::Ctrl(b'p') => {
                if !self.history.is_navigating() {
                    self.history.start_navigation(self.minibuffer.content());
                }
                if let Some(entry) = self.history.prev().map(str::to_string) {
                    self.minibuffer.set_content(&entry);
                }
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Down | Key::Ctrl(b'n') => {
                if let Some(entry) = self.history.next().map(str::to_string) {
                    self.minibuffer.set_content(&entry);
                }
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Backspace => {
                self.minibuffer.backspace();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Delete | Key::Ctrl(b'd') => {
                self.minibuffer.delete();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Ctrl(b'a') | Key::Home => {
                self.minibuffer.move_start();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Ctrl(b'e') | Key::End => {
                self.minibuffer.move_end();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Ctrl(b'f') | Key::Right => {
                self.minibuffer.move_right();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Ctrl(b'b') | Key::Left => {
                self.minibuffer.move_left();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Alt(b'f') => {
                self.minibuffer.move_word_forward();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Alt(b'b') => {
                self.minibuffer.move_word_backward();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Alt(b'd') => {
                self.minibuffer.delete_word_forward();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::AltDelete => {
                self.minibuffer.delete_word_backward();
                self.state = DispatchState::Prompting(purpose);
            }
            Key::Ctrl(b'k') => {
                self.minibuffer.kill_line();
                self.state = DispatchState::Prompting(purpose);
            }
            _ => {
                if let Some(c) = key.insertable() {
                    self.minibuffer.insert_codepoint(c);
                }
                self.state = DispatchState::Prompting(purpose);
            }
        }
    }

    fn commit_prompt(&mut self, purpose: PromptPurpose, content: String, now: Instant) {
        match purpose {
            PromptPurpose::OpenFile => {
                if content.is_empty() {
                    return;
                }
                self.history.add(&content);
                self.open_file(&content);
            }
            PromptPurpose::SwitchBuffer => {
                if content.is_empty() {
                    return;
                }
                self.history.add(&content);
                match self.documents.find_by_name(&content).map(|d| d.id) {
                    Some(id) => {
                        self.layout.set_current_document(id);
                        self.current_view_mut().mark_full();
                    }
                    None => self
                        .current_view_mut()
                        .set_error(format!("No buffer named {content}")),
                }
            }
            PromptPurpose::ExecuteCommand => {
                if content.is_empty() {
                    return;
                }
                self.history.add(&content);
                match Command::by_name(&content) {
                    Some(cmd) => self.run_command(cmd, now),
                    None => self
                        .current_view_mut()
                        .set_error(format!("No command named {content}")),
                }
            }
            PromptPurpose::SaveAs => {
                if content.is_empty() {
                    return;
                }
                let (doc, _) = self.doc_view_mut();
                let path = PathBuf::from(&content);
                doc.name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| content.clone());
                doc.path = Some(path);
                self.save_current();
            }
            PromptPurpose::ShellCommand { with_region } => {
                if content.is_empty() {
                    return;
                }
                self.history.add(&content);
                self.run_shell(&content, with_region, now);
            }
            PromptPurpose::ReplaceFrom { regex } => {
                if content.is_empty() {
                    self.message = Some("Quit".to_string());
                    return;
                }
                self.history.add(&content);
                let prompt = format!("Query replace {content} with: ");
                self.minibuffer.open(&prompt);
                self.state = DispatchState::Prompting(PromptPurpose::ReplaceWith {
                    regex,
                    from: content,
                });
            }
            PromptPurpose::ReplaceWith { regex, from } => {
                self.history.add(&content);
                self.start_query_replace(regex, from, content);
            }
            PromptPurpose::ConfirmQuit => unreachable!("handled before commit"),
        }
    }

    fn open_file(&mut self, path: &str) {
        match self.io.load(std::path::Path::new(path)) {
            Ok(loaded) => {
                let new_file = loaded.new_file;
                let id = self.add_loaded_document(path, loaded, false);
                self.layout.set_current_document(id);
                self.current_view_mut().mark_full();
                if new_file {
                    self.message = Some("(New file)".to_string());
                }
                info!(target: "actions.files", path, new_file, "file_opened");
            }
            Err(e) => self.current_view_mut().set_error(format!("{e:#}")),
        }
    }

    fn save_current(&mut self) {
        let (doc, _) = self.doc_view_mut();
        if doc.path.is_none() {
            self.prompt(PromptPurpose::SaveAs, "File to save in: ");
            return;
        }
        let Self { documents, layout, io, .. } = self;
        let doc = documents
            .find_mut(layout.current().document)
            .expect("focused window names a live document");
        match io.save(doc) {
            Ok(meta) => {
                doc.file_meta = meta;
                doc.context.last_save = meta;
                doc.context.modified = false;
                let name = doc.name.clone();
                self.message = Some(format!("Wrote {name}"));
            }
            Err(e) => {
                let msg = format!("{e:#}");
                self.current_view_mut().set_error(msg);
            }
        }
    }

    // ---- incremental search ----------------------------------------------

    fn start_isearch(&mut self, forward: bool, regex: bool) {
        let origin = self.current_doc().context.cursor;
        self.state = DispatchState::Isearch(IsearchState {
            forward,
            regex,
            pattern: String::new(),
            origin,
            last: None,
            failing: false,
        });
    }

    fn dispatch_isearch(&mut self, mut st: IsearchState, key: Key, now: Instant) {
        let handled = matches!(
            key,
            Key::Enter | Key::Ctrl(b's') | Key::Ctrl(b'r') | Key::Backspace
        ) || key.insertable().is_some();
        if handled {
            // Fall-through keys are recorded by their own dispatch.
            self.macros.record_key(key);
        }
        match key {
            Key::Enter => {
                if !st.pattern.is_empty() {
                    self.history.add(&st.pattern);
                }
                self.current_view_mut().search_highlight = None;
                self.current_view_mut().mark_full();
            }
            Key::Ctrl(b's') => {
                st.forward = true;
                let from = st.last.map(|m| m.start + m.len.max(1));
                self.isearch_find(&mut st, from);
                self.state = DispatchState::Isearch(st);
            }
            Key::Ctrl(b'r') => {
                st.forward = false;
                let from = st.last.map(|m| m.start);
                self.isearch_find(&mut st, from);
                self.state = DispatchState::Isearch(st);
            }
            Key::Backspace => {
                let cut = core_text::grapheme::boundary_before(&st.pattern, st.pattern.len());
                st.pattern.truncate(cut);
                if st.pattern.is_empty() {
                    let origin = st.origin;
                    let (doc, view) = self.doc_view_mut();
                    doc.context.cursor = origin.min(doc.buffer.len());
                    view.search_highlight = None;
                    view.mark_full();
                    st.last = None;
                    st.failing = false;
                } else {
                    self.isearch_find(&mut st, None);
                }
                self.state = DispatchState::Isearch(st);
            }
            _ => match key.insertable() {
                Some(c) => {
                    st.pattern.push(c);
                    self.isearch_find(&mut st, None);
                    self.state = DispatchState::Isearch(st);
                }
                None => {
                    // Any other key ends the search and executes normally.
                    self.current_view_mut().search_highlight = None;
                    self.current_view_mut().mark_full();
                    self.dispatch_key(key, now);
                }
            },
        }
    }

    /// Run the incremental search; `from` overrides the start (repeat
    /// searches), otherwise the original origin is used so a growing
    /// pattern re-anchors.
    fn isearch_find(&mut self, st: &mut IsearchState, from: Option<usize>) {
        if st.pattern.is_empty() {
            return;
        }
        let start = from.unwrap_or(st.origin);
        let Self {
            documents,
            layout,
            views,
            search,
            ..
        } = self;
        let win = layout.current();
        let doc = documents
            .find_mut(win.document)
            .expect("focused window names a live document");
        let view = views.get_mut(&win.id).expect("one view per window");
        let text = doc.buffer.text();
        let bytes = text.as_bytes();
        let hit = match (st.regex, st.forward) {
            (false, true) => search.search_forward(bytes, st.pattern.as_bytes(), start),
            (false, false) => search.search_backward(bytes, st.pattern.as_bytes(), start),
            (true, true) => search.search_regex_forward(bytes, &st.pattern, start),
            (true, false) => search.search_regex_backward(bytes, &st.pattern, start),
        };
        match hit {
            Some(m) => {
                st.last = Some(m);
                st.failing = false;
                doc.context.cursor = if st.forward { m.start + m.len } else { m.start };
                view.search_highlight = Some(text[m.start..m.start + m.len].to_string());
                view.mark_full();
            }
            None => {
                st.failing = true;
                view.set_error(format!("Failing I-search: {}", st.pattern));
            }
        }
    }

    // ---- query replace ---------------------------------------------------

    fn start_query_replace(&mut self, regex: bool, from: String, to: String) {
        let at = self.current_doc().context.cursor;
        let mut st = ReplaceState {
            regex,
            from,
            to,
            at,
            current: None,
            replaced: 0,
        };
        if self.replace_advance(&mut st) {
            self.state = DispatchState::QueryReplace(st);
        } else {
            self.current_view_mut()
                .set_error(format!("No occurrences of {}", st.from));
        }
    }

    /// Find the next unwrapped match at or after `st.at`; position the
    /// cursor on it. False when the scan is done.
    fn replace_advance(&mut self, st: &mut ReplaceState) -> bool {
        let Self {
            documents,
            layout,
            views,
            search,
            ..
        } = self;
        let win = layout.current();
        let doc = documents
            .find_mut(win.document)
            .expect("focused window names a live document");
        let view = views.get_mut(&win.id).expect("one view per window");
        let text = doc.buffer.text();
        if st.at >= text.len() {
            st.current = None;
            return false;
        }
        let hit = if st.regex {
            search.search_regex_forward(text.as_bytes(), &st.from, st.at)
        } else {
            search.search_forward(text.as_bytes(), st.from.as_bytes(), st.at)
        };
        // A wrapped result means the tail is exhausted.
        let hit = hit.filter(|m| m.start >= st.at);
        match hit {
            Some(m) => {
                st.current = Some(m);
                doc.context.cursor = m.start;
                view.search_highlight = Some(text[m.start..m.start + m.len].to_string());
                view.mark_full();
                true
            }
            None => {
                st.current = None;
                view.search_highlight = None;
                view.mark_full();
                false
            }
        }
    }

    fn replace_current(&mut self, st: &mut ReplaceState, now: Instant) {
        let Some(m) = st.current else {
            return;
        };
        let to = st.to.clone();
        let (doc, view) = self.doc_view_mut();
        doc.context.cursor = m.start;
        let line = doc.buffer.find_line_by_byte(m.start).unwrap_or(0);
        let result = edit::delete_range(doc, m.start, m.start + m.len, now, false, false)
            .and_then(|_| edit::insert_block(doc, &to, now));
        match result {
            Ok(()) => {
                st.replaced += 1;
                // A zero-length match must still advance the scan.
                let skip = if m.len == 0 { 1 } else { 0 };
                st.at = m.start + to.len() + skip;
                view.mark_from(line);
            }
            Err(e) => view.set_error(e.to_string()),
        }
    }

    fn finish_replace(&mut self, st: &ReplaceState) {
        self.current_view_mut().search_highlight = None;
        self.current_view_mut().mark_full();
        self.message = Some(format!("Replaced {} occurrences", st.replaced));
    }

    fn dispatch_replace(&mut self, mut st: ReplaceState, key: Key, now: Instant) {
        self.macros.record_key(key);
        match key {
            Key::Char(b'y') | Key::Char(b' ') => {
                self.replace_current(&mut st, now);
                if self.replace_advance(&mut st) {
                    self.state = DispatchState::QueryReplace(st);
                } else {
                    self.finish_replace(&st);
                }
            }
            Key::Char(b'n') | Key::Backspace => {
                if let Some(m) = st.current {
                    st.at = m.start + m.len.max(1);
                }
                if self.replace_advance(&mut st) {
                    self.state = DispatchState::QueryReplace(st);
                } else {
                    self.finish_replace(&st);
                }
            }
            Key::Char(b'!') => {
                loop {
                    let before = st.replaced;
                    self.replace_current(&mut st, now);
                    // A replacement that failed to apply cannot advance
                    // the scan; stop instead of spinning on it.
                    if st.replaced == before || !self.replace_advance(&mut st) {
                        break;
                    }
                }
                self.finish_replace(&st);
            }
            Key::Char(b'q') | Key::Enter => self.finish_replace(&st),
            _ => self.state = DispatchState::QueryReplace(st),
        }
    }

    // ---- shell pipeline --------------------------------------------------

    fn run_shell(&mut self, input: &str, with_region: bool, now: Instant) {
        let spec = shell::parse(input);
        let (stdin, replace_span) = {
            let (doc, _) = self.doc_view_mut();
            match spec.source {
                ShellSource::Buffer => {
                    let len = doc.buffer.len();
                    (doc.buffer.range(0, len), Some((0, len)))
                }
                ShellSource::Line => {
                    let line = doc
                        .buffer
                        .find_line_by_byte(doc.context.cursor)
                        .unwrap_or(0);
                    let span = doc.buffer.line_range(line);
                    match span {
                        Some(s) => (doc.buffer.range(s.start, s.len()), Some((s.start, s.end))),
                        None => (Vec::new(), None),
                    }
                }
                ShellSource::Selection => match doc.context.region() {
                    Some((s, e)) => (doc.buffer.range(s, e - s), Some((s, e))),
                    None if with_region => {
                        self.current_view_mut().set_error("The mark is not set now");
                        return;
                    }
                    None => (Vec::new(), None),
                },
            }
        };

        self.state = DispatchState::ShellRunning;
        let outcome = {
            let io = &mut self.io;
            shell::run(&spec.body, &stdin, &mut || io.poll_cancel())
        };
        self.state = DispatchState::Normal;

        let out = match outcome {
            Ok(out) => out,
            Err(e) => {
                self.current_view_mut().set_error(e.to_string());
                return;
            }
        };
        if out.cancelled {
            self.message = Some("Shell command cancelled".to_string());
            return;
        }
        if out.status != 0 {
            let line = if out.stderr_line.is_empty() {
                format!("Shell command failed with status {}", out.status)
            } else {
                out.stderr_line.clone()
            };
            self.current_view_mut().set_error(line);
            return;
        }

        let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
        if text.contains('\r') {
            text = text.replace("\r\n", "\n").replace('\r', "\n");
        }
        if out.truncated {
            self.message = Some("Shell output truncated".to_string());
        }

        match spec.sink {
            ShellSink::Replace => {
                let (doc, view) = self.doc_view_mut();
                let span = replace_span.unwrap_or((doc.context.cursor, doc.context.cursor));
                doc.undo.seal();
                let r = edit::delete_range(doc, span.0, span.1, now, false, false)
                    .and_then(|_| edit::insert_block(doc, &text, now));
                match r {
                    Ok(()) => view.mark_full(),
                    Err(e) => view.set_error(e.to_string()),
                }
                doc.context.mark = None;
            }
            ShellSink::InsertAtCursor => {
                let (doc, view) = self.doc_view_mut();
                match edit::insert_block(doc, &text, now) {
                    Ok(()) => view.mark_full(),
                    Err(e) => view.set_error(e.to_string()),
                }
            }
            ShellSink::NewDocument => {
                let id = self.documents.create();
                let doc = self.documents.find_mut(id).expect("freshly created");
                doc.name = format!("*shell*<{}>", id.0);
                doc.buffer = core_model::Buffer::from_str(&text);
                self.layout.set_current_document(id);
                self.sync_views();
                self.current_view_mut().mark_full();
            }
            ShellSink::Scratch => {
                // Short single-line output goes straight to the echo area;
                // anything larger lands in the output document.
                let trimmed = text.trim_end_matches('\n');
                if trimmed.len() <= 120 && !trimmed.contains('\n') {
                    self.message = Some(trimmed.to_string());
                } else {
                    let id = match self.documents.find_by_name("*shell-output*") {
                        Some(d) => d.id,
                        None => {
                            let id = self.documents.create();
                            self.documents
                                .find_mut(id)
                                .expect("freshly created")
                                .name = "*shell-output*".to_string();
                            id
                        }
                    };
                    let doc = self.documents.find_mut(id).expect("shell output doc");
                    doc.buffer = core_model::Buffer::from_str(&text);
                    doc.context = Default::default();
                    self.layout.set_current_document(id);
                    self.sync_views();
                    self.current_view_mut().mark_full();
                }
            }
        }
    }

    // ---- status and echo lines ------------------------------------------

    /// Status line content for one window.
    pub fn status_line(&self, window_id: WindowId) -> String {
        let Some(win) = self.layout.find(window_id) else {
            return String::new();
        };
        let Some(doc) = self.documents.find(win.document) else {
            return String::new();
        };
        let line = doc
            .buffer
            .find_line_by_byte(doc.context.cursor)
            .unwrap_or(0);
        let col = doc
            .buffer
            .line_start(line)
            .map(|s| doc.context.cursor - s)
            .unwrap_or(0);
        let mut flags = String::new();
        if doc.context.modified {
            flags.push('*');
        }
        if doc.context.read_only {
            flags.push('%');
        }
        let recording = if self.macros.is_recording() { " REC" } else { "" };
        format!(
            " {}{}{}  L{}:C{}{} ",
            doc.name,
            if flags.is_empty() { "" } else { " " },
            flags,
            line + 1,
            col,
            recording
        )
    }

    /// Echo-area content and, when the minibuffer is live, its cursor
    /// column.
    pub fn echo_line(&self) -> (String, Option<usize>) {
        match &self.state {
            DispatchState::Prompting(_) => {
                let text = format!("{}{}", self.minibuffer.prompt(), self.minibuffer.content());
                let col = self.minibuffer.display_cursor_column(4);
                (text, Some(col))
            }
            DispatchState::Isearch(st) => {
                let dir = if st.forward { "" } else { " backward" };
                let kind = if st.regex { " regexp" } else { "" };
                let fail = if st.failing { "Failing " } else { "" };
                (
                    format!("{fail}I-search{kind}{dir}: {}", st.pattern),
                    None,
                )
            }
            DispatchState::QueryReplace(st) => (
                format!(
                    "Query replacing {} with {}: (y/n/!/q)",
                    st.from, st.to
                ),
                None,
            ),
            DispatchState::CxPrefix => ("C-x-".to_string(), None),
            DispatchState::CxRPrefix => ("C-x r-".to_string(), None),
            _ => {
                let win_id = self.layout.current().id;
                if let Some(err) = self.views.get(&win_id).and_then(View::error) {
                    (err.to_string(), None)
                } else {
                    (self.message.clone().unwrap_or_default(), None)
                }
            }
        }
    }
}
