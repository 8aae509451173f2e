//! Shared helpers: a headless editor driven by synthetic keystrokes.

use core_actions::{Editor, EditorIo, LoadedFile};
use core_events::{InputEvent, Key};
use core_model::{Buffer, Encoding, FileMeta, LineEnding};
use core_state::Document;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

pub type FileStore = Rc<RefCell<HashMap<PathBuf, Vec<u8>>>>;

/// In-memory filesystem driver.
pub struct FakeIo {
    pub files: FileStore,
}

impl FakeIo {
    pub fn new() -> (Self, FileStore) {
        let files: FileStore = Rc::new(RefCell::new(HashMap::new()));
        (
            Self {
                files: files.clone(),
            },
            files,
        )
    }
}

impl EditorIo for FakeIo {
    fn load(&mut self, path: &Path) -> anyhow::Result<LoadedFile> {
        match self.files.borrow().get(path) {
            Some(bytes) => Ok(LoadedFile {
                buffer: Buffer::from_bytes(bytes.clone()),
                encoding: Encoding::Utf8,
                line_ending: LineEnding::Lf,
                had_bom: false,
                meta: FileMeta {
                    mtime: None,
                    size: bytes.len() as u64,
                },
                new_file: false,
            }),
            None => Ok(LoadedFile::empty()),
        }
    }

    fn save(&mut self, doc: &Document) -> anyhow::Result<FileMeta> {
        let path = doc.path.clone().expect("save requires a path");
        let bytes = doc.buffer.range(0, doc.buffer.len());
        let size = bytes.len() as u64;
        self.files.borrow_mut().insert(path, bytes);
        Ok(FileMeta { mtime: None, size })
    }
}

pub fn editor() -> Editor {
    let (io, _) = FakeIo::new();
    Editor::new(Box::new(io), 80, 24)
}

pub fn editor_with_files() -> (Editor, FileStore) {
    let (io, files) = FakeIo::new();
    (Editor::new(Box::new(io), 80, 24), files)
}

pub fn key(ed: &mut Editor, k: Key) {
    ed.dispatch_event(InputEvent::Key(k), Instant::now());
}

pub fn keys(ed: &mut Editor, ks: &[Key]) {
    for &k in ks {
        key(ed, k);
    }
}

pub fn ctrl(c: u8) -> Key {
    Key::Ctrl(c)
}

pub fn alt(c: u8) -> Key {
    Key::Alt(c)
}

pub fn char_key(c: char) -> Key {
    match c {
        '\n' => Key::Enter,
        '\t' => Key::Tab,
        c if c.is_ascii() && (' '..='~').contains(&c) => Key::Char(c as u8),
        c => Key::Codepoint(c),
    }
}

pub fn type_str(ed: &mut Editor, s: &str) {
    for c in s.chars() {
        key(ed, char_key(c));
    }
}

pub fn text(ed: &Editor) -> String {
    ed.current_doc().buffer.text()
}

pub fn cursor(ed: &Editor) -> usize {
    ed.current_doc().context.cursor
}
