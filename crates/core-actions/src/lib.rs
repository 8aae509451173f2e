//! Commands and dispatch: the editing brain of the editor.
//!
//! The dispatcher is an explicit state machine (`Normal`, the `C-x`
//! prefixes, minibuffer prompts, incremental search, query-replace);
//! commands are named entries in a closed table, each a function over the
//! editor context. File and terminal concerns stay behind the
//! [`EditorIo`] seam so everything here runs headless in tests.

pub mod dispatcher;
pub mod edit;
pub mod macros;
pub mod minibuffer;
pub mod shell;

pub use dispatcher::{DispatchState, Editor, IsearchState, PromptPurpose, ReplaceState};
pub use edit::EditError;
pub use macros::{MacroRecorder, MacroState};
pub use minibuffer::MiniBuffer;
pub use shell::{ShellSink, ShellSource, ShellSpec};

use core_model::{Buffer, Encoding, FileMeta, LineEnding};
use core_state::Document;
use std::path::Path;

/// Result of loading a file through the driver: normalized UTF-8 bytes
/// plus the metadata needed to save it back faithfully.
#[derive(Debug)]
pub struct LoadedFile {
    pub buffer: Buffer,
    pub encoding: Encoding,
    pub line_ending: LineEnding,
    pub had_bom: bool,
    pub meta: FileMeta,
    /// The path did not exist; an empty buffer was handed back.
    pub new_file: bool,
}

impl LoadedFile {
    /// An empty in-memory file (new-file semantics, tests).
    pub fn empty() -> Self {
        Self {
            buffer: Buffer::new(),
            encoding: Encoding::Utf8,
            line_ending: LineEnding::Lf,
            had_bom: false,
            meta: FileMeta::default(),
            new_file: true,
        }
    }
}

/// Driver-side I/O the dispatcher calls out to. The binary implements the
/// real filesystem + terminal driver; tests plug in an in-memory fake.
pub trait EditorIo {
    fn load(&mut self, path: &Path) -> anyhow::Result<LoadedFile>;
    fn save(&mut self, doc: &Document) -> anyhow::Result<FileMeta>;
    /// Polled while a shell child runs; true requests cancellation
    /// (`C-g` arrived).
    fn poll_cancel(&mut self) -> bool {
        false
    }
}

/// In-memory `EditorIo` for headless use.
#[derive(Debug, Default)]
pub struct NullIo;

impl EditorIo for NullIo {
    fn load(&mut self, _path: &Path) -> anyhow::Result<LoadedFile> {
        Ok(LoadedFile::empty())
    }

    fn save(&mut self, _doc: &Document) -> anyhow::Result<FileMeta> {
        Ok(FileMeta::default())
    }
}
