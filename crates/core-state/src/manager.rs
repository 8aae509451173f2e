//! The document set: records addressed by stable, monotonically assigned
//! ids. Deletion removes from the set without shifting or reusing ids.

use crate::context::EditContext;
use crate::undo::UndoLog;
use core_model::{Buffer, DocumentId, Encoding, FileMeta, LineEnding};
use std::path::PathBuf;
use tracing::debug;

/// One open document: buffer, file metadata and editing state.
#[derive(Debug)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub path: Option<PathBuf>,
    pub encoding: Encoding,
    pub line_ending: LineEnding,
    pub had_bom: bool,
    pub buffer: Buffer,
    pub context: EditContext,
    pub undo: UndoLog,
    pub file_meta: FileMeta,
    /// Line-comment leader used by comment-toggle, chosen from the file
    /// extension at load time.
    pub comment_prefix: &'static str,
}

impl Document {
    fn scratch(id: DocumentId) -> Self {
        Self {
            id,
            name: "*scratch*".to_string(),
            path: None,
            encoding: Encoding::Utf8,
            line_ending: LineEnding::Lf,
            had_bom: false,
            buffer: Buffer::new(),
            context: EditContext::default(),
            undo: UndoLog::new(),
            file_meta: FileMeta::default(),
            comment_prefix: "#",
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentManager {
    documents: Vec<Document>,
    next_id: u64,
}

impl DocumentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh `*scratch*` document and return its id.
    pub fn create(&mut self) -> DocumentId {
        let id = DocumentId(self.next_id);
        self.next_id += 1;
        self.documents.push(Document::scratch(id));
        debug!(target: "state.documents", id = id.0, "document_created");
        id
    }

    /// Create a document from loaded file content.
    #[allow(clippy::too_many_arguments)]
    pub fn create_from_file(
        &mut self,
        name: String,
        path: PathBuf,
        buffer: Buffer,
        encoding: Encoding,
        line_ending: LineEnding,
        had_bom: bool,
        file_meta: FileMeta,
        read_only: bool,
    ) -> DocumentId {
        let id = self.create();
        let doc = self.find_mut(id).expect("freshly created document");
        doc.comment_prefix = comment_prefix_for(&name);
        doc.name = name;
        doc.path = Some(path);
        doc.buffer = buffer;
        doc.encoding = encoding;
        doc.line_ending = line_ending;
        doc.had_bom = had_bom;
        doc.file_meta = file_meta;
        doc.context.read_only = read_only;
        doc.context.last_save = file_meta;
        id
    }

    pub fn find(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn find_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }

    /// Remove `id` from the set. Ids are never reassigned afterwards.
    pub fn delete(&mut self, id: DocumentId) -> bool {
        let before = self.documents.len();
        self.documents.retain(|d| d.id != id);
        let deleted = self.documents.len() != before;
        if deleted {
            debug!(target: "state.documents", id = id.0, "document_deleted");
        }
        deleted
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn first(&self) -> Option<&Document> {
        self.documents.first()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.documents.iter().any(|d| d.context.modified)
    }

    pub fn names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.name.clone()).collect()
    }
}

/// Line-comment leader by file extension; everything unknown gets `#`.
pub fn comment_prefix_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("");
    match ext {
        "rs" | "c" | "h" | "cpp" | "hpp" | "go" | "java" | "js" | "ts" | "zig" => "//",
        "lisp" | "el" | "scm" | "clj" => ";;",
        "sql" | "lua" | "hs" => "--",
        "vim" => "\"",
        "tex" => "%",
        _ => "#",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut mgr = DocumentManager::new();
        let a = mgr.create();
        let b = mgr.create();
        assert_eq!(a, DocumentId(0));
        assert_eq!(b, DocumentId(1));
        assert!(mgr.delete(a));
        assert!(!mgr.delete(a));
        let c = mgr.create();
        assert_eq!(c, DocumentId(2));
        assert!(mgr.find(a).is_none());
        assert!(mgr.find(b).is_some());
    }

    #[test]
    fn scratch_defaults() {
        let mut mgr = DocumentManager::new();
        let id = mgr.create();
        let doc = mgr.find(id).unwrap();
        assert_eq!(doc.name, "*scratch*");
        assert!(doc.path.is_none());
        assert!(!doc.context.modified);
    }

    #[test]
    fn unsaved_changes_aggregate() {
        let mut mgr = DocumentManager::new();
        let a = mgr.create();
        mgr.create();
        assert!(!mgr.has_unsaved_changes());
        mgr.find_mut(a).unwrap().context.modified = true;
        assert!(mgr.has_unsaved_changes());
    }

    #[test]
    fn names_in_creation_order() {
        let mut mgr = DocumentManager::new();
        let a = mgr.create();
        let b = mgr.create();
        mgr.find_mut(a).unwrap().name = "alpha".into();
        mgr.find_mut(b).unwrap().name = "beta".into();
        assert_eq!(mgr.names(), vec!["alpha", "beta"]);
        assert_eq!(mgr.first().unwrap().name, "alpha");
    }

    #[test]
    fn comment_prefixes() {
        assert_eq!(comment_prefix_for("main.rs"), "//");
        assert_eq!(comment_prefix_for("setup.py"), "#");
        assert_eq!(comment_prefix_for("init.el"), ";;");
        assert_eq!(comment_prefix_for("README"), "#");
    }
}
