//! Edit primitives: buffer mutations wired to the undo log, kill ring and
//! cursor. The dispatcher calls these; they never touch views or the
//! screen.

use core_model::BufferError;
use core_render::{byte_to_column, column_to_byte, motion};
use core_state::{Document, EditContext};
use core_text::grapheme;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("Buffer is read-only")]
    ReadOnly,
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

fn guard(doc: &Document) -> Result<(), EditError> {
    if doc.context.read_only {
        return Err(EditError::ReadOnly);
    }
    Ok(())
}

/// Insert `text` at the cursor; participates in insert coalescing.
pub fn insert_text(doc: &mut Document, text: &str, now: Instant) -> Result<(), EditError> {
    guard(doc)?;
    if text.is_empty() {
        return Ok(());
    }
    let pos = doc.context.cursor;
    doc.buffer.insert(pos, text.as_bytes())?;
    let after = pos + text.len();
    doc.undo
        .record_insert(pos, text.as_bytes().to_vec(), pos, after, now);
    doc.context.cursor = after;
    doc.context.goal_column = None;
    doc.context.modified = true;
    Ok(())
}

/// Insert as one sealed undo unit (yank, paste, shell output).
pub fn insert_block(doc: &mut Document, text: &str, now: Instant) -> Result<(), EditError> {
    doc.undo.seal();
    insert_text(doc, text, now)?;
    doc.undo.seal();
    Ok(())
}

pub fn insert_char(doc: &mut Document, c: char, now: Instant) -> Result<(), EditError> {
    let mut buf = [0u8; 4];
    insert_text(doc, c.encode_utf8(&mut buf), now)
}

/// Delete `[start, end)`; optionally feed the kill ring, accreting onto
/// the most recent kill when `accrete`.
pub fn delete_range(
    doc: &mut Document,
    start: usize,
    end: usize,
    now: Instant,
    kill: bool,
    accrete: bool,
) -> Result<usize, EditError> {
    guard(doc)?;
    let end = end.min(doc.buffer.len());
    if start >= end {
        return Ok(0);
    }
    let bytes = doc.buffer.range(start, end - start);
    let cursor_before = doc.context.cursor;
    doc.buffer.delete(start, end - start);
    doc.undo
        .record_delete(start, bytes.clone(), cursor_before, start, now);
    if kill {
        if accrete {
            doc.context.kill_ring.append_to_front(&bytes);
        } else {
            doc.context.kill_ring.push(bytes);
        }
    }
    // Keep the mark stable across the deletion: positions past the range
    // shift left, positions inside collapse onto its start.
    if let Some(m) = doc.context.mark {
        let removed = end - start;
        doc.context.mark = Some(if m >= end {
            m - removed
        } else if m > start {
            start
        } else {
            m
        });
    }
    doc.context.cursor = start;
    doc.context.goal_column = None;
    doc.context.modified = true;
    Ok(end - start)
}

/// End offset of the grapheme (or newline) under `pos`.
fn grapheme_end(doc: &Document, pos: usize) -> Option<usize> {
    if pos >= doc.buffer.len() {
        return None;
    }
    let line = doc.buffer.find_line_by_byte(pos)?;
    let span = doc.buffer.line_range(line)?;
    if pos >= span.end {
        // The newline itself.
        return Some(pos + 1);
    }
    let text = doc.buffer.line_text(line)?;
    Some(span.start + grapheme::boundary_after(&text, pos - span.start))
}

/// Start offset of the grapheme (or newline) before `pos`.
fn grapheme_start_before(doc: &Document, pos: usize) -> Option<usize> {
    if pos == 0 {
        return None;
    }
    let line = doc.buffer.find_line_by_byte(pos)?;
    let span = doc.buffer.line_range(line)?;
    if pos == span.start {
        return Some(pos - 1);
    }
    let text = doc.buffer.line_text(line)?;
    Some(span.start + grapheme::boundary_before(&text, pos - span.start))
}

/// `C-d`: delete the grapheme under the cursor.
pub fn delete_forward(doc: &mut Document, now: Instant) -> Result<(), EditError> {
    let pos = doc.context.cursor;
    if let Some(end) = grapheme_end(doc, pos) {
        delete_range(doc, pos, end, now, false, false)?;
    }
    Ok(())
}

/// Backspace: delete the grapheme before the cursor.
pub fn delete_backward(doc: &mut Document, now: Instant) -> Result<(), EditError> {
    let pos = doc.context.cursor;
    if let Some(start) = grapheme_start_before(doc, pos) {
        delete_range(doc, start, pos, now, false, false)?;
    }
    Ok(())
}

/// `M-d`: kill to the end of the next word.
pub fn delete_word_forward(doc: &mut Document, now: Instant) -> Result<(), EditError> {
    let mut probe = EditContext {
        cursor: doc.context.cursor,
        ..Default::default()
    };
    motion::word_forward(&doc.buffer, &mut probe);
    delete_range(doc, doc.context.cursor, probe.cursor, now, true, false)?;
    Ok(())
}

/// `M-DEL`: kill back to the start of the previous word.
pub fn delete_word_backward(doc: &mut Document, now: Instant) -> Result<(), EditError> {
    let mut probe = EditContext {
        cursor: doc.context.cursor,
        ..Default::default()
    };
    motion::word_backward(&doc.buffer, &mut probe);
    delete_range(doc, probe.cursor, doc.context.cursor, now, true, false)?;
    Ok(())
}

/// `C-k`: kill to end of line, or the newline when already there.
/// `accrete` joins consecutive kills into one ring entry.
pub fn kill_line(doc: &mut Document, now: Instant, accrete: bool) -> Result<(), EditError> {
    let pos = doc.context.cursor;
    let Some(line) = doc.buffer.find_line_by_byte(pos) else {
        return Ok(());
    };
    let Some(span) = doc.buffer.line_range(line) else {
        return Ok(());
    };
    let end = if pos < span.end { span.end } else { pos + 1 };
    delete_range(doc, pos, end, now, true, accrete)?;
    Ok(())
}

/// `C-w`: kill the active region.
pub fn kill_region(doc: &mut Document, now: Instant) -> Result<bool, EditError> {
    let Some((start, end)) = doc.context.region() else {
        return Ok(false);
    };
    delete_range(doc, start, end, now, true, false)?;
    doc.context.mark = None;
    Ok(true)
}

/// `M-w`: copy the active region without deleting.
pub fn copy_region(doc: &mut Document) -> bool {
    let Some((start, end)) = doc.context.region() else {
        return false;
    };
    let bytes = doc.buffer.range(start, end - start);
    doc.context.kill_ring.push(bytes);
    doc.context.mark = None;
    true
}

/// `C-y`: insert the most recent kill at the cursor.
pub fn yank(doc: &mut Document, now: Instant) -> Result<bool, EditError> {
    let Some(bytes) = doc.context.kill_ring.most_recent().map(<[u8]>::to_vec) else {
        return Ok(false);
    };
    let text = String::from_utf8_lossy(&bytes).into_owned();
    insert_block(doc, &text, now)?;
    Ok(true)
}

pub fn set_mark(doc: &mut Document) {
    doc.context.mark = Some(doc.context.cursor);
}

/// `C-x h`: point to start, mark to end.
pub fn mark_whole_buffer(doc: &mut Document) {
    doc.context.mark = Some(doc.buffer.len());
    doc.context.cursor = 0;
    doc.context.goal_column = None;
}

/// `C-u`: pop one undo entry. Returns false with nothing to undo.
pub fn undo(doc: &mut Document) -> Result<bool, EditError> {
    guard(doc)?;
    match doc.undo.undo(&mut doc.buffer) {
        Some(cursor) => {
            doc.context.cursor = cursor.min(doc.buffer.len());
            doc.context.goal_column = None;
            doc.context.modified = true;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// `C-/`: reapply the last undone entry.
pub fn redo(doc: &mut Document) -> Result<bool, EditError> {
    guard(doc)?;
    match doc.undo.redo(&mut doc.buffer) {
        Some(cursor) => {
            doc.context.cursor = cursor.min(doc.buffer.len());
            doc.context.goal_column = None;
            doc.context.modified = true;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// `M-^`: join the current line onto the previous one with one space.
pub fn join_line(doc: &mut Document, now: Instant) -> Result<(), EditError> {
    let Some(line) = doc.buffer.find_line_by_byte(doc.context.cursor) else {
        return Ok(());
    };
    if line == 0 {
        return Ok(());
    }
    let start = doc.buffer.line_start(line).expect("line exists");
    let text = doc.buffer.line_text(line).unwrap_or_default();
    let indent = text.len() - text.trim_start().len();
    // Remove the newline plus the joined line's indentation, then insert a
    // single separating space.
    doc.undo.seal();
    delete_range(doc, start - 1, start + indent, now, false, false)?;
    let join_at = doc.context.cursor;
    insert_text(doc, " ", now)?;
    doc.context.cursor = join_at;
    doc.undo.seal();
    Ok(())
}

/// `M-;`: toggle the line comment on the current line (or every line the
/// region touches).
pub fn comment_toggle(doc: &mut Document, now: Instant) -> Result<(), EditError> {
    guard(doc)?;
    let prefix = doc.comment_prefix;
    let (first, last) = match doc.context.region() {
        Some((s, e)) => {
            let first = doc.buffer.find_line_by_byte(s).unwrap_or(0);
            // An end on a line start does not drag that line in.
            let last = doc.buffer.find_line_by_byte(e.saturating_sub(1)).unwrap_or(first);
            (first, last.max(first))
        }
        None => {
            let line = doc.buffer.find_line_by_byte(doc.context.cursor).unwrap_or(0);
            (line, line)
        }
    };
    let all_commented = (first..=last).all(|l| {
        doc.buffer
            .line_text(l)
            .is_some_and(|t| t.trim_start().starts_with(prefix))
    });
    doc.undo.seal();
    // Bottom-up so earlier offsets stay valid.
    for line in (first..=last).rev() {
        let Some(span) = doc.buffer.line_range(line) else {
            continue;
        };
        let text = doc.buffer.line_text(line).unwrap_or_default();
        if all_commented {
            let indent = text.len() - text.trim_start().len();
            let mut cut = prefix.len();
            if text[indent + cut..].starts_with(' ') {
                cut += 1;
            }
            doc.context.cursor = span.start;
            delete_range(doc, span.start + indent, span.start + indent + cut, now, false, false)?;
            doc.undo.seal();
        } else if !text.trim().is_empty() {
            doc.context.cursor = span.start;
            insert_text(doc, &format!("{prefix} "), now)?;
            doc.undo.seal();
        }
    }
    doc.context.mark = None;
    Ok(())
}

/// `C-x r k`: kill the rectangle between mark and cursor. Returns the
/// removed columns, one string per line.
pub fn kill_rectangle(
    doc: &mut Document,
    tab_width: usize,
    now: Instant,
) -> Result<Option<Vec<String>>, EditError> {
    guard(doc)?;
    let Some(mark) = doc.context.mark else {
        return Ok(None);
    };
    let cursor = doc.context.cursor;
    let corner = |pos: usize| {
        let line = doc.buffer.find_line_by_byte(pos).unwrap_or(0);
        let start = doc.buffer.line_start(line).unwrap_or(0);
        let text = doc.buffer.line_text(line).unwrap_or_default();
        (line, byte_to_column(&text, pos - start, tab_width))
    };
    let (l1, c1) = corner(mark);
    let (l2, c2) = corner(cursor);
    let (top, bottom) = (l1.min(l2), l1.max(l2));
    let (left, right) = (c1.min(c2), c1.max(c2));
    if left == right {
        return Ok(None);
    }

    doc.undo.seal();
    let mut rows = vec![String::new(); bottom - top + 1];
    for line in (top..=bottom).rev() {
        let Some(span) = doc.buffer.line_range(line) else {
            continue;
        };
        let text = doc.buffer.line_text(line).unwrap_or_default();
        let from = column_to_byte(&text, left, tab_width);
        let to = column_to_byte(&text, right, tab_width);
        rows[line - top] = text[from..to].to_string();
        if from < to {
            doc.context.cursor = span.start + from;
            delete_range(doc, span.start + from, span.start + to, now, false, false)?;
            doc.undo.seal();
        }
    }
    // Land at the rectangle's top-left corner.
    if let Some(span) = doc.buffer.line_range(top) {
        let text = doc.buffer.line_text(top).unwrap_or_default();
        doc.context.cursor = span.start + column_to_byte(&text, left, tab_width);
    }
    doc.context.mark = None;
    Ok(Some(rows))
}

/// `C-x r y`: insert a rectangle, one row per line starting at the cursor
/// column; short lines are padded with spaces.
pub fn yank_rectangle(
    doc: &mut Document,
    rect: &[String],
    tab_width: usize,
    now: Instant,
) -> Result<(), EditError> {
    guard(doc)?;
    if rect.is_empty() {
        return Ok(());
    }
    let cursor = doc.context.cursor;
    let first_line = doc.buffer.find_line_by_byte(cursor).unwrap_or(0);
    let start = doc.buffer.line_start(first_line).unwrap_or(0);
    let first_text = doc.buffer.line_text(first_line).unwrap_or_default();
    let col = byte_to_column(&first_text, cursor - start, tab_width);

    doc.undo.seal();
    // Bottom-up keeps upper offsets stable while lines grow.
    for (i, row) in rect.iter().enumerate().rev() {
        let line = first_line + i;
        if line >= doc.buffer.line_count() {
            // Extend the document with fresh lines first.
            let end = doc.buffer.len();
            let missing = line + 1 - doc.buffer.line_count();
            doc.context.cursor = end;
            insert_text(doc, &"\n".repeat(missing), now)?;
            doc.undo.seal();
        }
        let span = doc.buffer.line_range(line).expect("line just ensured");
        let text = doc.buffer.line_text(line).unwrap_or_default();
        let width = byte_to_column(&text, text.len(), tab_width);
        let at = if width < col {
            doc.context.cursor = span.end;
            insert_text(doc, &" ".repeat(col - width), now)?;
            doc.undo.seal();
            doc.context.cursor
        } else {
            span.start + column_to_byte(&text, col, tab_width)
        };
        doc.context.cursor = at;
        insert_text(doc, row, now)?;
        doc.undo.seal();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(text: &str) -> Document {
        Document {
            id: core_model::DocumentId(0),
            name: "*test*".to_string(),
            path: None,
            encoding: core_model::Encoding::Utf8,
            line_ending: core_model::LineEnding::Lf,
            had_bom: false,
            buffer: core_model::Buffer::from_str(text),
            context: EditContext::default(),
            undo: core_state::UndoLog::new(),
            file_meta: core_model::FileMeta::default(),
            comment_prefix: "#",
        }
    }

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn insert_moves_cursor_and_marks_modified() {
        let mut doc = doc_with("");
        insert_text(&mut doc, "hi", t0()).unwrap();
        assert_eq!(doc.buffer.text(), "hi");
        assert_eq!(doc.context.cursor, 2);
        assert!(doc.context.modified);
    }

    #[test]
    fn read_only_rejects_edits() {
        let mut doc = doc_with("x");
        doc.context.read_only = true;
        assert!(matches!(
            insert_text(&mut doc, "y", t0()),
            Err(EditError::ReadOnly)
        ));
        assert_eq!(doc.buffer.text(), "x");
    }

    #[test]
    fn delete_forward_takes_whole_grapheme() {
        let mut doc = doc_with("a日b");
        doc.context.cursor = 1;
        delete_forward(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "ab");
        assert_eq!(doc.context.cursor, 1);
    }

    #[test]
    fn backspace_joins_lines() {
        let mut doc = doc_with("ab\ncd");
        doc.context.cursor = 3;
        delete_backward(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "abcd");
        assert_eq!(doc.context.cursor, 2);
    }

    #[test]
    fn kill_line_then_newline_accretes() {
        let mut doc = doc_with("hello\nworld");
        doc.context.cursor = 0;
        kill_line(&mut doc, t0(), false).unwrap();
        assert_eq!(doc.buffer.text(), "\nworld");
        kill_line(&mut doc, t0(), true).unwrap();
        assert_eq!(doc.buffer.text(), "world");
        assert_eq!(doc.context.kill_ring.most_recent(), Some(&b"hello\n"[..]));
    }

    #[test]
    fn deletion_shifts_or_collapses_the_mark() {
        let mut doc = doc_with("abcdefgh");
        doc.context.mark = Some(6);
        delete_range(&mut doc, 1, 3, t0(), false, false).unwrap();
        assert_eq!(doc.context.mark, Some(4));
        // Deleting a range containing the mark collapses it to the start.
        delete_range(&mut doc, 3, 10, t0(), false, false).unwrap();
        assert_eq!(doc.context.mark, Some(3));
        assert_eq!(doc.buffer.text(), "ade");
    }

    #[test]
    fn region_kill_copy_yank_round_trip() {
        let mut doc = doc_with("hello world");
        doc.context.mark = Some(0);
        doc.context.cursor = 5;
        assert!(kill_region(&mut doc, t0()).unwrap());
        assert_eq!(doc.buffer.text(), " world");
        assert_eq!(doc.context.cursor, 0);
        yank(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "hello world");

        doc.context.mark = Some(6);
        doc.context.cursor = 11;
        assert!(copy_region(&mut doc));
        assert_eq!(doc.buffer.text(), "hello world");
        doc.context.cursor = 0;
        yank(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "worldhello world");
    }

    #[test]
    fn undo_redo_identity_on_bytes_and_cursor() {
        let mut doc = doc_with("");
        for (i, c) in "abc".chars().enumerate() {
            doc.context.cursor = i;
            insert_char(&mut doc, c, t0()).unwrap();
        }
        assert!(undo(&mut doc).unwrap());
        assert_eq!(doc.buffer.len(), 0);
        assert_eq!(doc.context.cursor, 0);
        assert!(redo(&mut doc).unwrap());
        assert_eq!(doc.buffer.text(), "abc");
        assert_eq!(doc.context.cursor, 3);
    }

    #[test]
    fn word_kills_feed_ring() {
        let mut doc = doc_with("one two");
        doc.context.cursor = 0;
        delete_word_forward(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), " two");
        assert_eq!(doc.context.kill_ring.most_recent(), Some(&b"one"[..]));
        doc.context.cursor = 4;
        delete_word_backward(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), " ");
        assert_eq!(doc.context.kill_ring.most_recent(), Some(&b"two"[..]));
    }

    #[test]
    fn join_line_single_space() {
        let mut doc = doc_with("hello\n    world");
        doc.context.cursor = 8;
        join_line(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "hello world");
        assert_eq!(doc.context.cursor, 5);
    }

    #[test]
    fn comment_toggle_adds_and_removes() {
        let mut doc = doc_with("line one\nline two");
        doc.context.cursor = 0;
        comment_toggle(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "# line one\nline two");
        doc.context.cursor = 0;
        comment_toggle(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "line one\nline two");
    }

    #[test]
    fn comment_toggle_region_spans_lines() {
        let mut doc = doc_with("a\nb\nc");
        doc.context.mark = Some(0);
        doc.context.cursor = 5;
        comment_toggle(&mut doc, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "# a\n# b\n# c");
    }

    #[test]
    fn rectangle_kill_and_yank() {
        let mut doc = doc_with("abcd\nefgh\nijkl");
        doc.context.mark = Some(1); // line 0, col 1
        doc.context.cursor = 13; // line 2, col 3
        let rect = kill_rectangle(&mut doc, 4, t0()).unwrap().unwrap();
        assert_eq!(rect, vec!["bc", "fg", "jk"]);
        assert_eq!(doc.buffer.text(), "ad\neh\nil");
        assert_eq!(doc.context.cursor, 1);

        doc.context.cursor = 1;
        yank_rectangle(&mut doc, &rect, 4, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "abcd\nefgh\nijkl");
    }

    #[test]
    fn rectangle_yank_pads_short_lines() {
        let mut doc = doc_with("abcdef\nx\n");
        doc.context.cursor = 4; // col 4 on line 0
        yank_rectangle(&mut doc, &["XX".to_string(), "YY".to_string()], 4, t0()).unwrap();
        assert_eq!(doc.buffer.text(), "abcdXXef\nx   YY\n");
    }
}
