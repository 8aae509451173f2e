//! Primitive cursor motions over a buffer.
//!
//! Every motion lands the cursor on a grapheme boundary and maintains the
//! goal column: vertical motion snaps to it, every horizontal motion
//! resets it. The buffer is only read here; edits live in the dispatcher.

use crate::column::{byte_to_column, column_to_byte};
use core_model::Buffer;
use core_state::EditContext;
use core_text::class::{char_class, CharClass};
use core_text::grapheme;

/// Line index, line start and line text at the cursor.
fn cursor_line(buf: &Buffer, cursor: usize) -> (usize, usize, String) {
    let line = buf.find_line_by_byte(cursor).unwrap_or(0);
    let start = buf.line_start(line).unwrap_or(0);
    (line, start, buf.line_text(line).unwrap_or_default())
}

/// Codepoint starting at `pos`, with its byte length.
fn char_at(buf: &Buffer, pos: usize) -> Option<(char, usize)> {
    if pos >= buf.len() {
        return None;
    }
    let mut bytes = [0u8; 4];
    let mut n = 0;
    for b in buf.bytes_from(pos).take(4) {
        bytes[n] = b;
        n += 1;
    }
    core_text::decode_next(&bytes[..n], 0)
}

/// Codepoint ending at `pos`: `(start_byte, char)`.
fn char_before(buf: &Buffer, pos: usize) -> Option<(usize, char)> {
    if pos == 0 {
        return None;
    }
    let mut start = pos - 1;
    while start > 0
        && buf
            .byte_at(start)
            .is_some_and(core_text::is_utf8_continuation)
    {
        start -= 1;
    }
    let bytes = buf.range(start, pos - start);
    match core_text::decode_next(&bytes, 0) {
        Some((c, len)) if len == pos - start => Some((start, c)),
        // Malformed tail: treat the single byte as one replacement char.
        _ => Some((pos - 1, core_text::REPLACEMENT)),
    }
}

/// One grapheme left, wrapping onto the previous line's end.
pub fn move_left(buf: &Buffer, ctx: &mut EditContext) {
    ctx.goal_column = None;
    if ctx.cursor == 0 {
        return;
    }
    let (_, start, text) = cursor_line(buf, ctx.cursor);
    if ctx.cursor == start {
        // Step over the newline to the previous line's end.
        ctx.cursor = start - 1;
    } else {
        ctx.cursor = start + grapheme::boundary_before(&text, ctx.cursor - start);
    }
}

/// One grapheme right, wrapping onto the next line's start.
pub fn move_right(buf: &Buffer, ctx: &mut EditContext) {
    ctx.goal_column = None;
    if ctx.cursor >= buf.len() {
        return;
    }
    let (line, start, text) = cursor_line(buf, ctx.cursor);
    let end = start + text.len();
    if ctx.cursor >= end {
        // On the newline: hop to the next line's start.
        if let Some(next_start) = buf.line_start(line + 1) {
            ctx.cursor = next_start;
        }
    } else {
        ctx.cursor = start + grapheme::boundary_after(&text, ctx.cursor - start);
    }
}

/// Vertical motion by `delta` lines, snapping the column to the goal.
pub fn move_vertical(buf: &Buffer, ctx: &mut EditContext, delta: isize, tab_width: usize) {
    let (line, start, text) = cursor_line(buf, ctx.cursor);
    let col = byte_to_column(&text, ctx.cursor - start, tab_width);
    let goal = *ctx.goal_column.get_or_insert(col);
    let target = line
        .saturating_add_signed(delta)
        .min(buf.line_count() - 1);
    if target == line {
        return;
    }
    let tstart = buf.line_start(target).unwrap_or(0);
    let ttext = buf.line_text(target).unwrap_or_default();
    ctx.cursor = tstart + column_to_byte(&ttext, goal, tab_width);
}

pub fn line_start(buf: &Buffer, ctx: &mut EditContext) {
    ctx.goal_column = None;
    let (_, start, _) = cursor_line(buf, ctx.cursor);
    ctx.cursor = start;
}

pub fn line_end(buf: &Buffer, ctx: &mut EditContext) {
    ctx.goal_column = None;
    let (_, start, text) = cursor_line(buf, ctx.cursor);
    ctx.cursor = start + text.len();
}

pub fn buffer_start(ctx: &mut EditContext) {
    ctx.goal_column = None;
    ctx.cursor = 0;
}

pub fn buffer_end(buf: &Buffer, ctx: &mut EditContext) {
    ctx.goal_column = None;
    ctx.cursor = buf.len();
}

/// Forward over any separator run, then over one word run of a single
/// class (alnum, hiragana, katakana and kanji never merge).
pub fn word_forward(buf: &Buffer, ctx: &mut EditContext) {
    ctx.goal_column = None;
    let mut pos = ctx.cursor;
    let mut run: Option<CharClass> = None;
    while let Some((c, len)) = char_at(buf, pos) {
        let class = char_class(c);
        match run {
            None if class.is_word() => run = Some(class),
            None => {
                pos += len;
                continue;
            }
            Some(r) if class == r => {}
            Some(_) => break,
        }
        pos += len;
    }
    ctx.cursor = snap(buf, pos);
}

/// Backward mirror of [`word_forward`]: lands at the start of the
/// previous word run.
pub fn word_backward(buf: &Buffer, ctx: &mut EditContext) {
    ctx.goal_column = None;
    let mut pos = ctx.cursor;
    let mut run: Option<CharClass> = None;
    while let Some((start, c)) = char_before(buf, pos) {
        let class = char_class(c);
        match run {
            None if class.is_word() => run = Some(class),
            None => {
                pos = start;
                continue;
            }
            Some(r) if class == r => {}
            Some(_) => break,
        }
        pos = start;
    }
    ctx.cursor = snap(buf, pos);
}

/// Snap a byte position onto the grapheme boundary at or before it.
pub fn snap(buf: &Buffer, pos: usize) -> usize {
    let pos = pos.min(buf.len());
    let Some(line) = buf.find_line_by_byte(pos) else {
        return pos;
    };
    let Some(span) = buf.line_range(line) else {
        return pos;
    };
    if pos > span.end {
        // Sitting on the newline byte itself.
        return pos;
    }
    let text = buf.line_text(line).unwrap_or_default();
    span.start + grapheme::snap_to_boundary(&text, pos - span.start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_at(cursor: usize) -> EditContext {
        EditContext {
            cursor,
            ..Default::default()
        }
    }

    #[test]
    fn grapheme_steps_through_cjk() {
        let buf = Buffer::from_str("a日本b");
        let mut ctx = ctx_at(0);
        let expect = [1usize, 4, 7, 8];
        for &e in &expect {
            move_right(&buf, &mut ctx);
            assert_eq!(ctx.cursor, e);
        }
        move_right(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 8);
        let back = [7usize, 4, 1, 0];
        for &e in &back {
            move_left(&buf, &mut ctx);
            assert_eq!(ctx.cursor, e);
        }
        move_left(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 0);
    }

    #[test]
    fn horizontal_wraps_line_boundaries() {
        let buf = Buffer::from_str("ab\ncd");
        let mut ctx = ctx_at(2);
        move_right(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 3);
        move_left(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 2);
    }

    #[test]
    fn vertical_snaps_to_goal_column() {
        let buf = Buffer::from_str("long line here\nab\nanother long one");
        let mut ctx = ctx_at(9);
        move_vertical(&buf, &mut ctx, 1, 4);
        assert_eq!(ctx.cursor, buf.line_start(1).unwrap() + 2);
        assert_eq!(ctx.goal_column, Some(9));
        move_vertical(&buf, &mut ctx, 1, 4);
        // Goal column restored on the longer line.
        assert_eq!(ctx.cursor, buf.line_start(2).unwrap() + 9);
    }

    #[test]
    fn vertical_goal_respects_wide_chars() {
        let buf = Buffer::from_str("abcd\n日本語");
        let mut ctx = ctx_at(3);
        move_vertical(&buf, &mut ctx, 1, 4);
        // Col 3 falls inside 本 (cols 2..4): snap to its start, byte 3.
        assert_eq!(ctx.cursor, buf.line_start(1).unwrap() + 3);
    }

    #[test]
    fn vertical_clamps_at_edges() {
        let buf = Buffer::from_str("ab\ncd");
        let mut ctx = ctx_at(1);
        move_vertical(&buf, &mut ctx, -1, 4);
        assert_eq!(ctx.cursor, 1);
        move_vertical(&buf, &mut ctx, 1, 4);
        move_vertical(&buf, &mut ctx, 1, 4);
        assert_eq!(ctx.cursor, 4);
    }

    #[test]
    fn horizontal_motion_resets_goal() {
        let buf = Buffer::from_str("abc\ndef");
        let mut ctx = ctx_at(2);
        move_vertical(&buf, &mut ctx, 1, 4);
        assert!(ctx.goal_column.is_some());
        move_left(&buf, &mut ctx);
        assert!(ctx.goal_column.is_none());
    }

    #[test]
    fn line_and_buffer_edges() {
        let buf = Buffer::from_str("hello\nworld");
        let mut ctx = ctx_at(8);
        line_start(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 6);
        line_end(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 11);
        buffer_start(&mut ctx);
        assert_eq!(ctx.cursor, 0);
        buffer_end(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 11);
    }

    #[test]
    fn words_across_lines() {
        let buf = Buffer::from_str("foo bar\nbaz");
        let mut ctx = ctx_at(0);
        word_forward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 3);
        word_forward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 7);
        word_forward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 11);
        word_backward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 8);
        word_backward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 4);
        word_backward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 0);
    }

    #[test]
    fn word_classes_split_scripts() {
        let buf = Buffer::from_str("abc漢字かな");
        let mut ctx = ctx_at(0);
        word_forward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 3);
        word_forward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 9);
        word_forward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 15);
    }

    #[test]
    fn word_forward_across_blank_lines() {
        let buf = Buffer::from_str("foo\n\n\n\nbar");
        let mut ctx = ctx_at(3);
        word_forward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 10);
    }

    #[test]
    fn word_motion_at_buffer_edges() {
        let buf = Buffer::from_str("  ");
        let mut ctx = ctx_at(0);
        word_forward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 2);
        word_backward(&buf, &mut ctx);
        assert_eq!(ctx.cursor, 0);
    }
}
