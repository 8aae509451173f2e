//! Incremental search and query-replace through the dispatcher.

mod common;

use common::*;
use core_actions::DispatchState;
use core_events::Key;

#[test]
fn isearch_forward_lands_after_match() {
    let mut ed = editor();
    type_str(&mut ed, "say hey hey done");
    key(&mut ed, alt(b'<'));
    key(&mut ed, ctrl(b's'));
    type_str(&mut ed, "hey");
    // Forward search leaves the cursor at the match end.
    assert_eq!(cursor(&ed), 7);
    key(&mut ed, ctrl(b's'));
    assert_eq!(cursor(&ed), 11);
    key(&mut ed, Key::Enter);
    assert!(matches!(ed.state, DispatchState::Normal));
}

#[test]
fn isearch_wraps_around() {
    let mut ed = editor();
    type_str(&mut ed, "hello world");
    // Cursor at end; a forward search wraps to the front match.
    key(&mut ed, ctrl(b's'));
    type_str(&mut ed, "hello");
    assert_eq!(cursor(&ed), 5);
}

#[test]
fn isearch_cancel_restores_origin() {
    let mut ed = editor();
    type_str(&mut ed, "alpha beta");
    key(&mut ed, alt(b'<'));
    key(&mut ed, ctrl(b's'));
    type_str(&mut ed, "beta");
    assert_ne!(cursor(&ed), 0);
    key(&mut ed, ctrl(b'g'));
    assert_eq!(cursor(&ed), 0);
    assert!(matches!(ed.state, DispatchState::Normal));
}

#[test]
fn isearch_backspace_shrinks_pattern() {
    let mut ed = editor();
    type_str(&mut ed, "aa ab");
    key(&mut ed, alt(b'<'));
    key(&mut ed, ctrl(b's'));
    type_str(&mut ed, "ab");
    assert_eq!(cursor(&ed), 5);
    key(&mut ed, Key::Backspace);
    // Pattern back to "a": first match from the origin again.
    assert_eq!(cursor(&ed), 1);
}

#[test]
fn isearch_backward_lands_on_match_start() {
    let mut ed = editor();
    type_str(&mut ed, "one two one");
    key(&mut ed, ctrl(b'r'));
    type_str(&mut ed, "one");
    assert_eq!(cursor(&ed), 8);
}

#[test]
fn regex_isearch_finds_digits() {
    let mut ed = editor();
    type_str(&mut ed, "abc123def456");
    key(&mut ed, alt(b'<'));
    key(&mut ed, Key::CtrlAlt(b's'));
    type_str(&mut ed, "\\d+");
    assert_eq!(cursor(&ed), 6); // after "123"
}

#[test]
fn regex_isearch_backward_prefers_latest() {
    let mut ed = editor();
    type_str(&mut ed, "abc123def456");
    key(&mut ed, Key::CtrlAlt(b'r'));
    type_str(&mut ed, "\\d+");
    // Candidates scan from the cursor backward: the final digit.
    assert_eq!(cursor(&ed), 11);
}

#[test]
fn non_search_key_exits_isearch_and_applies() {
    let mut ed = editor();
    type_str(&mut ed, "find me");
    key(&mut ed, alt(b'<'));
    key(&mut ed, ctrl(b's'));
    type_str(&mut ed, "me");
    let at = cursor(&ed);
    key(&mut ed, ctrl(b'a'));
    assert!(matches!(ed.state, DispatchState::Normal));
    let line_start = ed.current_doc().buffer.line_start(0).unwrap();
    assert_eq!(cursor(&ed), line_start);
    assert_ne!(cursor(&ed), at);
}

#[test]
fn query_replace_interactive_confirm() {
    let mut ed = editor();
    type_str(&mut ed, "foo bar foo baz foo");
    key(&mut ed, alt(b'<'));
    key(&mut ed, alt(b'%'));
    type_str(&mut ed, "foo");
    key(&mut ed, Key::Enter);
    type_str(&mut ed, "qux");
    key(&mut ed, Key::Enter);
    assert!(matches!(ed.state, DispatchState::QueryReplace(_)));
    key(&mut ed, Key::Char(b'y')); // first
    key(&mut ed, Key::Char(b'n')); // skip second
    key(&mut ed, Key::Char(b'y')); // third
    assert_eq!(text(&ed), "qux bar foo baz qux");
    assert!(matches!(ed.state, DispatchState::Normal));
    let (echo, _) = ed.echo_line();
    assert!(echo.contains("Replaced 2 occurrences"), "echo {echo:?}");
}

#[test]
fn query_replace_bang_replaces_rest() {
    let mut ed = editor();
    type_str(&mut ed, "x.x.x.x");
    key(&mut ed, alt(b'<'));
    key(&mut ed, alt(b'%'));
    type_str(&mut ed, "x");
    key(&mut ed, Key::Enter);
    type_str(&mut ed, "y");
    key(&mut ed, Key::Enter);
    key(&mut ed, Key::Char(b'!'));
    assert_eq!(text(&ed), "y.y.y.y");
}

#[test]
fn query_replace_starts_at_cursor_without_wrap() {
    let mut ed = editor();
    type_str(&mut ed, "aaa bbb aaa");
    // Cursor sits at the end; nothing ahead of it matches.
    key(&mut ed, alt(b'%'));
    type_str(&mut ed, "aaa");
    key(&mut ed, Key::Enter);
    key(&mut ed, Key::Enter); // empty replacement
    let (echo, _) = ed.echo_line();
    assert!(echo.contains("No occurrences"), "echo {echo:?}");
    assert_eq!(text(&ed), "aaa bbb aaa");
}

#[test]
fn regex_query_replace_digits() {
    let mut ed = editor();
    type_str(&mut ed, "a1 b22 c333");
    key(&mut ed, alt(b'<'));
    key(&mut ed, Key::CtrlAlt(b'%'));
    type_str(&mut ed, "\\d+");
    key(&mut ed, Key::Enter);
    type_str(&mut ed, "#");
    key(&mut ed, Key::Enter);
    key(&mut ed, Key::Char(b'!'));
    assert_eq!(text(&ed), "a# b# c#");
}

#[test]
fn query_replace_quit_stops_early() {
    let mut ed = editor();
    type_str(&mut ed, "k k k");
    key(&mut ed, alt(b'<'));
    key(&mut ed, alt(b'%'));
    type_str(&mut ed, "k");
    key(&mut ed, Key::Enter);
    type_str(&mut ed, "m");
    key(&mut ed, Key::Enter);
    key(&mut ed, Key::Char(b'y'));
    key(&mut ed, Key::Char(b'q'));
    assert_eq!(text(&ed), "m k k");
}

#[test]
fn search_history_records_committed_patterns() {
    let mut ed = editor();
    type_str(&mut ed, "needle haystack");
    key(&mut ed, alt(b'<'));
    key(&mut ed, ctrl(b's'));
    type_str(&mut ed, "needle");
    key(&mut ed, Key::Enter);
    assert!(ed.history.entries().contains(&"needle".to_string()));
}
