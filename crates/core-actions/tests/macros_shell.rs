//! Keyboard macros and the shell pipeline, end to end.

mod common;

use common::*;
use core_events::Key;

fn macro_start(ed: &mut core_actions::Editor) {
    keys(ed, &[ctrl(b'x'), Key::Char(b'(')]);
}

fn macro_end(ed: &mut core_actions::Editor) {
    keys(ed, &[ctrl(b'x'), Key::Char(b')')]);
}

fn macro_play(ed: &mut core_actions::Editor) {
    keys(ed, &[ctrl(b'x'), Key::Char(b'e')]);
}

#[test]
fn macro_records_and_replays() {
    let mut ed = editor();
    macro_start(&mut ed);
    type_str(&mut ed, "ab");
    macro_end(&mut ed);
    assert_eq!(text(&ed), "ab");
    macro_play(&mut ed);
    assert_eq!(text(&ed), "abab");
    macro_play(&mut ed);
    assert_eq!(text(&ed), "ababab");
}

#[test]
fn macro_captures_commands_not_just_text() {
    let mut ed = editor();
    type_str(&mut ed, "x\n");
    macro_start(&mut ed);
    type_str(&mut ed, "- ");
    key(&mut ed, ctrl(b'e'));
    key(&mut ed, Key::Enter);
    macro_end(&mut ed);
    macro_play(&mut ed);
    assert_eq!(text(&ed), "x\n- \n- \n");
}

#[test]
fn empty_macro_preserves_previous() {
    let mut ed = editor();
    macro_start(&mut ed);
    type_str(&mut ed, "keep");
    macro_end(&mut ed);
    macro_start(&mut ed);
    macro_end(&mut ed);
    macro_play(&mut ed);
    assert_eq!(text(&ed), "keepkeep");
}

#[test]
fn macro_control_keys_are_not_captured() {
    let mut ed = editor();
    macro_start(&mut ed);
    type_str(&mut ed, "z");
    macro_end(&mut ed);
    // Replay must not re-enter recording.
    macro_play(&mut ed);
    assert!(!ed.macros.is_recording());
    assert_eq!(text(&ed), "zz");
}

#[test]
fn shell_sort_replaces_buffer() {
    let mut ed = editor();
    type_str(&mut ed, "banana\napple\ncherry\n");
    key(&mut ed, alt(b'|'));
    type_str(&mut ed, "% | sort >");
    key(&mut ed, Key::Enter);
    assert_eq!(text(&ed), "apple\nbanana\ncherry\n");
}

#[test]
fn shell_line_source_insert_sink() {
    let mut ed = editor();
    type_str(&mut ed, "hello");
    key(&mut ed, ctrl(b'e'));
    key(&mut ed, alt(b'!'));
    type_str(&mut ed, ". tr a-z A-Z +>");
    key(&mut ed, Key::Enter);
    assert_eq!(text(&ed), "helloHELLO");
}

#[test]
fn shell_region_source() {
    let mut ed = editor();
    type_str(&mut ed, "abc def");
    key(&mut ed, alt(b'<'));
    key(&mut ed, ctrl(b'@'));
    key(&mut ed, alt(b'f')); // region "abc"
    key(&mut ed, alt(b'|'));
    type_str(&mut ed, "tr a-c x-z >");
    key(&mut ed, Key::Enter);
    assert_eq!(text(&ed), "xyz def");
}

#[test]
fn shell_short_output_echoes() {
    let mut ed = editor();
    key(&mut ed, alt(b'!'));
    type_str(&mut ed, "echo short and sweet");
    key(&mut ed, Key::Enter);
    let (echo, _) = ed.echo_line();
    assert_eq!(echo, "short and sweet");
}

#[test]
fn shell_long_output_goes_to_scratch_document() {
    let mut ed = editor();
    key(&mut ed, alt(b'!'));
    type_str(&mut ed, "seq 1 50");
    key(&mut ed, Key::Enter);
    assert_eq!(ed.current_doc().name, "*shell-output*");
    assert!(text(&ed).starts_with("1\n2\n"));
}

#[test]
fn shell_new_document_sink() {
    let mut ed = editor();
    type_str(&mut ed, "unchanged");
    key(&mut ed, alt(b'!'));
    type_str(&mut ed, "echo fresh n>");
    key(&mut ed, Key::Enter);
    assert!(ed.current_doc().name.starts_with("*shell*"));
    assert_eq!(text(&ed), "fresh\n");
    assert_eq!(ed.documents.len(), 2);
}

#[test]
fn shell_failure_reports_stderr_and_keeps_buffer() {
    let mut ed = editor();
    type_str(&mut ed, "precious");
    keys(&mut ed, &[ctrl(b'x'), Key::Char(b'h')]);
    key(&mut ed, alt(b'|'));
    type_str(&mut ed, "echo broken >&2; exit 9 >");
    key(&mut ed, Key::Enter);
    assert_eq!(text(&ed), "precious");
    let (echo, _) = ed.echo_line();
    assert!(echo.contains("broken"), "echo {echo:?}");
}

#[test]
fn shell_quoted_sink_stays_in_body() {
    let mut ed = editor();
    key(&mut ed, alt(b'!'));
    type_str(&mut ed, "echo 'n>'");
    key(&mut ed, Key::Enter);
    let (echo, _) = ed.echo_line();
    assert_eq!(echo, "n>");
}
