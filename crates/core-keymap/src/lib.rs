//! Keymap: `Key` → named command.
//!
//! Pure and deterministic: resolution depends only on the tables and the
//! prefix the dispatcher is in. Commands are a closed enum dispatched from
//! a static table, with no dynamic registration and no trait objects.
//! `C-x` and `C-x r` are prefixes; the dispatcher reads the follow-up key
//! and consults the secondary tables here.
//!
//! Unbound keys carrying a printable codepoint insert it; unbound special
//! keys are ignored.

use core_events::Key;
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::trace;

/// Pending key sequence, used for prefix echo and macro bookkeeping.
pub type KeySeq = SmallVec<[Key; 4]>;

/// Every named command in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Motion
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    LineStart,
    LineEnd,
    WordForward,
    WordBackward,
    BufferStart,
    BufferEnd,
    PageDown,
    PageUp,
    // Editing
    InsertNewline,
    DeleteChar,
    DeleteCharBackward,
    DeleteWord,
    DeleteWordBackward,
    KillLine,
    SetMark,
    MarkWholeBuffer,
    KillRegion,
    CopyRegion,
    Yank,
    Undo,
    Redo,
    JoinLine,
    CommentToggle,
    RectangleKill,
    RectangleYank,
    // Search and replace
    IsearchForward,
    IsearchBackward,
    RegexIsearchForward,
    RegexIsearchBackward,
    QueryReplace,
    RegexQueryReplace,
    // Files, buffers, windows
    Save,
    Quit,
    OpenFile,
    SwitchBuffer,
    SplitHorizontal,
    SplitVertical,
    CloseWindow,
    CloseOtherWindows,
    OtherWindow,
    // Shell and macros
    ShellCommand,
    ShellPipeRegion,
    MacroStart,
    MacroEnd,
    MacroPlay,
    // Meta
    ExecuteCommand,
    Cancel,
}

impl Command {
    /// The `M-x` name of this command.
    pub fn name(self) -> &'static str {
        match self {
            Command::MoveLeft => "backward-char",
            Command::MoveRight => "forward-char",
            Command::MoveUp => "previous-line",
            Command::MoveDown => "next-line",
            Command::LineStart => "move-beginning-of-line",
            Command::LineEnd => "move-end-of-line",
            Command::WordForward => "forward-word",
            Command::WordBackward => "backward-word",
            Command::BufferStart => "beginning-of-buffer",
            Command::BufferEnd => "end-of-buffer",
            Command::PageDown => "scroll-up",
            Command::PageUp => "scroll-down",
            Command::InsertNewline => "newline",
            Command::DeleteChar => "delete-char",
            Command::DeleteCharBackward => "delete-backward-char",
            Command::DeleteWord => "kill-word",
            Command::DeleteWordBackward => "backward-kill-word",
            Command::KillLine => "kill-line",
            Command::SetMark => "set-mark-command",
            Command::MarkWholeBuffer => "mark-whole-buffer",
            Command::KillRegion => "kill-region",
            Command::CopyRegion => "kill-ring-save",
            Command::Yank => "yank",
            Command::Undo => "undo",
            Command::Redo => "redo",
            Command::JoinLine => "join-line",
            Command::CommentToggle => "comment-line",
            Command::RectangleKill => "kill-rectangle",
            Command::RectangleYank => "yank-rectangle",
            Command::IsearchForward => "isearch-forward",
            Command::IsearchBackward => "isearch-backward",
            Command::RegexIsearchForward => "isearch-forward-regexp",
            Command::RegexIsearchBackward => "isearch-backward-regexp",
            Command::QueryReplace => "query-replace",
            Command::RegexQueryReplace => "query-replace-regexp",
            Command::Save => "save-buffer",
            Command::Quit => "save-buffers-kill-terminal",
            Command::OpenFile => "find-file",
            Command::SwitchBuffer => "switch-to-buffer",
            Command::SplitHorizontal => "split-window-below",
            Command::SplitVertical => "split-window-right",
            Command::CloseWindow => "delete-window",
            Command::CloseOtherWindows => "delete-other-windows",
            Command::OtherWindow => "other-window",
            Command::ShellCommand => "shell-command",
            Command::ShellPipeRegion => "shell-command-on-region",
            Command::MacroStart => "kmacro-start-macro",
            Command::MacroEnd => "kmacro-end-macro",
            Command::MacroPlay => "kmacro-end-and-call-macro",
            Command::ExecuteCommand => "execute-extended-command",
            Command::Cancel => "keyboard-quit",
        }
    }

    /// All commands, for `M-x` completion.
    pub fn all() -> &'static [Command] {
        use Command::*;
        &[
            MoveLeft,
            MoveRight,
            MoveUp,
            MoveDown,
            LineStart,
            LineEnd,
            WordForward,
            WordBackward,
            BufferStart,
            BufferEnd,
            PageDown,
            PageUp,
            InsertNewline,
            DeleteChar,
            DeleteCharBackward,
            DeleteWord,
            DeleteWordBackward,
            KillLine,
            SetMark,
            MarkWholeBuffer,
            KillRegion,
            CopyRegion,
            Yank,
            Undo,
            Redo,
            JoinLine,
            CommentToggle,
            RectangleKill,
            RectangleYank,
            IsearchForward,
            IsearchBackward,
            RegexIsearchForward,
            RegexIsearchBackward,
            QueryReplace,
            RegexQueryReplace,
            Save,
            Quit,
            OpenFile,
            SwitchBuffer,
            SplitHorizontal,
            SplitVertical,
            CloseWindow,
            CloseOtherWindows,
            OtherWindow,
            ShellCommand,
            ShellPipeRegion,
            MacroStart,
            MacroEnd,
            MacroPlay,
            ExecuteCommand,
            Cancel,
        ]
    }

    /// Resolve an `M-x` name.
    pub fn by_name(name: &str) -> Option<Command> {
        Command::all().iter().copied().find(|c| c.name() == name)
    }
}

/// Result of a table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLookup {
    Command(Command),
    /// The key enters a prefix; the dispatcher reads one more key.
    Prefix(Prefix),
    /// Unbound key carrying a codepoint: self-insert.
    InsertChar(char),
    /// Unbound special key.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Cx,
    CxR,
}

#[derive(Debug)]
pub struct Keymap {
    global: HashMap<Key, Command>,
    cx: HashMap<Key, Command>,
    cx_r: HashMap<Key, Command>,
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new()
    }
}

impl Keymap {
    /// The default binding set. Every entry here is asserted by tests.
    pub fn new() -> Self {
        let mut global = HashMap::new();
        let mut cx = HashMap::new();
        let mut cx_r = HashMap::new();

        let g: &[(Key, Command)] = &[
            (Key::Ctrl(b'a'), Command::LineStart),
            (Key::Ctrl(b'e'), Command::LineEnd),
            (Key::Ctrl(b'f'), Command::MoveRight),
            (Key::Ctrl(b'b'), Command::MoveLeft),
            (Key::Ctrl(b'n'), Command::MoveDown),
            (Key::Ctrl(b'p'), Command::MoveUp),
            (Key::Alt(b'f'), Command::WordForward),
            (Key::Alt(b'b'), Command::WordBackward),
            (Key::Alt(b'<'), Command::BufferStart),
            (Key::Alt(b'>'), Command::BufferEnd),
            (Key::Ctrl(b'v'), Command::PageDown),
            (Key::Alt(b'v'), Command::PageUp),
            (Key::Ctrl(b'd'), Command::DeleteChar),
            (Key::Alt(b'd'), Command::DeleteWord),
            (Key::Ctrl(b'k'), Command::KillLine),
            // C-Space arrives as NUL, i.e. C-@.
            (Key::Ctrl(b'@'), Command::SetMark),
            (Key::Ctrl(b'w'), Command::KillRegion),
            (Key::Alt(b'w'), Command::CopyRegion),
            (Key::Ctrl(b'y'), Command::Yank),
            (Key::Ctrl(b'u'), Command::Undo),
            // C-/ reaches the decoder as US (C-_).
            (Key::Ctrl(b'_'), Command::Redo),
            (Key::Ctrl(b'g'), Command::Cancel),
            (Key::Ctrl(b's'), Command::IsearchForward),
            (Key::Ctrl(b'r'), Command::IsearchBackward),
            (Key::CtrlAlt(b's'), Command::RegexIsearchForward),
            (Key::CtrlAlt(b'r'), Command::RegexIsearchBackward),
            (Key::CtrlAlt(b'%'), Command::RegexQueryReplace),
            (Key::Alt(b'%'), Command::QueryReplace),
            (Key::Alt(b'x'), Command::ExecuteCommand),
            (Key::Alt(b'!'), Command::ShellCommand),
            (Key::Alt(b'|'), Command::ShellPipeRegion),
            (Key::Alt(b';'), Command::CommentToggle),
            (Key::Alt(b'^'), Command::JoinLine),
            (Key::Enter, Command::InsertNewline),
            (Key::Backspace, Command::DeleteCharBackward),
            (Key::Delete, Command::DeleteChar),
            (Key::AltDelete, Command::DeleteWordBackward),
            (Key::Home, Command::LineStart),
            (Key::End, Command::LineEnd),
            (Key::PageUp, Command::PageUp),
            (Key::PageDown, Command::PageDown),
            (Key::Up, Command::MoveUp),
            (Key::Down, Command::MoveDown),
            (Key::Left, Command::MoveLeft),
            (Key::Right, Command::MoveRight),
        ];
        for &(k, c) in g {
            global.insert(k, c);
        }

        let x: &[(Key, Command)] = &[
            (Key::Ctrl(b's'), Command::Save),
            (Key::Ctrl(b'c'), Command::Quit),
            (Key::Ctrl(b'f'), Command::OpenFile),
            (Key::Char(b'b'), Command::SwitchBuffer),
            (Key::Char(b'2'), Command::SplitHorizontal),
            (Key::Char(b'3'), Command::SplitVertical),
            (Key::Char(b'0'), Command::CloseWindow),
            (Key::Char(b'1'), Command::CloseOtherWindows),
            (Key::Char(b'o'), Command::OtherWindow),
            (Key::Char(b'('), Command::MacroStart),
            (Key::Char(b')'), Command::MacroEnd),
            (Key::Char(b'e'), Command::MacroPlay),
            (Key::Char(b'h'), Command::MarkWholeBuffer),
        ];
        for &(k, c) in x {
            cx.insert(k, c);
        }

        cx_r.insert(Key::Char(b'k'), Command::RectangleKill);
        cx_r.insert(Key::Char(b'y'), Command::RectangleYank);

        Self { global, cx, cx_r }
    }

    /// Top-level lookup.
    pub fn lookup(&self, key: Key) -> KeyLookup {
        if key == Key::Ctrl(b'x') {
            return KeyLookup::Prefix(Prefix::Cx);
        }
        if let Some(&cmd) = self.global.get(&key) {
            trace!(target: "keymap", key = %key, command = cmd.name(), "lookup");
            return KeyLookup::Command(cmd);
        }
        match key.insertable() {
            Some(c) => KeyLookup::InsertChar(c),
            None => KeyLookup::Ignored,
        }
    }

    /// Lookup after `C-x`.
    pub fn lookup_cx(&self, key: Key) -> KeyLookup {
        if key == Key::Char(b'r') {
            return KeyLookup::Prefix(Prefix::CxR);
        }
        match self.cx.get(&key) {
            Some(&cmd) => KeyLookup::Command(cmd),
            None => KeyLookup::Ignored,
        }
    }

    /// Lookup after `C-x r`.
    pub fn lookup_cx_r(&self, key: Key) -> KeyLookup {
        match self.cx_r.get(&key) {
            Some(&cmd) => KeyLookup::Command(cmd),
            None => KeyLookup::Ignored,
        }
    }
}

/// Render a pending key sequence for the echo area, e.g. `C-x r`.
pub fn describe_seq(seq: &KeySeq) -> String {
    seq.iter()
        .map(Key::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cmd(map: &Keymap, key: Key) -> Command {
        match map.lookup(key) {
            KeyLookup::Command(c) => c,
            other => panic!("{key} resolved to {other:?}"),
        }
    }

    fn cx(map: &Keymap, key: Key) -> Command {
        match map.lookup_cx(key) {
            KeyLookup::Command(c) => c,
            other => panic!("C-x {key} resolved to {other:?}"),
        }
    }

    #[test]
    fn default_global_bindings() {
        let m = Keymap::new();
        let expect: &[(Key, Command)] = &[
            (Key::Ctrl(b'a'), Command::LineStart),
            (Key::Ctrl(b'e'), Command::LineEnd),
            (Key::Ctrl(b'f'), Command::MoveRight),
            (Key::Ctrl(b'b'), Command::MoveLeft),
            (Key::Ctrl(b'n'), Command::MoveDown),
            (Key::Ctrl(b'p'), Command::MoveUp),
            (Key::Alt(b'f'), Command::WordForward),
            (Key::Alt(b'b'), Command::WordBackward),
            (Key::Alt(b'<'), Command::BufferStart),
            (Key::Alt(b'>'), Command::BufferEnd),
            (Key::Ctrl(b'v'), Command::PageDown),
            (Key::Alt(b'v'), Command::PageUp),
            (Key::Ctrl(b'd'), Command::DeleteChar),
            (Key::Alt(b'd'), Command::DeleteWord),
            (Key::Ctrl(b'k'), Command::KillLine),
            (Key::Ctrl(b'@'), Command::SetMark),
            (Key::Ctrl(b'w'), Command::KillRegion),
            (Key::Alt(b'w'), Command::CopyRegion),
            (Key::Ctrl(b'y'), Command::Yank),
            (Key::Ctrl(b'u'), Command::Undo),
            (Key::Ctrl(b'_'), Command::Redo),
            (Key::Ctrl(b'g'), Command::Cancel),
            (Key::Ctrl(b's'), Command::IsearchForward),
            (Key::Ctrl(b'r'), Command::IsearchBackward),
            (Key::CtrlAlt(b's'), Command::RegexIsearchForward),
            (Key::CtrlAlt(b'r'), Command::RegexIsearchBackward),
            (Key::CtrlAlt(b'%'), Command::RegexQueryReplace),
            (Key::Alt(b'%'), Command::QueryReplace),
            (Key::Alt(b'x'), Command::ExecuteCommand),
            (Key::Alt(b'!'), Command::ShellCommand),
            (Key::Alt(b'|'), Command::ShellPipeRegion),
            (Key::Alt(b';'), Command::CommentToggle),
            (Key::Alt(b'^'), Command::JoinLine),
        ];
        for &(k, c) in expect {
            assert_eq!(cmd(&m, k), c, "binding for {k}");
        }
    }

    #[test]
    fn cx_prefix_table() {
        let m = Keymap::new();
        assert_eq!(m.lookup(Key::Ctrl(b'x')), KeyLookup::Prefix(Prefix::Cx));
        let expect: &[(Key, Command)] = &[
            (Key::Ctrl(b's'), Command::Save),
            (Key::Ctrl(b'c'), Command::Quit),
            (Key::Ctrl(b'f'), Command::OpenFile),
            (Key::Char(b'b'), Command::SwitchBuffer),
            (Key::Char(b'2'), Command::SplitHorizontal),
            (Key::Char(b'3'), Command::SplitVertical),
            (Key::Char(b'0'), Command::CloseWindow),
            (Key::Char(b'1'), Command::CloseOtherWindows),
            (Key::Char(b'o'), Command::OtherWindow),
            (Key::Char(b'('), Command::MacroStart),
            (Key::Char(b')'), Command::MacroEnd),
            (Key::Char(b'e'), Command::MacroPlay),
            (Key::Char(b'h'), Command::MarkWholeBuffer),
        ];
        for &(k, c) in expect {
            assert_eq!(cx(&m, k), c, "C-x binding for {k}");
        }
    }

    #[test]
    fn cx_r_prefix_table() {
        let m = Keymap::new();
        assert_eq!(m.lookup_cx(Key::Char(b'r')), KeyLookup::Prefix(Prefix::CxR));
        assert_eq!(
            m.lookup_cx_r(Key::Char(b'k')),
            KeyLookup::Command(Command::RectangleKill)
        );
        assert_eq!(
            m.lookup_cx_r(Key::Char(b'y')),
            KeyLookup::Command(Command::RectangleYank)
        );
        assert_eq!(m.lookup_cx_r(Key::Char(b'q')), KeyLookup::Ignored);
    }

    #[test]
    fn unbound_chars_self_insert_and_specials_ignore() {
        let m = Keymap::new();
        assert_eq!(m.lookup(Key::Char(b'z')), KeyLookup::InsertChar('z'));
        assert_eq!(m.lookup(Key::Codepoint('日')), KeyLookup::InsertChar('日'));
        assert_eq!(m.lookup(Key::Tab), KeyLookup::InsertChar('\t'));
        assert_eq!(m.lookup(Key::F(7)), KeyLookup::Ignored);
        assert_eq!(m.lookup(Key::ShiftTab), KeyLookup::Ignored);
        assert_eq!(m.lookup_cx(Key::Char(b'z')), KeyLookup::Ignored);
    }

    #[test]
    fn special_key_motions() {
        let m = Keymap::new();
        assert_eq!(cmd(&m, Key::Up), Command::MoveUp);
        assert_eq!(cmd(&m, Key::Home), Command::LineStart);
        assert_eq!(cmd(&m, Key::PageDown), Command::PageDown);
        assert_eq!(cmd(&m, Key::Backspace), Command::DeleteCharBackward);
        assert_eq!(cmd(&m, Key::Delete), Command::DeleteChar);
        assert_eq!(cmd(&m, Key::AltDelete), Command::DeleteWordBackward);
        assert_eq!(cmd(&m, Key::Enter), Command::InsertNewline);
    }

    #[test]
    fn mx_names_resolve() {
        assert_eq!(Command::by_name("save-buffer"), Some(Command::Save));
        assert_eq!(Command::by_name("query-replace"), Some(Command::QueryReplace));
        assert_eq!(Command::by_name("no-such-command"), None);
        for &c in Command::all() {
            assert_eq!(Command::by_name(c.name()), Some(c));
        }
    }

    #[test]
    fn seq_description() {
        let mut seq = KeySeq::new();
        seq.push(Key::Ctrl(b'x'));
        seq.push(Key::Char(b'r'));
        assert_eq!(describe_seq(&seq), "C-x r");
    }
}
