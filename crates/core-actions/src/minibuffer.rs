//! Single-line editable field with its own cursor and prompt.
//!
//! Content is UTF-8, the cursor a byte index on a grapheme boundary. Word
//! motion uses the same character classes as buffer motion. History
//! navigation is driven by the dispatcher against the shared store.

use core_render::byte_to_column;
use core_text::class::{word_backward_str, word_forward_str};
use core_text::grapheme;

/// Prompts longer than this are truncated on a char boundary.
pub const PROMPT_MAX: usize = 256;

#[derive(Debug, Default)]
pub struct MiniBuffer {
    prompt: String,
    content: String,
    cursor: usize,
}

impl MiniBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, prompt: &str) {
        self.set_prompt(prompt);
        self.clear();
    }

    pub fn set_prompt(&mut self, prompt: &str) {
        let mut p = prompt.to_string();
        if p.len() > PROMPT_MAX {
            let mut cut = PROMPT_MAX;
            while !p.is_char_boundary(cut) {
                cut -= 1;
            }
            p.truncate(cut);
        }
        self.prompt = p;
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn insert_codepoint(&mut self, c: char) {
        self.content.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn insert_bytes(&mut self, s: &str) {
        self.content.insert_str(self.cursor, s);
        self.cursor += s.len();
    }

    /// Delete the grapheme before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = grapheme::boundary_before(&self.content, self.cursor);
        self.content.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    /// Delete the grapheme under the cursor.
    pub fn delete(&mut self) {
        if self.cursor >= self.content.len() {
            return;
        }
        let end = grapheme::boundary_after(&self.content, self.cursor);
        self.content.replace_range(self.cursor..end, "");
    }

    pub fn move_left(&mut self) {
        self.cursor = grapheme::boundary_before(&self.content, self.cursor);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.content.len() {
            self.cursor = grapheme::boundary_after(&self.content, self.cursor);
        }
    }

    pub fn move_start(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.content.len();
    }

    pub fn move_word_forward(&mut self) {
        self.cursor = word_forward_str(&self.content, self.cursor);
    }

    pub fn move_word_backward(&mut self) {
        self.cursor = word_backward_str(&self.content, self.cursor);
    }

    pub fn delete_word_forward(&mut self) {
        let end = word_forward_str(&self.content, self.cursor);
        self.content.replace_range(self.cursor..end, "");
    }

    pub fn delete_word_backward(&mut self) {
        let start = word_backward_str(&self.content, self.cursor);
        self.content.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    /// Delete from the cursor to the end of the line.
    pub fn kill_line(&mut self) {
        self.content.truncate(self.cursor);
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    pub fn set_content(&mut self, s: &str) {
        self.content = s.to_string();
        self.cursor = self.content.len();
    }

    /// Screen column of the cursor: prompt width plus the content column.
    pub fn display_cursor_column(&self, tab_width: usize) -> usize {
        let prompt_width: usize = grapheme::iter(&self.prompt)
            .map(core_text::egc_width)
            .sum();
        prompt_width + byte_to_column(&self.content, self.cursor, tab_width)
    }
}
