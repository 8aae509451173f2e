//! Display width: terminal cells occupied by a codepoint or grapheme cluster.
//!
//! Baseline widths come from `unicode-width` (east-asian Wide/Fullwidth map
//! to 2). On top of that, pictographic sequences are forced wide: modern
//! terminals render emoji in two cells even where the raw EAW data says 1,
//! and under-estimating width causes cursor drift while over-estimating only
//! costs a blank cell. Combining marks and other default-ignorables are
//! width 0.

use unicode_width::UnicodeWidthChar;

const ZWJ: char = '\u{200D}';
const VS16: char = '\u{FE0F}';
const KEYCAP: char = '\u{20E3}';

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

// Emoji blocks plus the Misc Symbols / Dingbats ranges where legacy emoji
// live.
fn is_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

/// Combining mark ranges commonly encountered in text (subset of Mn/Me).
pub fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
        || ('\u{0483}'..='\u{0489}').contains(&c)
        || ('\u{1AB0}'..='\u{1AFF}').contains(&c)
        || ('\u{1DC0}'..='\u{1DFF}').contains(&c)
        || ('\u{20D0}'..='\u{20FF}').contains(&c)
        || ('\u{FE20}'..='\u{FE2F}').contains(&c)
}

fn is_default_ignorable(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200F}' | '\u{2060}' | '\u{FEFF}')
        || ('\u{FE00}'..='\u{FE0F}').contains(&c)
}

/// Display width of a single codepoint: 0, 1 or 2.
///
/// Control characters report 0; the caller handles tabs and newlines before
/// asking for a width.
pub fn char_width(c: char) -> usize {
    if is_combining_mark(c) || is_default_ignorable(c) {
        return 0;
    }
    if is_pictographic(c) || is_regional_indicator(c) {
        return 2;
    }
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Display width of one grapheme cluster.
///
/// Precondition: `egc` is a single cluster slice; segmentation happens at
/// the caller. Sequences containing any pictographic or regional-indicator
/// signal are wide; otherwise the cluster is as wide as its base character.
pub fn egc_width(egc: &str) -> usize {
    let mut chars = egc.chars();
    let Some(first) = chars.next() else {
        return 0;
    };
    if first.is_ascii() && chars.next().is_none() {
        // ASCII fast path; controls are 0.
        return if (' '..='~').contains(&first) { 1 } else { 0 };
    }
    let mut has_emoji_signal = false;
    let mut base_width = None;
    for c in egc.chars() {
        if is_pictographic(c) || is_regional_indicator(c) || c == KEYCAP {
            has_emoji_signal = true;
        }
        if c == ZWJ || c == VS16 {
            continue;
        }
        if base_width.is_none() && !is_combining_mark(c) {
            base_width = Some(char_width(c));
        }
    }
    if has_emoji_signal {
        return 2;
    }
    base_width.unwrap_or(if egc.is_empty() { 0 } else { 1 })
}
