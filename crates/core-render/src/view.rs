//! Per-window presentation state and row building.
//!
//! A `View` owns scroll origin, tab width, dirty tracking and the gutter,
//! and rebuilds the screen rows of its window region into the frame's back
//! grid. Rows carry a content signature (ahash over everything that can
//! change their pixels: line text, scroll, selection clip, highlight,
//! gutter number); a row is rebuilt when its signature moves, when it was
//! explicitly marked dirty, or on a full redraw. The bottom row of the
//! region is the window's status line.

use crate::cell::{CellAttrs, Grid};
use crate::column::{byte_to_column, cluster_advance};
use core_model::{Buffer, LayoutRegion};
use core_state::EditContext;
use core_text::grapheme;

pub const DEFAULT_TAB_WIDTH: usize = 4;
pub const MAX_TAB_WIDTH: usize = 16;
pub const MAX_SCROLL_MARGIN: usize = 5;

#[derive(Debug)]
pub struct View {
    region: LayoutRegion,
    pub top_line: usize,
    pub left_col: usize,
    tab_width: usize,
    pub line_numbers_on: bool,
    scroll_margin: usize,
    /// Literal text highlighted by the active search.
    pub search_highlight: Option<String>,
    error_message: Option<String>,
    dirty: Vec<usize>,
    dirty_from: Option<usize>,
    full_redraw: bool,
    row_sigs: Vec<u64>,
    status_sig: u64,
    hasher: ahash::RandomState,
}

impl View {
    pub fn new(region: LayoutRegion) -> Self {
        Self {
            region,
            top_line: 0,
            left_col: 0,
            tab_width: DEFAULT_TAB_WIDTH,
            line_numbers_on: true,
            scroll_margin: 0,
            search_highlight: None,
            error_message: None,
            dirty: Vec::new(),
            dirty_from: None,
            full_redraw: true,
            row_sigs: Vec::new(),
            status_sig: 0,
            hasher: ahash::RandomState::new(),
        }
    }

    pub fn region(&self) -> LayoutRegion {
        self.region
    }

    pub fn set_region(&mut self, region: LayoutRegion) {
        if region != self.region {
            self.region = region;
            self.full_redraw = true;
        }
    }

    /// Text rows (the bottom region row is the status line).
    pub fn text_rows(&self) -> usize {
        usize::from(self.region.height.saturating_sub(1))
    }

    pub fn tab_width(&self) -> usize {
        self.tab_width
    }

    pub fn set_tab_width(&mut self, width: usize) {
        self.tab_width = width.clamp(1, MAX_TAB_WIDTH);
        self.full_redraw = true;
    }

    pub fn scroll_margin(&self) -> usize {
        self.scroll_margin
    }

    pub fn set_scroll_margin(&mut self, margin: usize) {
        self.scroll_margin = margin.min(MAX_SCROLL_MARGIN);
    }

    pub fn gutter_width(&self, buf: &Buffer) -> usize {
        if !self.line_numbers_on {
            return 0;
        }
        let mut digits = 1;
        let mut n = buf.line_count();
        while n >= 10 {
            digits += 1;
            n /= 10;
        }
        digits + 1
    }

    /// Columns available for text after the gutter.
    pub fn text_width(&self, buf: &Buffer) -> usize {
        usize::from(self.region.width).saturating_sub(self.gutter_width(buf))
    }

    pub fn mark_line(&mut self, line: usize) {
        self.dirty.push(line);
    }

    /// Everything at and below `line` may have shifted (newline edits).
    pub fn mark_from(&mut self, line: usize) {
        self.dirty_from = Some(self.dirty_from.map_or(line, |f| f.min(line)));
    }

    pub fn mark_full(&mut self) {
        self.full_redraw = true;
    }

    fn is_dirty(&self, line: usize) -> bool {
        self.dirty.contains(&line) || self.dirty_from.is_some_and(|f| line >= f)
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.error_message = Some(msg.into());
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Bring the cursor back inside the viewport. Returns true when the
    /// scroll origin moved (forcing a full rebuild of the window).
    pub fn scroll_to_cursor(&mut self, buf: &Buffer, ctx: &EditContext) -> bool {
        let rows = self.text_rows();
        if rows == 0 {
            return false;
        }
        let line = buf.find_line_by_byte(ctx.cursor).unwrap_or(0);
        let start = buf.line_start(line).unwrap_or(0);
        let text = buf.line_text(line).unwrap_or_default();
        let col = byte_to_column(&text, ctx.cursor - start, self.tab_width);

        let mut scrolled = false;
        let m = self.scroll_margin.min(rows / 2);
        if line < self.top_line + m {
            let new_top = line.saturating_sub(m);
            scrolled |= new_top != self.top_line;
            self.top_line = new_top;
        } else if line + m >= self.top_line + rows {
            let new_top = line + m + 1 - rows;
            scrolled |= new_top != self.top_line;
            self.top_line = new_top;
        }

        // Horizontal margin is 0: scroll only when off-screen.
        let text_w = self.text_width(buf).max(1);
        if col < self.left_col {
            scrolled |= self.left_col != col;
            self.left_col = col;
        } else if col >= self.left_col + text_w {
            let new_left = col + 1 - text_w;
            scrolled |= new_left != self.left_col;
            self.left_col = new_left;
        }
        if scrolled {
            self.full_redraw = true;
        }
        scrolled
    }

    /// Absolute screen position of the cursor inside this view.
    pub fn cursor_screen(&self, buf: &Buffer, ctx: &EditContext) -> (u16, u16) {
        let line = buf.find_line_by_byte(ctx.cursor).unwrap_or(0);
        let start = buf.line_start(line).unwrap_or(0);
        let text = buf.line_text(line).unwrap_or_default();
        let col = byte_to_column(&text, ctx.cursor - start, self.tab_width);
        let gutter = self.gutter_width(buf);
        let x = self.region.x
            + (gutter + col.saturating_sub(self.left_col)).min(usize::from(
                self.region.width.saturating_sub(1),
            )) as u16;
        let row = line.saturating_sub(self.top_line).min(self.text_rows().saturating_sub(1));
        (x, self.region.y + row as u16)
    }

    /// Rebuild this window's changed rows into `grid`.
    pub fn render(&mut self, buf: &Buffer, ctx: &EditContext, status: &str, grid: &mut Grid) {
        let rows = self.text_rows();
        if self.row_sigs.len() != rows {
            self.row_sigs = vec![0; rows];
            self.full_redraw = true;
        }
        let gutter = self.gutter_width(buf);
        let selection = ctx.region();
        let highlight = self.search_highlight.clone();

        for row in 0..rows {
            let line = self.top_line + row;
            let line_text = buf.line_text(line);
            let line_start = buf.line_start(line).unwrap_or(usize::MAX);
            let line_sel = clip_selection(selection, line_start, line_text.as_deref());
            let sig = self.hasher.hash_one((
                line_text.as_deref(),
                self.left_col,
                self.tab_width,
                gutter,
                line,
                line_sel,
                highlight.as_deref(),
            ));
            if !(self.full_redraw || self.is_dirty(line) || self.row_sigs[row] != sig) {
                continue;
            }
            self.row_sigs[row] = sig;
            self.build_row(
                grid,
                row as u16,
                line,
                line_text.as_deref(),
                line_sel,
                highlight.as_deref(),
                gutter,
            );
        }

        let status_sig = self.hasher.hash_one((status, self.region.width));
        if self.full_redraw || status_sig != self.status_sig {
            self.status_sig = status_sig;
            self.build_status(grid, status);
        }
        self.full_redraw = false;
        self.dirty.clear();
        self.dirty_from = None;
    }

    fn blank_region_row(&self, grid: &mut Grid, y: u16, attrs: CellAttrs) {
        for x in 0..self.region.width {
            grid.put_cluster(self.region.x + x, y, " ", 1, attrs);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_row(
        &self,
        grid: &mut Grid,
        row: u16,
        line: usize,
        line_text: Option<&str>,
        selection: Option<(usize, usize)>,
        highlight: Option<&str>,
        gutter: usize,
    ) {
        let y = self.region.y + row;
        self.blank_region_row(grid, y, CellAttrs::empty());
        let Some(text) = line_text else {
            return;
        };

        if gutter > 0 {
            let number = format!("{:>width$} ", line + 1, width = gutter - 1);
            for (i, ch) in number.chars().enumerate() {
                let mut s = [0u8; 4];
                grid.put_cluster(
                    self.region.x + i as u16,
                    y,
                    ch.encode_utf8(&mut s),
                    1,
                    CellAttrs::DIM,
                );
            }
        }

        let text_w = usize::from(self.region.width).saturating_sub(gutter);
        if text_w == 0 {
            return;
        }
        let window_end = self.left_col + text_w;
        let highlights: Vec<(usize, usize)> = highlight
            .filter(|p| !p.is_empty())
            .map(|p| {
                text.match_indices(p)
                    .map(|(i, m)| (i, i + m.len()))
                    .collect()
            })
            .unwrap_or_default();

        let mut col = 0usize;
        for (idx, g) in grapheme::iter_indices(text) {
            if col >= window_end {
                break;
            }
            let advance = cluster_advance(g, col, self.tab_width);
            let mut attrs = CellAttrs::empty();
            if selection.is_some_and(|(s, e)| idx >= s && idx < e) {
                attrs |= CellAttrs::REVERSE;
            }
            if highlights.iter().any(|&(s, e)| idx >= s && idx < e) {
                attrs |= CellAttrs::REVERSE | CellAttrs::BOLD;
            }
            let fully_visible = col >= self.left_col && col + advance <= window_end;
            if g == "\t" || !fully_visible {
                // Tabs and clipped clusters render as blank columns.
                for k in 0..advance {
                    let c = col + k;
                    if c >= self.left_col && c < window_end {
                        let x = self.region.x + (gutter + c - self.left_col) as u16;
                        grid.put_cluster(x, y, " ", 1, attrs);
                    }
                }
            } else {
                let x = self.region.x + (gutter + col - self.left_col) as u16;
                grid.put_cluster(x, y, g, advance, attrs);
            }
            col += advance;
        }
    }

    fn build_status(&self, grid: &mut Grid, status: &str) {
        let y = self.region.y + self.region.height.saturating_sub(1);
        self.blank_region_row(grid, y, CellAttrs::REVERSE);
        let mut x = usize::from(self.region.x);
        let end = usize::from(self.region.x) + usize::from(self.region.width);
        for g in grapheme::iter(status) {
            let w = core_text::egc_width(g);
            if x + w > end {
                break;
            }
            grid.put_cluster(x as u16, y, g, w, CellAttrs::REVERSE);
            x += w;
        }
    }
}

/// Selection byte range clipped to one line, in line-relative offsets.
fn clip_selection(
    selection: Option<(usize, usize)>,
    line_start: usize,
    line_text: Option<&str>,
) -> Option<(usize, usize)> {
    let (s, e) = selection?;
    let len = line_text?.len();
    let line_end = line_start + len;
    if e <= line_start || s >= line_end {
        return None;
    }
    Some((s.saturating_sub(line_start), (e - line_start).min(len)))
}
