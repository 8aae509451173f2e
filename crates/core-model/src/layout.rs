//! Tiled window layout: a binary tree whose leaves are windows.
//!
//! Region coordinates are terminal cells (`u16`), matching the renderer.
//! Splits carry a ratio; `resize` re-lays out the whole tree from the root,
//! allocating space by ratio with a minimum region of 2 rows × 20 columns
//! per window (one text row plus the per-window status row). Multiple
//! windows may reference the same document; edits through one are visible
//! through all.

use crate::document::DocumentId;

/// Minimum columns a window may be squeezed to.
pub const MIN_WINDOW_COLS: u16 = 20;
/// Minimum rows: one text row plus the status row.
pub const MIN_WINDOW_ROWS: u16 = 2;

/// Stable window identifier, monotonic within a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// Screen rectangle in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutRegion {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// Split orientation: `Horizontal` stacks children (top/bottom),
/// `Vertical` places them side by side (left/right).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDir {
    Horizontal,
    Vertical,
}

/// A leaf of the layout tree.
#[derive(Debug, Clone)]
pub struct Window {
    pub id: WindowId,
    pub document: DocumentId,
    pub region: LayoutRegion,
}

#[derive(Debug)]
enum Node {
    Leaf(Window),
    Split {
        dir: SplitDir,
        ratio: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Owner of the window tree and the focus.
#[derive(Debug)]
pub struct WindowLayout {
    root: Node,
    current: WindowId,
    next_id: u64,
    width: u16,
    height: u16,
}

impl WindowLayout {
    /// Single full-area window showing `document`.
    pub fn new(document: DocumentId, width: u16, height: u16) -> Self {
        let id = WindowId(0);
        let mut layout = Self {
            root: Node::Leaf(Window {
                id,
                document,
                region: LayoutRegion::default(),
            }),
            current: id,
            next_id: 1,
            width,
            height,
        };
        layout.relayout();
        layout
    }

    pub fn current_id(&self) -> WindowId {
        self.current
    }

    pub fn current(&self) -> &Window {
        self.find(self.current).expect("focused window exists")
    }

    pub fn find(&self, id: WindowId) -> Option<&Window> {
        fn walk(node: &Node, id: WindowId) -> Option<&Window> {
            match node {
                Node::Leaf(w) if w.id == id => Some(w),
                Node::Leaf(_) => None,
                Node::Split { left, right, .. } => {
                    walk(left, id).or_else(|| walk(right, id))
                }
            }
        }
        walk(&self.root, id)
    }

    /// All windows in depth-first (visual) order.
    pub fn windows(&self) -> Vec<&Window> {
        fn walk<'a>(node: &'a Node, out: &mut Vec<&'a Window>) {
            match node {
                Node::Leaf(w) => out.push(w),
                Node::Split { left, right, .. } => {
                    walk(left, out);
                    walk(right, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    pub fn window_count(&self) -> usize {
        self.windows().len()
    }

    /// Rebind the focused window to another document.
    pub fn set_current_document(&mut self, document: DocumentId) {
        let current = self.current;
        if let Some(w) = Self::find_mut(&mut self.root, current) {
            w.document = document;
        }
    }

    /// Drop every window showing `document`, rebinding single survivors.
    /// Returns false if that would close all windows (caller must rebind
    /// instead).
    pub fn release_document(&mut self, document: DocumentId, replacement: DocumentId) {
        fn rebind(node: &mut Node, document: DocumentId, replacement: DocumentId) {
            match node {
                Node::Leaf(w) => {
                    if w.document == document {
                        w.document = replacement;
                    }
                }
                Node::Split { left, right, .. } => {
                    rebind(left, document, replacement);
                    rebind(right, document, replacement);
                }
            }
        }
        rebind(&mut self.root, document, replacement);
    }

    fn find_mut(node: &mut Node, id: WindowId) -> Option<&mut Window> {
        match node {
            Node::Leaf(w) if w.id == id => Some(w),
            Node::Leaf(_) => None,
            Node::Split { left, right, .. } => {
                Self::find_mut(left, id).or_else(|| Self::find_mut(right, id))
            }
        }
    }

    /// Replace the focused leaf with a split of ratio 0.5; the new window
    /// shows the same document and takes focus. Returns `None` when the
    /// focused region cannot fit two minimum-size windows.
    pub fn split(&mut self, dir: SplitDir) -> Option<WindowId> {
        let region = self.current().region;
        let fits = match dir {
            SplitDir::Horizontal => region.height >= 2 * MIN_WINDOW_ROWS,
            SplitDir::Vertical => region.width >= 2 * MIN_WINDOW_COLS,
        };
        if !fits {
            return None;
        }
        let new_id = WindowId(self.next_id);
        self.next_id += 1;
        let current = self.current;
        Self::split_leaf(&mut self.root, current, dir, new_id);
        self.current = new_id;
        self.relayout();
        Some(new_id)
    }

    pub fn split_horizontal(&mut self) -> Option<WindowId> {
        self.split(SplitDir::Horizontal)
    }

    pub fn split_vertical(&mut self) -> Option<WindowId> {
        self.split(SplitDir::Vertical)
    }

    fn split_leaf(node: &mut Node, id: WindowId, dir: SplitDir, new_id: WindowId) -> bool {
        match node {
            Node::Leaf(w) if w.id == id => {
                let left = Window {
                    id: w.id,
                    document: w.document,
                    region: LayoutRegion::default(),
                };
                let right = Window {
                    id: new_id,
                    document: w.document,
                    region: LayoutRegion::default(),
                };
                *node = Node::Split {
                    dir,
                    ratio: 0.5,
                    left: Box::new(Node::Leaf(left)),
                    right: Box::new(Node::Leaf(right)),
                };
                true
            }
            Node::Leaf(_) => false,
            Node::Split { left, right, .. } => {
                Self::split_leaf(left, id, dir, new_id)
                    || Self::split_leaf(right, id, dir, new_id)
            }
        }
    }

    /// Collapse the split containing the focused leaf; the sibling takes
    /// the parent's space. Returns false when only one window remains.
    pub fn close_current(&mut self) -> bool {
        if matches!(self.root, Node::Leaf(_)) {
            return false;
        }
        let id = self.current;
        Self::remove_leaf(&mut self.root, id);
        self.current = self.first_leaf_id();
        self.relayout();
        true
    }

    /// Close every window except the focused one.
    pub fn close_others(&mut self) -> bool {
        if matches!(self.root, Node::Leaf(_)) {
            return false;
        }
        let keep = self.current().clone();
        self.root = Node::Leaf(keep);
        self.relayout();
        true
    }

    fn remove_leaf(node: &mut Node, id: WindowId) -> bool {
        if let Node::Split { left, right, .. } = node {
            let replace_with_right = matches!(&**left, Node::Leaf(w) if w.id == id);
            let replace_with_left = matches!(&**right, Node::Leaf(w) if w.id == id);
            if replace_with_right {
                let right = std::mem::replace(&mut **right, Node::Leaf(dummy_window()));
                *node = right;
                return true;
            }
            if replace_with_left {
                let left = std::mem::replace(&mut **left, Node::Leaf(dummy_window()));
                *node = left;
                return true;
            }
            return Self::remove_leaf(left, id) || Self::remove_leaf(right, id);
        }
        false
    }

    fn first_leaf_id(&self) -> WindowId {
        self.windows()[0].id
    }

    /// Focus the next window in depth-first order, wrapping.
    pub fn focus_next(&mut self) {
        let order: Vec<WindowId> = self.windows().iter().map(|w| w.id).collect();
        let idx = order.iter().position(|&id| id == self.current).unwrap_or(0);
        self.current = order[(idx + 1) % order.len()];
    }

    /// Focus the previous window in depth-first order, wrapping.
    pub fn focus_prev(&mut self) {
        let order: Vec<WindowId> = self.windows().iter().map(|w| w.id).collect();
        let idx = order.iter().position(|&id| id == self.current).unwrap_or(0);
        self.current = order[(idx + order.len() - 1) % order.len()];
    }

    /// Re-layout for a new screen size.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.relayout();
    }

    fn relayout(&mut self) {
        let region = LayoutRegion {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        };
        Self::assign(&mut self.root, region);
    }

    fn assign(node: &mut Node, region: LayoutRegion) {
        match node {
            Node::Leaf(w) => w.region = region,
            Node::Split {
                dir,
                ratio,
                left,
                right,
            } => {
                let (a, b) = match dir {
                    SplitDir::Horizontal => {
                        let top = split_len(region.height, *ratio, MIN_WINDOW_ROWS);
                        (
                            LayoutRegion {
                                height: top,
                                ..region
                            },
                            LayoutRegion {
                                y: region.y + top,
                                height: region.height - top,
                                ..region
                            },
                        )
                    }
                    SplitDir::Vertical => {
                        let leftw = split_len(region.width, *ratio, MIN_WINDOW_COLS);
                        (
                            LayoutRegion {
                                width: leftw,
                                ..region
                            },
                            LayoutRegion {
                                x: region.x + leftw,
                                width: region.width - leftw,
                                ..region
                            },
                        )
                    }
                };
                Self::assign(left, a);
                Self::assign(right, b);
            }
        }
    }
}

/// First-child length for a split of `total` at `ratio`, keeping both sides
/// at least `min` where possible.
fn split_len(total: u16, ratio: f32, min: u16) -> u16 {
    let first = (f32::from(total) * ratio).round() as u16;
    if total <= 2 * min {
        return total / 2;
    }
    first.clamp(min, total - min)
}

fn dummy_window() -> Window {
    Window {
        id: WindowId(u64::MAX),
        document: DocumentId(u64::MAX),
        region: LayoutRegion::default(),
    }
}
