//! Rectangles, scroll requests and the measuring contract.
//!
//! Layout is the host's concern. The view only needs rectangles for text
//! ranges and for whole nodes, which it obtains through [`Measure`].
//! [`MonospaceMeasure`] is a fixed-cell implementation over the headless
//! surface, with optional soft wrapping.

use indextree::NodeId;

use crate::surface::{LiveKind, LiveSurface};

/// An axis-aligned rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    /// A rectangle with every edge at zero.
    pub const ZERO: Self = Self {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// The smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// Collapses `rect` to a zero-width rectangle on its left or right edge.
pub fn flatten_rect(rect: Rect, left: bool) -> Rect {
    if rect.width() == 0.0 {
        return rect;
    }
    let x = if left { rect.left } else { rect.right };
    Rect {
        left: x,
        right: x,
        ..rect
    }
}

/// Insets contributed by one source of scroll margins. `None` leaves the edge
/// to other sources.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMargins {
    pub left: Option<f32>,
    pub top: Option<f32>,
    pub right: Option<f32>,
    pub bottom: Option<f32>,
}

impl ScrollMargins {
    /// Combines margins from several sources, taking the maximum per edge.
    pub fn combine(sources: &[ScrollMargins]) -> Rect {
        let mut out = Rect::ZERO;
        for m in sources {
            if let Some(left) = m.left {
                out.left = out.left.max(left);
            }
            if let Some(top) = m.top {
                out.top = out.top.max(top);
            }
            if let Some(right) = m.right {
                out.right = out.right.max(right);
            }
            if let Some(bottom) = m.bottom {
                out.bottom = out.bottom.max(bottom);
            }
        }
        out
    }
}

/// A rectangle the host should scroll into view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollRequest {
    /// Target rectangle, already padded by the combined margins.
    pub rect: Rect,
    /// Which end of the target matters most: negative for its start, positive
    /// for its end.
    pub bias: i32,
}

/// Smallest rectangle enclosing all of `rects`.
pub fn bounding_rect(rects: &[Rect]) -> Option<Rect> {
    let (first, rest) = rects.split_first()?;
    Some(rest.iter().fold(*first, |acc, rect| acc.union(rect)))
}

/// Line height and average character width of the rendered text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSize {
    pub line_height: f32,
    pub char_width: f32,
}

/// Host measurement contract.
pub trait Measure {
    /// Client rectangles covering characters `from..to` of a text node. An
    /// empty range yields a single zero-width rectangle.
    fn text_rects(&self, surface: &LiveSurface, text: NodeId, from: usize, to: usize) -> Vec<Rect>;

    /// Client rectangles of a whole node.
    fn client_rects(&self, surface: &LiveSurface, node: NodeId) -> Vec<Rect>;

    /// Default line height, used to estimate the height of unrendered gaps.
    fn line_height(&self) -> f32;

    /// Width of the content of `node`, including any part that overflows
    /// it.
    fn scroll_width(&self, surface: &LiveSurface, node: NodeId) -> f32 {
        self.client_rects(surface, node)
            .iter()
            .fold(0.0, |width, rect| width.max(rect.right))
    }
}

/// Fixed-cell layout: every character occupies one cell, lines are the block
/// children of the outermost block element, and lines soft-wrap every
/// `wrap_column` cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasure {
    pub char_width: f32,
    pub line_height: f32,
    pub wrap_column: Option<usize>,
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 16.0,
            wrap_column: None,
        }
    }
}

impl MonospaceMeasure {
    fn cells(surface: &LiveSurface, node: NodeId) -> usize {
        match surface.kind(node) {
            Some(LiveKind::Text(text)) => text.chars().count(),
            Some(LiveKind::Element(_)) => surface
                .children(node)
                .into_iter()
                .map(|child| Self::cells(surface, child))
                .sum(),
            None => 0,
        }
    }

    fn rows(&self, cells: usize) -> usize {
        match self.wrap_column {
            Some(wrap) if wrap > 0 => cells.div_ceil(wrap).max(1),
            _ => 1,
        }
    }

    /// Returns the line element containing `node` (the child of the outermost
    /// block element) or `None` when `node` is outside such a structure.
    fn line_of(surface: &LiveSurface, node: NodeId) -> Option<NodeId> {
        let mut chain = vec![node];
        let mut cur = node;
        while let Some(parent) = surface.parent(cur) {
            chain.push(parent);
            cur = parent;
        }
        let outer = chain.iter().rposition(|n| surface.is_block(*n))?;
        if outer == 0 {
            return None;
        }
        Some(chain[outer - 1])
    }

    fn line_top(&self, surface: &LiveSurface, line: NodeId) -> f32 {
        let mut top = 0.0;
        let mut cur = surface.previous_sibling(line);
        while let Some(prev) = cur {
            top += self.rows(Self::cells(surface, prev)) as f32 * self.line_height;
            cur = surface.previous_sibling(prev);
        }
        top
    }

    /// Number of cells preceding `node` inside `line`.
    fn offset_in(surface: &LiveSurface, line: NodeId, node: NodeId) -> usize {
        let mut offset = 0;
        let mut cur = node;
        while cur != line {
            let mut prev = surface.previous_sibling(cur);
            while let Some(p) = prev {
                offset += Self::cells(surface, p);
                prev = surface.previous_sibling(p);
            }
            match surface.parent(cur) {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        offset
    }

    fn cell_rect(&self, top: f32, cell: usize) -> Rect {
        let (row, col) = match self.wrap_column {
            Some(wrap) if wrap > 0 => (cell / wrap, cell % wrap),
            _ => (0, cell),
        };
        let left = col as f32 * self.char_width;
        let top = top + row as f32 * self.line_height;
        Rect::new(left, top, left + self.char_width, top + self.line_height)
    }

    fn span_rects(&self, top: f32, from: usize, to: usize) -> Vec<Rect> {
        if from == to {
            let rect = self.cell_rect(top, from);
            return vec![flatten_rect(rect, true)];
        }
        let mut rects: Vec<Rect> = Vec::new();
        for cell in from..to {
            let rect = self.cell_rect(top, cell);
            match rects.last_mut() {
                Some(last) if last.top == rect.top && last.right == rect.left => {
                    last.right = rect.right
                }
                _ => rects.push(rect),
            }
        }
        rects
    }
}

impl Measure for MonospaceMeasure {
    fn text_rects(&self, surface: &LiveSurface, text: NodeId, from: usize, to: usize) -> Vec<Rect> {
        let Some(line) = Self::line_of(surface, text) else {
            return Vec::new();
        };
        let top = self.line_top(surface, line);
        let base = Self::offset_in(surface, line, text);
        self.span_rects(top, base + from, base + to)
    }

    fn client_rects(&self, surface: &LiveSurface, node: NodeId) -> Vec<Rect> {
        let Some(line) = Self::line_of(surface, node) else {
            // A line element itself, or something outside the content.
            if surface.parent(node).is_some_and(|p| surface.is_block(p)) {
                let top = self.line_top(surface, node);
                let rows = self.rows(Self::cells(surface, node));
                let width = self.wrap_column.unwrap_or(Self::cells(surface, node)) as f32
                    * self.char_width;
                return vec![Rect::new(0.0, top, width, top + rows as f32 * self.line_height)];
            }
            return Vec::new();
        };
        let top = self.line_top(surface, line);
        let base = Self::offset_in(surface, line, node);
        self.span_rects(top, base, base + Self::cells(surface, node))
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }
}
