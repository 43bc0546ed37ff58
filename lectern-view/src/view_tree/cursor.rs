//! Backward position search over a child list.

use super::{ViewId, ViewTree};

/// Walks a child list from its end towards its start.
///
/// The cursor remembers where the previous search stopped, so a series of
/// searches for decreasing positions costs a single pass over the list.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChildCursor {
    /// Index of the child the cursor points at.
    pub i: usize,
    /// Start position of that child.
    pub pos: usize,
    /// Offset of the last found position inside the child.
    pub off: usize,
}

impl ChildCursor {
    /// Starts on the last child. Used for the document, whose last line
    /// already owns the end position.
    pub fn new(tree: &ViewTree, parent: ViewId, length: usize) -> Self {
        let children = tree.children(parent);
        let mut i = children.len();
        let mut pos = length;
        if i > 0 {
            i -= 1;
            pos = pos.saturating_sub(tree.len(children[i]));
        }
        Self { i, pos, off: 0 }
    }

    /// Starts past the last child, so a forward-biased search for the end
    /// position lands after any zero-length views sitting there.
    pub fn past_end(tree: &ViewTree, parent: ViewId, length: usize) -> Self {
        Self {
            i: tree.children(parent).len(),
            pos: length,
            off: 0,
        }
    }

    /// Moves back to the child holding `pos` and returns its index together
    /// with the offset of `pos` inside it. With a positive `bias`, a position
    /// on a boundary resolves to the child after it; otherwise it resolves to
    /// the child before it, unless a line break separates the two.
    pub fn find_pos(&mut self, tree: &ViewTree, parent: ViewId, pos: usize, bias: i32) -> (usize, usize) {
        let children = tree.children(parent);
        loop {
            let at_boundary = pos == self.pos
                && (bias > 0
                    || self.i == 0
                    || tree.break_after(children[self.i - 1]) > 0);
            if pos > self.pos || at_boundary {
                self.off = pos - self.pos;
                return (self.i, self.off);
            }
            if self.i == 0 {
                self.off = 0;
                return (0, 0);
            }
            self.i -= 1;
            let next = children[self.i];
            self.pos = self
                .pos
                .saturating_sub(tree.len(next) + usize::from(tree.break_after(next)));
        }
    }
}
