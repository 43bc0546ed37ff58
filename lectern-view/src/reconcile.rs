//! Block-level reconciliation.
//!
//! ## Usage
//!
//! [`ViewTree::update_children`] takes the changed ranges of one update,
//! asks a [`ContentBuilder`] for the new content of each range and splices
//! it into the document's block list. Ranges are handled from the end of the
//! document towards its start, so indices before the range being processed
//! stay valid. Within a range, existing blocks are merged, split or taken
//! over before anything is replaced.

use tracing::trace;

use crate::{
    builder::ContentBuilder,
    decoration::DecorationSet,
    text::{ChangedRange, Document},
    view_tree::{ViewId, ViewKind, ViewTree},
};

impl ViewTree {
    /// Replaces `from..to` of view `id` with the content of `source`.
    ///
    /// Returns `false`, leaving the view untouched, when the two views
    /// cannot be fused. On success `source` has been absorbed and is
    /// destroyed. `has_start` tells a line that it receives the start of the
    /// source line and should take its decorations.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn merge(
        &mut self,
        id: ViewId,
        from: usize,
        to: usize,
        source: Option<ViewId>,
        has_start: bool,
        open_start: usize,
        open_end: usize,
    ) -> bool {
        let merged = match self.kind(id) {
            Some(ViewKind::Text(_)) => self.merge_text(id, from, to, source),
            Some(ViewKind::Mark(_)) => {
                self.merge_mark(id, from, to, source, open_start, open_end)
            }
            Some(ViewKind::Widget(_) | ViewKind::Composition(_)) => {
                self.merge_widget(id, from, to, source, open_start, open_end)
            }
            // Buffers are only ever reused through `become_view`.
            Some(ViewKind::WidgetBuffer { .. }) => false,
            Some(ViewKind::Line(_)) => {
                self.merge_line(id, from, to, source, has_start, open_start, open_end)
            }
            Some(ViewKind::BlockWidget(_)) => {
                self.merge_block_widget(id, from, to, source, open_start, open_end)
            }
            Some(ViewKind::Doc) | None => false,
        };
        if merged {
            if let Some(src) = source.filter(|&src| src != id) {
                self.destroy(src);
            }
        }
        merged
    }

    /// Cuts view `id` at `at`, keeping the part before it and returning a new
    /// view for the part after it.
    pub(crate) fn split(&mut self, id: ViewId, at: usize) -> ViewId {
        match self.kind(id) {
            Some(ViewKind::Text(_)) => self.split_text(id, at),
            Some(ViewKind::Mark(_)) => self.split_mark(id, at),
            Some(ViewKind::Widget(_) | ViewKind::Composition(_)) => self.split_widget(id, at),
            Some(ViewKind::WidgetBuffer { side }) => {
                let side = *side;
                self.create(ViewKind::WidgetBuffer { side }, 0)
            }
            Some(ViewKind::Line(_)) => self.split_line(id, at),
            Some(ViewKind::BlockWidget(_)) => self.split_block_widget(id, at),
            Some(ViewKind::Doc) | None => self.create_line(),
        }
    }

    /// Lets the existing view `id` stand in for the freshly built `other`.
    /// On success `other` is destroyed and `id` keeps its identity and live
    /// node.
    pub(crate) fn become_view(&mut self, id: ViewId, other: ViewId) -> bool {
        if id == other {
            return true;
        }
        let became = match self.kind(id) {
            Some(ViewKind::Widget(_) | ViewKind::Composition(_)) => self.become_widget(id, other),
            Some(ViewKind::WidgetBuffer { side }) => {
                let side = *side;
                self.is_buffer(other) && self.get_side(other) == side
            }
            Some(ViewKind::Line(_)) => self.become_line(id, other),
            Some(ViewKind::BlockWidget(_)) => self.become_block_widget(id, other),
            Some(ViewKind::Text(_) | ViewKind::Mark(_) | ViewKind::Doc) | None => false,
        };
        if became {
            self.destroy(other);
        }
        became
    }

    /// Replaces blocks from `(from_i, from_off)` to `(to_i, to_off)` of the
    /// document with `content`. Returns the index of the first block that
    /// was touched, which is below `from_i` when the content before the
    /// range was folded into the block after it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn replace_range(
        &mut self,
        mut from_i: usize,
        from_off: usize,
        mut to_i: usize,
        mut to_off: usize,
        mut content: Vec<ViewId>,
        mut break_at_start: u8,
        mut open_start: usize,
        mut open_end: usize,
    ) -> usize {
        let root = self.root();
        let (Some(before), Some(mut after)) = (self.child_at(root, from_i), self.child_at(root, to_i))
        else {
            let at = from_i.min(self.children(root).len());
            self.replace_children(root, at, at, content);
            return at;
        };
        let last = content.last().copied();
        let break_at_end = last.map_or(break_at_start, |l| self.break_after(l));

        if from_i == to_i
            && break_at_start == 0
            && break_at_end == 0
            && content.len() < 2
            && self.merge(before, from_off, to_off, last, from_off == 0, open_start, open_end)
        {
            trace!(index = from_i, "merged change into a single block");
            return from_i;
        }

        if to_off < self.len(after) {
            if from_i == to_i {
                after = self.split(after, to_off);
                to_off = 0;
            }
            match last {
                Some(l)
                    if break_at_end == 0 && self.merge(after, 0, to_off, Some(l), true, 0, open_end) =>
                {
                    if let Some(slot) = content.last_mut() {
                        *slot = after;
                    }
                }
                _ => {
                    if to_off > 0 {
                        self.merge(after, 0, to_off, None, false, 0, open_end);
                    }
                    content.push(after);
                }
            }
        } else if self.break_after(after) > 0 {
            match last {
                Some(l) => self.set_break_after(l, 1),
                None => break_at_start = 1,
            }
        }
        to_i += 1;

        self.set_break_after(before, break_at_start);
        if from_off > 0 {
            let before_len = self.len(before);
            match content.first().copied() {
                Some(first)
                    if break_at_start == 0
                        && self.merge(before, from_off, before_len, Some(first), false, open_start, 0) =>
                {
                    let brk = self.break_after(first);
                    self.set_break_after(before, brk);
                    content.remove(0);
                }
                _ => {
                    if from_off < before_len || self.ends_with_empty(before) {
                        self.merge(before, from_off, before_len, None, false, open_start, 0);
                    }
                }
            }
            from_i += 1;
        }

        while from_i < to_i && !content.is_empty() {
            let (Some(old_last), Some(old_first)) =
                (self.child_at(root, to_i - 1), self.child_at(root, from_i))
            else {
                break;
            };
            let (new_first, new_last) = (content[0], content[content.len() - 1]);
            if self.become_view(old_last, new_last) {
                to_i -= 1;
                content.pop();
                open_end = if content.is_empty() { open_start } else { 0 };
            } else if self.become_view(old_first, new_first) {
                from_i += 1;
                content.remove(0);
                open_start = if content.is_empty() { open_end } else { 0 };
            } else {
                break;
            }
        }

        if content.is_empty() && from_i > 0 {
            if let (Some(prev), Some(next)) =
                (self.child_at(root, from_i - 1), self.child_at(root, to_i))
            {
                if self.break_after(prev) == 0
                    && self.merge(next, 0, 0, Some(prev), false, open_start, open_end)
                {
                    from_i -= 1;
                }
            }
        }

        if !content.is_empty() || from_i != to_i {
            trace!(from_i, to_i, inserted = content.len(), "splicing blocks");
            self.replace_children(root, from_i, to_i, content);
        }
        from_i
    }

    /// Brings the block list in line with the new document for every range
    /// in `changes`, which must be sorted and must not touch each other.
    #[tracing::instrument(level = "debug", skip_all, fields(ranges = changes.len()))]
    pub(crate) fn update_children(
        &mut self,
        changes: &[ChangedRange],
        old_length: usize,
        doc: &Document,
        decorations: &[DecorationSet],
        builder: &mut dyn ContentBuilder,
    ) {
        let root = self.root();
        let mut cursor = self.child_cursor(root, old_length);
        for range in changes.iter().rev() {
            let built = builder.build(self, doc, range.from_b, range.to_b, decorations);
            let (to_i, to_off) = cursor.find_pos(self, root, range.to_a, 1);
            let (from_i, from_off) = cursor.find_pos(self, root, range.from_a, -1);
            let folded_span = match from_i.checked_sub(1).and_then(|i| self.child_at(root, i)) {
                Some(prev) if from_off == 0 => self.len(prev) + usize::from(self.break_after(prev)),
                _ => 0,
            };
            trace!(
                from_a = range.from_a,
                to_a = range.to_a,
                blocks = built.content.len(),
                "reconciling range"
            );
            let start = self.replace_range(
                from_i,
                from_off,
                to_i,
                to_off,
                built.content,
                built.break_at_start,
                built.open_start,
                built.open_end,
            );
            if start < from_i {
                cursor.i = start;
                cursor.pos = cursor.pos.saturating_sub(folded_span);
            }
        }
        self.set_len(root, doc.len());
    }
}
