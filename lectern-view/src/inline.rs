//! Inline views and the inline merge algorithm.
//!
//! ## Usage
//!
//! [`ViewTree::merge_children_into`] splices replacement inline content into
//! the children of a line or mark, reusing existing views wherever content
//! survives. The kind-specific `merge`, `split` and `become` operations it
//! relies on live here too; [`crate::reconcile`] dispatches to them.

use std::{mem, rc::Rc};

use crate::{
    text::{char_len, splice_chars},
    view_tree::{ViewId, ViewKind, ViewNode, ViewTree, WidgetData},
    widget::{same_type, widgets_compatible, widgets_equal},
};

impl ViewTree {
    pub(crate) fn merge_text(
        &mut self,
        id: ViewId,
        from: usize,
        to: usize,
        source: Option<ViewId>,
    ) -> bool {
        let insert = match source {
            Some(src) => match self.kind(src) {
                Some(ViewKind::Text(text)) => {
                    if self.len(id) - (to - from) + self.len(src) > self.max_text_join {
                        return false;
                    }
                    text.clone()
                }
                _ => return false,
            },
            None => String::new(),
        };
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        let ViewKind::Text(text) = &mut node.kind else {
            return false;
        };
        *text = splice_chars(text, from, to, &insert);
        node.length = char_len(text);
        self.mark_dirty(id, false);
        true
    }

    pub(crate) fn merge_mark(
        &mut self,
        id: ViewId,
        from: usize,
        to: usize,
        source: Option<ViewId>,
        open_start: usize,
        open_end: usize,
    ) -> bool {
        let insert = match source {
            Some(src) => {
                let (Some(ViewKind::Mark(mine)), Some(ViewKind::Mark(theirs))) =
                    (self.kind(id), self.kind(src))
                else {
                    return false;
                };
                if !(Rc::ptr_eq(mine, theirs) || mine.same_style(theirs))
                    || (from > 0 && open_start == 0)
                    || (to < self.len(id) && open_end == 0)
                {
                    return false;
                }
                self.get_mut(src)
                    .map(|n| mem::take(&mut n.children))
                    .unwrap_or_default()
            }
            None => Vec::new(),
        };
        self.merge_children_into(
            id,
            from,
            to,
            insert,
            open_start.saturating_sub(1),
            open_end.saturating_sub(1),
        );
        self.mark_dirty(id, false);
        true
    }

    /// Merge for widget and composition views. Only the length changes; the
    /// existing widget stays in place.
    pub(crate) fn merge_widget(
        &mut self,
        id: ViewId,
        from: usize,
        to: usize,
        source: Option<ViewId>,
        open_start: usize,
        open_end: usize,
    ) -> bool {
        let length = self.len(id);
        if let Some(src) = source {
            let compatible = match (self.kind(id), self.kind(src)) {
                (Some(ViewKind::Widget(a)), Some(ViewKind::Widget(b)))
                | (Some(ViewKind::Composition(a)), Some(ViewKind::Composition(b))) => {
                    widgets_compatible(&a.widget, &b.widget)
                }
                _ => false,
            };
            if !compatible || (from > 0 && open_start == 0) || (to < length && open_end == 0) {
                return false;
            }
        }
        let source_len = source.map_or(0, |src| self.len(src));
        self.set_len(id, from + source_len + (length - to));
        true
    }

    pub(crate) fn split_text(&mut self, id: ViewId, at: usize) -> ViewId {
        let right = match self.get_mut(id) {
            Some(ViewNode {
                kind: ViewKind::Text(text),
                length,
                ..
            }) => {
                let right = splice_chars(text, 0, at, "");
                *text = splice_chars(text, at, *length, "");
                *length = char_len(text);
                right
            }
            _ => String::new(),
        };
        self.mark_dirty(id, false);
        self.create_text(right)
    }

    pub(crate) fn split_mark(&mut self, id: ViewId, at: usize) -> ViewId {
        let mut moved = Vec::new();
        let mut detach_from = None;
        let mut off = 0;
        for (i, child) in self.children(id).to_vec().into_iter().enumerate() {
            let end = off + self.len(child);
            if end > at {
                moved.push(if off < at { self.split(child, at - off) } else { child });
            }
            if detach_from.is_none() && off >= at {
                detach_from = Some(i);
            }
            off = end;
        }
        let length = self.len(id).saturating_sub(at);
        if let Some(index) = detach_from {
            let removed = self
                .get_mut(id)
                .map(|n| n.children.split_off(index))
                .unwrap_or_default();
            for child in removed {
                if !moved.contains(&child) {
                    self.destroy(child);
                }
            }
            self.mark_dirty(id, false);
        }
        self.set_len(id, at);
        let kind = match self.kind(id) {
            Some(ViewKind::Mark(mark)) => ViewKind::Mark(mark.clone()),
            _ => ViewKind::Mark(Rc::default()),
        };
        let right = self.create(kind, length);
        self.replace_children(right, 0, 0, moved);
        right
    }

    pub(crate) fn split_widget(&mut self, id: ViewId, at: usize) -> ViewId {
        let length = self.len(id);
        let kind = match self.kind(id) {
            Some(ViewKind::Widget(data)) => ViewKind::Widget(WidgetData {
                prev_widget: None,
                ..data.clone()
            }),
            Some(ViewKind::Composition(data)) => ViewKind::Composition(WidgetData {
                prev_widget: None,
                ..data.clone()
            }),
            _ => ViewKind::WidgetBuffer { side: 0 },
        };
        self.set_len(id, at);
        self.create(kind, length.saturating_sub(at))
    }

    /// Takes over a widget view of the same type, side and length.
    pub(crate) fn become_widget(&mut self, id: ViewId, other: ViewId) -> bool {
        if self.len(id) != self.len(other) {
            return false;
        }
        let widget = match (self.kind(id), self.kind(other)) {
            (Some(ViewKind::Widget(a)), Some(ViewKind::Widget(b)))
            | (Some(ViewKind::Composition(a)), Some(ViewKind::Composition(b)))
                if a.side == b.side && same_type(a.widget.as_ref(), b.widget.as_ref()) =>
            {
                b.widget.clone()
            }
            _ => return false,
        };
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        let has_dom = node.dom.is_some();
        let (ViewKind::Widget(data) | ViewKind::Composition(data)) = &mut node.kind else {
            return false;
        };
        let changed = !widgets_equal(&data.widget, &widget);
        if has_dom && data.prev_widget.is_none() {
            data.prev_widget = Some(data.widget.clone());
        }
        data.widget = widget;
        if changed {
            self.mark_dirty(id, true);
        }
        true
    }

    /// Appends `view` to `parent`, folding it into a trailing mark of the
    /// same style when `open` allows it.
    pub(crate) fn join_inline_into(&mut self, parent: ViewId, view: ViewId, open: usize) {
        let length = self.len(view);
        let last = self.children(parent).last().copied();
        let joinable = open > 0
            && match (last.and_then(|l| self.kind(l)), self.kind(view)) {
                (Some(ViewKind::Mark(a)), Some(ViewKind::Mark(b))) => {
                    Rc::ptr_eq(a, b) || a.same_style(b)
                }
                _ => false,
            };
        match last {
            Some(last) if joinable => {
                let children = self
                    .get_mut(view)
                    .map(|n| mem::take(&mut n.children))
                    .unwrap_or_default();
                for child in children {
                    self.join_inline_into(last, child, open - 1);
                }
                self.destroy(view);
            }
            _ => {
                if let Some(node) = self.get_mut(parent) {
                    node.children.push(view);
                }
                self.set_parent(view, parent);
            }
        }
        if let Some(node) = self.get_mut(parent) {
            node.length += length;
        }
    }

    /// Replaces `from..to` of the inline children of `parent` with `elts`.
    ///
    /// `open_start` and `open_end` tell how many levels of mark structure at
    /// either edge of `elts` may be fused with the content next to them.
    pub(crate) fn merge_children_into(
        &mut self,
        parent: ViewId,
        from: usize,
        to: usize,
        mut elts: Vec<ViewId>,
        mut open_start: usize,
        mut open_end: usize,
    ) {
        let mut cursor = self.child_cursor(parent, self.len(parent));
        let (mut to_i, mut to_off) = cursor.find_pos(self, parent, to, 1);
        let (mut from_i, from_off) = cursor.find_pos(self, parent, from, -1);
        let inserted: usize = elts.iter().map(|&e| self.len(e)).sum();
        self.set_len(parent, self.len(parent) + inserted - (to - from));

        if from_i == to_i && from_off > 0 {
            let Some(start) = self.child_at(parent, from_i) else {
                return;
            };
            if elts.len() == 1
                && self.merge(start, from_off, to_off, Some(elts[0]), false, open_start, open_end)
            {
                return;
            }
            if elts.is_empty() {
                self.merge(start, from_off, to_off, None, false, open_start, open_end);
                return;
            }
            let after = self.split(start, to_off);
            match elts.last_mut() {
                Some(last) if self.merge(after, 0, 0, Some(*last), false, 0, open_end) => {
                    *last = after
                }
                _ => elts.push(after),
            }
            to_i += 1;
            open_end = 0;
            to_off = 0;
        }

        if to_off > 0 {
            if let Some(end) = self.child_at(parent, to_i) {
                match elts.last() {
                    Some(&last) if self.merge(end, 0, to_off, Some(last), false, 0, open_end) => {
                        elts.pop();
                        open_end = if elts.is_empty() { open_start } else { 0 };
                    }
                    _ => {
                        self.merge(end, 0, to_off, None, false, 0, 0);
                    }
                }
            }
        } else if let (Some(end), Some(&last)) = (self.child_at(parent, to_i), elts.last()) {
            if self.merge(end, 0, 0, Some(last), false, 0, open_end) {
                elts.pop();
                open_end = if elts.is_empty() { open_start } else { 0 };
            }
        }

        if from_off > 0 {
            if let Some(start) = self.child_at(parent, from_i) {
                let start_len = self.len(start);
                match elts.first() {
                    Some(&first)
                        if self.merge(start, from_off, start_len, Some(first), false, open_start, 0) =>
                    {
                        elts.remove(0);
                        open_start = if elts.is_empty() { open_end } else { 0 };
                    }
                    _ => {
                        self.merge(start, from_off, start_len, None, false, 0, 0);
                    }
                }
            }
            from_i += 1;
        } else if let (Some(end), Some(&first)) = (
            from_i.checked_sub(1).and_then(|i| self.child_at(parent, i)),
            elts.first(),
        ) {
            let end_len = self.len(end);
            if self.merge(end, end_len, end_len, Some(first), false, open_start, 0) {
                elts.remove(0);
                open_start = if elts.is_empty() { open_end } else { 0 };
            }
        }

        while from_i < to_i {
            let (Some(&last), Some(old)) = (elts.last(), self.child_at(parent, to_i - 1)) else {
                break;
            };
            if !self.become_view(old, last) {
                break;
            }
            elts.pop();
            to_i -= 1;
            open_end = if elts.is_empty() { open_start } else { 0 };
        }
        while from_i < to_i {
            let (Some(&first), Some(old)) = (elts.first(), self.child_at(parent, from_i)) else {
                break;
            };
            if !self.become_view(old, first) {
                break;
            }
            elts.remove(0);
            from_i += 1;
            open_start = if elts.is_empty() { open_end } else { 0 };
        }

        if elts.is_empty() && from_i > 0 {
            if let (Some(prev), Some(next)) = (
                self.child_at(parent, from_i - 1),
                self.child_at(parent, to_i),
            ) {
                if self.merge(next, 0, 0, Some(prev), false, open_start, open_end) {
                    from_i -= 1;
                }
            }
        }

        if !elts.is_empty() || from_i != to_i {
            self.replace_children(parent, from_i, to_i, elts);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::MarkDecoration;

    fn line_of(tree: &mut ViewTree, views: Vec<ViewId>) -> ViewId {
        let line = tree.create_line();
        for view in views {
            tree.join_inline_into(line, view, 0);
        }
        line
    }

    fn texts(tree: &ViewTree, parent: ViewId) -> Vec<String> {
        tree.children(parent)
            .iter()
            .map(|&c| match tree.kind(c) {
                Some(ViewKind::Text(t)) => t.clone(),
                Some(ViewKind::Mark(_)) => format!("<{}>", texts(tree, c).join("|")),
                other => format!("{other:?}"),
            })
            .collect()
    }

    fn mark(tree: &mut ViewTree, style: &Rc<MarkDecoration>, text: &str) -> ViewId {
        let inner = tree.create_text(text.to_string());
        let view = tree.create(ViewKind::Mark(style.clone()), char_len(text));
        tree.replace_children(view, 0, 0, vec![inner]);
        view
    }

    #[test]
    fn replacement_inside_a_text_run_edits_it_in_place() {
        let mut tree = ViewTree::new(256);
        let run = tree.create_text("abcdef".into());
        let line = line_of(&mut tree, vec![run]);
        let insert = tree.create_text("XY".into());
        tree.merge_children_into(line, 2, 4, vec![insert], 0, 0);
        assert_eq!(tree.children(line), &[run]);
        assert_eq!(tree.get(run).and_then(|n| n.text()), Some("abXYef"));
        assert_eq!(tree.len(line), 6);
        assert!(tree.get(insert).is_some_and(|n| n.destroyed));
    }

    #[test]
    fn text_runs_are_not_fused_past_the_join_limit() {
        let mut tree = ViewTree::new(4);
        let run = tree.create_text("abc".into());
        let line = line_of(&mut tree, vec![run]);
        let insert = tree.create_text("xyz".into());
        tree.merge_children_into(line, 3, 3, vec![insert], 0, 0);
        assert_eq!(texts(&tree, line), vec!["abc", "xyz"]);
        assert_eq!(tree.len(line), 6);
        assert!(tree.check_invariants(line).is_ok());
    }

    #[test]
    fn equal_marks_fuse_when_the_boundary_between_them_goes() {
        let mut tree = ViewTree::new(256);
        let style = Rc::new(MarkDecoration::with_class("hl"));
        let left = mark(&mut tree, &style, "ab");
        let middle = tree.create_text("-".into());
        let right = mark(&mut tree, &style, "cd");
        let line = line_of(&mut tree, vec![left, middle, right]);
        tree.merge_children_into(line, 2, 3, Vec::new(), 1, 1);
        assert_eq!(texts(&tree, line), vec!["<abcd>"]);
        assert_eq!(tree.children(line), &[right]);
        assert_eq!(tree.len(line), 4);
        assert!(tree.check_invariants(line).is_ok());
    }

    #[test]
    fn widget_buffers_are_reused_through_become_only() {
        let mut tree = ViewTree::new(256);
        let old = tree.create(ViewKind::WidgetBuffer { side: 1 }, 0);
        let fresh = tree.create(ViewKind::WidgetBuffer { side: 1 }, 0);
        assert!(!tree.merge(old, 0, 0, Some(fresh), false, 1, 1));
        assert!(tree.get(fresh).is_some_and(|n| !n.destroyed));
        assert!(tree.become_view(old, fresh));
        assert!(tree.get(fresh).is_some_and(|n| n.destroyed));
    }

    #[test]
    fn removing_a_zero_length_view_at_the_end_of_a_line() {
        let mut tree = ViewTree::new(256);
        let run = tree.create_text("aa".into());
        let buffer = tree.create(ViewKind::WidgetBuffer { side: -1 }, 0);
        let line = line_of(&mut tree, vec![run, buffer]);
        tree.merge_children_into(line, 2, 2, Vec::new(), 0, 0);
        assert_eq!(tree.children(line), &[run]);
        assert!(tree.get(buffer).is_some_and(|n| n.destroyed));
        assert_eq!(tree.len(line), 2);
    }

    #[test]
    fn splitting_a_mark_moves_the_tail_into_a_new_mark() {
        let mut tree = ViewTree::new(256);
        let style = Rc::new(MarkDecoration::default());
        let view = mark(&mut tree, &style, "abcd");
        let right = tree.split(view, 1);
        assert_eq!(texts(&tree, view), vec!["a"]);
        assert_eq!(texts(&tree, right), vec!["bcd"]);
        assert_eq!((tree.len(view), tree.len(right)), (1, 3));
    }

    #[test]
    fn joining_marks_requires_openness() {
        let mut tree = ViewTree::new(256);
        let style = Rc::new(MarkDecoration::default());
        let line = tree.create_line();
        let a = mark(&mut tree, &style, "a");
        let b = mark(&mut tree, &style, "b");
        let c = mark(&mut tree, &style, "c");
        tree.join_inline_into(line, a, 0);
        tree.join_inline_into(line, b, 1);
        tree.join_inline_into(line, c, 0);
        assert_eq!(texts(&tree, line), vec!["<a|b>", "<c>"]);
        assert_eq!(tree.len(line), 3);
    }
}
