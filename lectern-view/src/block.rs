//! Block views: lines and block widgets.

use std::mem;

use crate::{
    decoration::{Attrs, LineDecoration, combine_attrs},
    geometry::{Measure, TextSize, bounding_rect},
    surface::LiveSurface,
    view_tree::{BlockWidgetData, ViewId, ViewKind, ViewTree},
    widget::{same_type, widgets_compatible, widgets_equal},
};

impl ViewTree {
    /// Merges `source`'s inline content into `from..to` of a line. With
    /// `take_deco`, the line also adopts the source's line attributes.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn merge_line(
        &mut self,
        id: ViewId,
        from: usize,
        to: usize,
        source: Option<ViewId>,
        take_deco: bool,
        open_start: usize,
        open_end: usize,
    ) -> bool {
        let mut attrs = None;
        let mut children = Vec::new();
        if let Some(src) = source {
            let Some(ViewKind::Line(data)) = self.kind(src) else {
                return false;
            };
            attrs = data.attrs.clone();
            if self.dom(id).is_none() {
                self.transfer_dom(src, id);
            }
            children = self
                .get_mut(src)
                .map(|n| mem::take(&mut n.children))
                .unwrap_or_default();
        }
        if take_deco {
            self.set_deco(id, attrs);
        }
        self.merge_children_into(id, from, to, children, open_start, open_end);
        true
    }

    /// Hands the live element of line `from` to line `to`, remembering the
    /// attributes currently rendered on it.
    fn transfer_dom(&mut self, from: ViewId, to: ViewId) {
        let Some(node) = self.get_mut(from) else {
            return;
        };
        let Some(dom) = node.dom.take() else {
            return;
        };
        let ViewKind::Line(data) = &mut node.kind else {
            return;
        };
        let rendered = data.prev_attrs.take().unwrap_or_else(|| data.attrs.clone());
        if let Some(target) = self.get_mut(to) {
            target.dom = Some(dom);
            if let ViewKind::Line(data) = &mut target.kind {
                data.prev_attrs = Some(rendered);
            }
        }
    }

    pub(crate) fn set_deco(&mut self, id: ViewId, attrs: Option<Attrs>) {
        let Some(node) = self.get_mut(id) else {
            return;
        };
        let has_dom = node.dom.is_some();
        let ViewKind::Line(data) = &mut node.kind else {
            return;
        };
        if data.attrs == attrs {
            return;
        }
        if has_dom && data.prev_attrs.is_none() {
            data.prev_attrs = Some(data.attrs.clone());
        }
        data.attrs = attrs;
        if has_dom {
            self.mark_dirty(id, false);
        }
    }

    pub(crate) fn add_line_deco(&mut self, id: ViewId, deco: &LineDecoration) {
        if deco.attrs.is_empty() && deco.class.is_none() {
            return;
        }
        let Some(ViewKind::Line(data)) = self.get_mut(id).map(|n| &mut n.kind) else {
            return;
        };
        let attrs = data.attrs.get_or_insert_with(Attrs::new);
        combine_attrs(&deco.attrs, attrs);
        if let Some(class) = &deco.class {
            combine_attrs(&Attrs::from([("class".to_string(), class.clone())]), attrs);
        }
    }

    /// Splits a line at `at`, returning a new line holding the content after
    /// it. Zero-length views left dangling at the end of the first half are
    /// dropped.
    pub(crate) fn split_line(&mut self, id: ViewId, at: usize) -> ViewId {
        let end = self.create_line();
        self.set_break_after(end, self.break_after(id));
        if self.len(id) == 0 {
            return end;
        }
        let (mut i, off) = self.child_pos(id, at, 1);
        if off > 0 {
            if let Some(child) = self.child_at(id, i) {
                let right = self.split(child, off);
                if self.len(right) == 0 && self.is_text(right) {
                    self.destroy(right);
                } else {
                    self.join_inline_into(end, right, 0);
                }
            }
            i += 1;
        }
        for child in self.children(id).get(i..).unwrap_or_default().to_vec() {
            self.join_inline_into(end, child, 0);
        }
        while i > 0 {
            match self.child_at(id, i - 1) {
                Some(child) if self.len(child) == 0 => {
                    self.destroy(child);
                    i -= 1;
                }
                _ => break,
            }
        }
        if let Some(node) = self.get_mut(id) {
            node.children.truncate(i);
        }
        self.mark_dirty(id, false);
        self.set_len(id, at);
        end
    }

    /// Empty lines with identical attributes and break stand in for each
    /// other.
    pub(crate) fn become_line(&mut self, id: ViewId, other: ViewId) -> bool {
        match (self.kind(id), self.kind(other)) {
            (Some(ViewKind::Line(a)), Some(ViewKind::Line(b))) => {
                self.children(id).is_empty()
                    && self.children(other).is_empty()
                    && a.attrs == b.attrs
                    && self.break_after(id) == self.break_after(other)
            }
            _ => false,
        }
    }

    pub(crate) fn merge_block_widget(
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
                (Some(ViewKind::BlockWidget(a)), Some(ViewKind::BlockWidget(b))) => {
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

    pub(crate) fn split_block_widget(&mut self, id: ViewId, at: usize) -> ViewId {
        let length = self.len(id);
        let kind = match self.kind(id) {
            Some(ViewKind::BlockWidget(data)) => ViewKind::BlockWidget(BlockWidgetData {
                prev_widget: None,
                ..data.clone()
            }),
            _ => ViewKind::Line(Default::default()),
        };
        self.set_len(id, at);
        let end = self.create(kind, length.saturating_sub(at));
        self.set_break_after(end, self.break_after(id));
        end
    }

    /// Takes over a block widget of the same placement and widget type,
    /// including its length and break.
    pub(crate) fn become_block_widget(&mut self, id: ViewId, other: ViewId) -> bool {
        let widget = match (self.kind(id), self.kind(other)) {
            (Some(ViewKind::BlockWidget(a)), Some(ViewKind::BlockWidget(b)))
                if a.block_type == b.block_type
                    && same_type(a.widget.as_ref(), b.widget.as_ref()) =>
            {
                b.widget.clone()
            }
            _ => return false,
        };
        let (length, break_after) = (self.len(other), self.break_after(other));
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        let has_dom = node.dom.is_some();
        let ViewKind::BlockWidget(data) = &mut node.kind else {
            return false;
        };
        let changed = !widgets_equal(&data.widget, &widget);
        if has_dom && data.prev_widget.is_none() {
            data.prev_widget = Some(data.widget.clone());
        }
        data.widget = widget;
        node.length = length;
        node.break_after = break_after;
        if changed {
            self.mark_dirty(id, true);
        }
        true
    }

    /// Text metrics read off a short rendered line that holds nothing but
    /// text on a single row.
    pub(crate) fn line_text_size(
        &self,
        id: ViewId,
        surface: &LiveSurface,
        measure: &dyn Measure,
    ) -> Option<TextSize> {
        let length = self.len(id);
        let children = self.children(id);
        if children.is_empty() || length == 0 || length > 20 {
            return None;
        }
        let mut total = 0.0;
        for &child in children {
            if !self.is_text(child) {
                return None;
            }
            let rects = measure.client_rects(surface, self.dom(child)?);
            let [rect] = rects.as_slice() else {
                return None;
            };
            total += rect.width();
        }
        let line = bounding_rect(&measure.client_rects(surface, self.dom(id)?))?;
        Some(TextSize {
            line_height: line.height(),
            char_width: total / length as f32,
        })
    }

    /// The line view covering `pos`, or `None` when a block widget covers
    /// it.
    pub fn find_line(&self, pos: usize) -> Option<ViewId> {
        let mut off = 0;
        for &block in self.children(self.root()) {
            let end = off + self.len(block);
            if end >= pos {
                if self.is_line(block) {
                    return Some(block);
                }
                if self.len(block) > 0 {
                    return None;
                }
            }
            off = end + usize::from(self.break_after(block));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{decoration::BlockType, widget::NullWidget};

    fn line_of(tree: &mut ViewTree, parts: &[&str]) -> ViewId {
        let line = tree.create_line();
        for part in parts {
            let text = tree.create_text(part.to_string());
            tree.join_inline_into(line, text, 0);
        }
        line
    }

    fn content(tree: &ViewTree, line: ViewId) -> Vec<String> {
        tree.children(line)
            .iter()
            .filter_map(|&c| tree.get(c).and_then(|n| n.text()).map(str::to_string))
            .collect()
    }

    #[test]
    fn split_line_moves_the_tail_and_keeps_the_break() {
        let mut tree = ViewTree::new(256);
        let line = line_of(&mut tree, &["abc", "def"]);
        tree.set_break_after(line, 1);
        let end = tree.split_line(line, 4);
        assert_eq!(content(&tree, line), vec!["abc", "d"]);
        assert_eq!(content(&tree, end), vec!["ef"]);
        assert_eq!((tree.len(line), tree.len(end)), (4, 2));
        assert_eq!(tree.break_after(end), 1);
        assert!(tree.check_invariants(line).is_ok());
        assert!(tree.check_invariants(end).is_ok());
    }

    #[test]
    fn merging_a_line_adopts_its_content_and_decorations() {
        let mut tree = ViewTree::new(256);
        let line = line_of(&mut tree, &["ab"]);
        let source = line_of(&mut tree, &["cd"]);
        tree.add_line_deco(
            source,
            &LineDecoration {
                class: Some("active".into()),
                attrs: Attrs::new(),
            },
        );
        assert!(tree.merge(line, 2, 2, Some(source), true, 0, 0));
        assert_eq!(content(&tree, line), vec!["abcd"]);
        let attrs = match tree.kind(line) {
            Some(ViewKind::Line(data)) => data.attrs.clone(),
            _ => None,
        };
        assert_eq!(
            attrs.and_then(|a| a.get("class").cloned()),
            Some("active".to_string())
        );
    }

    #[test]
    fn block_widgets_refuse_other_widget_types() {
        let mut tree = ViewTree::new(256);
        let gap = tree.create(
            ViewKind::BlockWidget(BlockWidgetData {
                widget: Rc::new(crate::widget::BlockGapWidget { height: 10.0 }),
                block_type: BlockType::WidgetRange,
                prev_widget: None,
            }),
            5,
        );
        let null = tree.create(
            ViewKind::BlockWidget(BlockWidgetData {
                widget: Rc::new(NullWidget::block()),
                block_type: BlockType::WidgetRange,
                prev_widget: None,
            }),
            3,
        );
        assert!(!tree.merge(gap, 0, 5, Some(null), false, 1, 1));
        assert!(!tree.become_view(gap, null));
        assert_eq!(tree.len(gap), 5);
    }

    #[test]
    fn find_line_skips_block_widgets() {
        let mut tree = ViewTree::new(256);
        let root = tree.root();
        let first = line_of(&mut tree, &["ab"]);
        tree.set_break_after(first, 1);
        let widget = tree.create(
            ViewKind::BlockWidget(BlockWidgetData {
                widget: Rc::new(NullWidget::block()),
                block_type: BlockType::WidgetRange,
                prev_widget: None,
            }),
            2,
        );
        tree.set_break_after(widget, 1);
        let last = line_of(&mut tree, &["x"]);
        tree.replace_children(root, 0, 0, vec![first, widget, last]);
        tree.set_len(root, 7);
        assert_eq!(tree.find_line(1), Some(first));
        assert_eq!(tree.find_line(4), None);
        assert_eq!(tree.find_line(7), Some(last));
    }
}
