//! Mapping between document positions, live boundary points and screen
//! coordinates.

use indextree::NodeId;

use super::{ViewId, ViewKind, ViewTree};
use crate::{
    decoration::BlockType,
    error::{Result, ViewError},
    geometry::{Measure, Rect, flatten_rect},
    surface::{LivePos, LiveSurface},
    widget::CompositionWidget,
};

fn composition_text(kind: &ViewKind) -> Option<NodeId> {
    match kind {
        ViewKind::Composition(data) => data
            .widget
            .downcast_ref::<CompositionWidget>()
            .map(|w| w.text),
        _ => None,
    }
}

fn text_coords(
    surface: &LiveSurface,
    measure: &dyn Measure,
    text: NodeId,
    pos: usize,
    side: i32,
) -> Option<Rect> {
    let len = surface.max_offset(text);
    let pos = pos.min(len);
    let (mut from, mut to) = (pos, pos);
    let mut flatten = 0;
    if (pos == 0 && side < 0) || (pos == len && side >= 0) {
        if pos > 0 {
            from -= 1;
            flatten = 1;
        } else if to < len {
            to += 1;
            flatten = -1;
        }
    } else if side < 0 {
        from -= 1;
    } else if to < len {
        to += 1;
    }
    let rects = measure.text_rects(surface, text, from, to);
    let first = if flatten != 0 { flatten < 0 } else { side >= 0 };
    let rect = if first { rects.first() } else { rects.last() }?;
    Some(if flatten != 0 {
        flatten_rect(*rect, flatten < 0)
    } else {
        *rect
    })
}

impl ViewTree {
    /// The live boundary point for `pos`, relative to the start of `id`.
    pub(crate) fn dom_at_pos(&self, id: ViewId, pos: usize, surface: &LiveSurface) -> Option<LivePos> {
        let node = self.get(id)?;
        let len = node.length;
        match &node.kind {
            ViewKind::Doc => self.doc_dom_at_pos(id, pos, surface),
            ViewKind::Line(_) | ViewKind::Mark(_) => self.inline_dom_at_pos(id, pos, surface),
            ViewKind::Text(_) => Some(LivePos::new(node.dom?, pos.min(len))),
            ViewKind::Widget(data) => {
                let dom = node.dom?;
                let before = if len > 0 { pos == 0 } else { data.side > 0 };
                if before {
                    LivePos::before(surface, dom, true)
                } else {
                    LivePos::after(surface, dom, pos == len)
                }
            }
            ViewKind::BlockWidget(_) => {
                let dom = node.dom?;
                if pos == 0 {
                    LivePos::before(surface, dom, true)
                } else {
                    LivePos::after(surface, dom, pos == len)
                }
            }
            ViewKind::WidgetBuffer { side } => {
                let dom = node.dom?;
                if *side > 0 {
                    LivePos::before(surface, dom, true)
                } else {
                    LivePos::after(surface, dom, true)
                }
            }
            ViewKind::Composition(_) => {
                let text = composition_text(&node.kind)?;
                Some(LivePos::new(text, pos.min(surface.max_offset(text))))
            }
        }
    }

    fn inline_dom_at_pos(&self, id: ViewId, pos: usize, surface: &LiveSurface) -> Option<LivePos> {
        let dom = self.dom(id)?;
        let children = self.children(id);
        let has_dom = |child: ViewId| {
            self.dom(child)
                .is_some_and(|d| surface.parent(d) == Some(dom))
        };
        let mut i = 0;
        let mut off = 0;
        while i < children.len() {
            let child = children[i];
            let end = off + self.len(child);
            if end == off && self.get_side(child) <= 0 {
                i += 1;
                continue;
            }
            if pos > off && pos < end && has_dom(child) {
                return self.dom_at_pos(child, pos - off, surface);
            }
            if pos <= off {
                break;
            }
            off = end;
            i += 1;
        }
        if let Some(&prev) = children[..i].iter().rev().find(|&&c| has_dom(c)) {
            return self.dom_at_pos(prev, self.len(prev), surface);
        }
        if let Some(&next) = children[i..].iter().find(|&&c| has_dom(c)) {
            return self.dom_at_pos(next, 0, surface);
        }
        Some(LivePos::new(dom, 0))
    }

    fn doc_dom_at_pos(&self, id: ViewId, pos: usize, surface: &LiveSurface) -> Option<LivePos> {
        let (mut i, mut off) = self.child_pos(id, pos, -1);
        let children = self.children(id);
        while i + 1 < children.len() {
            let child = children[i];
            if off < self.len(child) || self.is_line(child) {
                break;
            }
            i += 1;
            off = 0;
        }
        let child = *children.get(i)?;
        self.dom_at_pos(child, off, surface)
    }

    /// Document-relative offset inside `id` of the live point
    /// `(node, offset)`, which must lie within the view's live subtree.
    pub(crate) fn local_pos_from_dom(
        &self,
        id: ViewId,
        node: NodeId,
        offset: usize,
        surface: &LiveSurface,
    ) -> usize {
        let Some(view) = self.get(id) else {
            return 0;
        };
        match &view.kind {
            ViewKind::Text(_) => {
                if Some(node) == view.dom {
                    offset.min(view.length)
                } else if offset > 0 {
                    view.length
                } else {
                    0
                }
            }
            ViewKind::Composition(_) => {
                if offset == 0 {
                    0
                } else if surface.is_text(node) {
                    offset.min(view.length)
                } else {
                    view.length
                }
            }
            ViewKind::WidgetBuffer { .. } => 0,
            _ => self.container_pos_from_dom(id, node, offset, surface),
        }
    }

    fn container_pos_from_dom(
        &self,
        id: ViewId,
        node: NodeId,
        offset: usize,
        surface: &LiveSurface,
    ) -> usize {
        let Some(dom) = self.dom(id) else {
            return 0;
        };
        let after = if node == dom {
            surface.child_at(dom, offset)
        } else {
            let mut node = node;
            let mut bias = if surface.max_offset(node) == 0 {
                0
            } else if offset == 0 {
                -1
            } else {
                1
            };
            loop {
                let Some(parent) = surface.parent(node) else {
                    return 0;
                };
                if parent == dom {
                    break;
                }
                if bias == 0 && surface.first_child(parent) != surface.last_child(parent) {
                    bias = if surface.first_child(parent) == Some(node) { -1 } else { 1 };
                }
                node = parent;
            }
            if bias < 0 {
                Some(node)
            } else {
                surface.next_sibling(node)
            }
        };
        if after == surface.first_child(dom) {
            return 0;
        }
        let mut after = after;
        while let Some(node) = after {
            if self.live_view(surface, node).is_some() {
                break;
            }
            after = surface.next_sibling(node);
        }
        let Some(after) = after else {
            return self.len(id);
        };
        let mut pos = 0;
        for &child in self.children(id) {
            if self.dom(child) == Some(after) {
                return pos;
            }
            pos += self.len(child) + usize::from(self.break_after(child));
        }
        self.len(id)
    }

    /// The closest attached view rendering `node` or one of its ancestors.
    pub fn nearest(&self, surface: &LiveSurface, node: NodeId) -> Option<ViewId> {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if let Some(view) = surface.view_of(n) {
                if self.is_attached(view) {
                    return Some(view);
                }
            }
            cur = surface.parent(n);
        }
        None
    }

    /// Document position of the live point `(node, offset)`.
    pub fn pos_from_dom(&self, surface: &LiveSurface, node: NodeId, offset: usize) -> Result<usize> {
        let view = self
            .nearest(surface, node)
            .ok_or(ViewError::PositionOutsideView)?;
        Ok(self.local_pos_from_dom(view, node, offset, surface) + self.pos_at_start(view))
    }

    /// Screen rectangle of `pos` relative to the start of `id`. `side`
    /// picks the character before (negative) or after (positive) the
    /// position.
    pub(crate) fn coords_at(
        &self,
        id: ViewId,
        pos: usize,
        side: i32,
        surface: &LiveSurface,
        measure: &dyn Measure,
    ) -> Option<Rect> {
        let node = self.get(id)?;
        match &node.kind {
            ViewKind::Text(_) => text_coords(surface, measure, node.dom?, pos, side),
            ViewKind::Composition(_) => {
                text_coords(surface, measure, composition_text(&node.kind)?, pos, side)
            }
            ViewKind::Widget(_) | ViewKind::BlockWidget(_) => {
                let rects = measure.client_rects(surface, node.dom?);
                let rect = if pos > 0 { rects.last() } else { rects.first() }?;
                if (pos == 0 && side > 0) || (pos == node.length && side <= 0) {
                    Some(*rect)
                } else {
                    Some(flatten_rect(*rect, pos == 0))
                }
            }
            ViewKind::WidgetBuffer { .. } => measure.client_rects(surface, node.dom?).first().copied(),
            ViewKind::Line(_) | ViewKind::Mark(_) => {
                self.coords_in_children(id, pos, side, surface, measure)
            }
            ViewKind::Doc => self.doc_coords_at(id, pos, side, surface, measure),
        }
    }

    fn scan_coords(
        &self,
        id: ViewId,
        pos: usize,
        side: i32,
        before: &mut Option<(ViewId, usize)>,
        after: &mut Option<(ViewId, usize)>,
    ) {
        let mut off = 0;
        for &child in self.children(id) {
            if off > pos {
                break;
            }
            let end = off + self.len(child);
            if end >= pos {
                if !self.children(child).is_empty() {
                    self.scan_coords(child, pos - off, side, before, after);
                } else if (after.is_none() || (after.is_some_and(|(v, _)| self.is_buffer(v)) && side > 0))
                    && (end > pos || (off == end && self.get_side(child) > 0))
                {
                    *after = Some((child, pos - off));
                } else if off < pos || (off == end && self.get_side(child) < 0) {
                    *before = Some((child, pos - off));
                }
            }
            off = end;
        }
    }

    fn coords_in_children(
        &self,
        id: ViewId,
        pos: usize,
        side: i32,
        surface: &LiveSurface,
        measure: &dyn Measure,
    ) -> Option<Rect> {
        let (mut before, mut after) = (None, None);
        self.scan_coords(id, pos, side, &mut before, &mut after);
        let target = if side < 0 {
            before.or(after)
        } else {
            after.or(before)
        };
        if let Some((view, off)) = target {
            return self.coords_at(view, off, side, surface, measure);
        }
        let dom = self.dom(id)?;
        match surface.last_child(dom) {
            Some(last) => measure.client_rects(surface, last).last().copied(),
            None => measure.client_rects(surface, dom).first().copied(),
        }
    }

    fn doc_coords_at(
        &self,
        id: ViewId,
        pos: usize,
        side: i32,
        surface: &LiveSurface,
        measure: &dyn Measure,
    ) -> Option<Rect> {
        let children = self.children(id);
        let mut off = self.len(id);
        for i in (0..children.len()).rev() {
            let child = children[i];
            let start = off
                .saturating_sub(usize::from(self.break_after(child)))
                .saturating_sub(self.len(child));
            let block_type = self.block_type(child);
            let prev = i.checked_sub(1).map(|p| children[p]);
            let prev_break = prev.is_some_and(|p| self.break_after(p) > 0);
            let prev_before = prev
                .is_some_and(|p| self.block_type(p) == Some(BlockType::WidgetBefore));
            let inline_boundary = !matches!(
                block_type,
                Some(BlockType::WidgetBefore | BlockType::WidgetAfter)
            ) && (i == 0 || side == 2 || prev_break || (prev_before && side > -2));
            if pos > start || (pos == start && inline_boundary) {
                return self.coords_at(child, pos - start, side, surface, measure);
            }
            off = start;
        }
        let first = *children.first()?;
        self.coords_at(first, 0, side, surface, measure)
    }
}
