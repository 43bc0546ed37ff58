//! Writing dirty views to the live surface.

use indextree::NodeId;
use tracing::debug;

use super::{Dirty, ViewId, ViewKind, ViewTree};
use crate::{
    decoration::{Attrs, MarkDecoration},
    surface::LiveSurface,
};

/// A live node watched during sync. `written` is set when the sync pass
/// touched that node's content or its child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Track {
    pub node: NodeId,
    pub written: bool,
}

impl Track {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            written: false,
        }
    }

    fn touch(track: &mut Option<Track>, node: NodeId) {
        if let Some(track) = track {
            if track.node == node {
                track.written = true;
            }
        }
    }
}

/// Brings the attributes of `dom` from `prev` to `attrs`.
fn update_attrs(surface: &mut LiveSurface, dom: NodeId, prev: Option<&Attrs>, attrs: Option<&Attrs>) {
    if let Some(prev) = prev {
        for name in prev.keys() {
            if !attrs.is_some_and(|a| a.contains_key(name)) {
                surface.remove_attr(dom, name);
            }
        }
    }
    for (name, value) in attrs.into_iter().flatten() {
        if surface.attr(dom, name) != Some(value.as_str()) {
            surface.set_attr(dom, name, value);
        }
    }
}

fn write_mark_attrs(surface: &mut LiveSurface, dom: NodeId, mark: &MarkDecoration) {
    surface.clear_attrs(dom);
    if let Some(class) = &mark.class {
        surface.set_attr(dom, "class", class);
    }
    for (name, value) in &mark.attrs {
        surface.set_attr(dom, name, value);
    }
}

fn next_live(surface: &LiveSurface, parent: NodeId, prev: Option<NodeId>) -> Option<NodeId> {
    match prev {
        Some(prev) => surface.next_sibling(prev),
        None => surface.first_child(parent),
    }
}

impl ViewTree {
    /// The attached view `node` links back to, if any.
    pub(crate) fn live_view(&self, surface: &LiveSurface, node: NodeId) -> Option<ViewId> {
        surface
            .view_of(node)
            .filter(|&v| self.get(v).is_some_and(|n| !n.destroyed))
    }

    fn live_dom(&self, surface: &LiveSurface, id: ViewId) -> Option<NodeId> {
        self.dom(id).filter(|&d| surface.contains_node(d))
    }

    /// Makes the live subtree of `id` match the view. The root's element has
    /// to be in place before the first call.
    pub(crate) fn sync(&mut self, id: ViewId, surface: &mut LiveSurface, track: &mut Option<Track>) {
        let Some(kind) = self.kind(id) else {
            return;
        };
        match kind {
            ViewKind::Doc => {}
            ViewKind::Line(_) => self.sync_line_element(id, surface),
            ViewKind::Mark(mark) => {
                let mark = mark.clone();
                self.sync_mark_element(id, &mark, surface);
            }
            ViewKind::Text(_) => {
                self.sync_text(id, surface, track);
                return;
            }
            ViewKind::Widget(_) | ViewKind::BlockWidget(_) | ViewKind::Composition(_) => {
                self.sync_widget(id, surface);
                return;
            }
            ViewKind::WidgetBuffer { .. } => {
                self.sync_buffer(id, surface);
                return;
            }
        }
        self.sync_children(id, surface, track);
        if self.is_line(id) {
            self.ensure_line_break(id, surface);
        }
    }

    fn sync_text(&mut self, id: ViewId, surface: &mut LiveSurface, track: &mut Option<Track>) {
        let text = match self.kind(id) {
            Some(ViewKind::Text(text)) => text.clone(),
            _ => return,
        };
        // A composition view may have taken over the node.
        let owned = |dom: NodeId| {
            surface
                .view_of(dom)
                .is_none_or(|owner| owner == id || !self.is_attached(owner))
        };
        let dom = match self.live_dom(surface, id) {
            Some(dom) if surface.is_text(dom) && owned(dom) => dom,
            _ => {
                let dom = surface.create_text(&text);
                if let Some(node) = self.get_mut(id) {
                    node.dom = Some(dom);
                }
                dom
            }
        };
        surface.set_view(dom, Some(id));
        if surface.text(dom) != Some(text.as_str()) {
            Track::touch(track, dom);
            surface.set_text(dom, &text);
        }
    }

    fn sync_widget(&mut self, id: ViewId, surface: &mut LiveSurface) {
        let (widget, prev_widget) = match self.kind(id) {
            Some(ViewKind::Widget(data) | ViewKind::Composition(data)) => {
                (data.widget.clone(), data.prev_widget.clone())
            }
            Some(ViewKind::BlockWidget(data)) => (data.widget.clone(), data.prev_widget.clone()),
            _ => return,
        };
        let current = self.live_dom(surface, id);
        let updated = current.is_some_and(|dom| widget.update_dom(surface, dom));
        let dom = match current {
            Some(dom) if updated => dom,
            _ => {
                if let (Some(dom), Some(prev)) = (current, &prev_widget) {
                    prev.destroy(surface, dom);
                }
                let dom = widget.to_dom(surface);
                if !widget.editable() {
                    surface.set_attr(dom, "contenteditable", "false");
                }
                debug!(?id, ?widget, "built widget node");
                if let Some(node) = self.get_mut(id) {
                    node.dom = Some(dom);
                    match &mut node.kind {
                        ViewKind::Widget(data) | ViewKind::Composition(data) => {
                            data.prev_widget = None
                        }
                        ViewKind::BlockWidget(data) => data.prev_widget = None,
                        _ => {}
                    }
                }
                dom
            }
        };
        surface.set_view(dom, Some(id));
    }

    fn sync_buffer(&mut self, id: ViewId, surface: &mut LiveSurface) {
        let dom = match self.live_dom(surface, id) {
            Some(dom) => dom,
            None => {
                let dom = surface.create_element("img");
                surface.set_attr(dom, "class", "cm-widgetBuffer");
                surface.set_attr(dom, "aria-hidden", "true");
                surface.set_attr(dom, "contenteditable", "false");
                if let Some(node) = self.get_mut(id) {
                    node.dom = Some(dom);
                }
                dom
            }
        };
        surface.set_view(dom, Some(id));
    }

    fn sync_line_element(&mut self, id: ViewId, surface: &mut LiveSurface) {
        let current = self.live_dom(surface, id);
        let Some(node) = self.get_mut(id) else {
            return;
        };
        let rewrite = node.dirty.contains(Dirty::ATTRS);
        let ViewKind::Line(data) = &mut node.kind else {
            return;
        };
        let dom = match current {
            Some(dom) if !rewrite => dom,
            _ => {
                let dom = match current {
                    Some(dom) => {
                        surface.clear_attrs(dom);
                        dom
                    }
                    None => surface.create_element("div"),
                };
                surface.set_attr(dom, "class", "cm-line");
                data.prev_attrs = data.attrs.as_ref().map(|_| None);
                node.dom = Some(dom);
                dom
            }
        };
        if let Some(prev) = data.prev_attrs.take() {
            update_attrs(surface, dom, prev.as_ref(), data.attrs.as_ref());
            surface.add_class(dom, "cm-line");
        }
        surface.set_view(dom, Some(id));
    }

    fn sync_mark_element(&mut self, id: ViewId, mark: &MarkDecoration, surface: &mut LiveSurface) {
        let current = self.live_dom(surface, id);
        let rewrite = self.dirty(id).contains(Dirty::ATTRS);
        let dom = match current {
            Some(dom) => {
                if rewrite {
                    write_mark_attrs(surface, dom, mark);
                }
                dom
            }
            None => {
                let dom = surface.create_element(&mark.tag);
                write_mark_attrs(surface, dom, mark);
                if let Some(node) = self.get_mut(id) {
                    node.dom = Some(dom);
                }
                dom
            }
        };
        surface.set_view(dom, Some(id));
    }

    /// Whether a live node found where a new view's node should go can be
    /// adopted by that view.
    fn can_adopt(&self, surface: &LiveSurface, node: NodeId, child: ViewId) -> bool {
        match surface.view_of(node).and_then(|v| self.get(v)) {
            None => true,
            Some(owner) => {
                owner.parent.is_none()
                    && self
                        .kind(child)
                        .is_some_and(|kind| kind.same_variant(&owner.kind))
            }
        }
    }

    fn reuse_dom(&mut self, child: ViewId, dom: NodeId, surface: &LiveSurface) {
        let Some(node) = self.get_mut(child) else {
            return;
        };
        match &node.kind {
            ViewKind::Text(_) if surface.is_text(dom) => node.dom = Some(dom),
            ViewKind::Mark(mark) if surface.tag(dom) == Some(mark.tag.as_str()) => {
                node.dom = Some(dom);
                node.dirty |= Dirty::ATTRS | Dirty::NODE;
            }
            ViewKind::Line(_) if surface.tag(dom) == Some("div") => {
                node.dom = Some(dom);
                node.dirty |= Dirty::ATTRS | Dirty::NODE;
            }
            _ => {}
        }
    }

    fn sync_children(&mut self, id: ViewId, surface: &mut LiveSurface, track: &mut Option<Track>) {
        let Some(parent_dom) = self.dom(id) else {
            return;
        };
        let dirty = self.dirty(id);
        let children = self.children(id).to_vec();
        if dirty.contains(Dirty::NODE) {
            let mut prev: Option<NodeId> = None;
            for child in children {
                if !self.dirty(child).is_empty() {
                    if self.live_dom(surface, child).is_none() {
                        if let Some(next) = next_live(surface, parent_dom, prev) {
                            if self.can_adopt(surface, next, child) {
                                self.reuse_dom(child, next, surface);
                            }
                        }
                    }
                    self.sync(child, surface, track);
                    self.clear_dirty(child);
                }
                let Some(child_dom) = self.dom(child) else {
                    continue;
                };
                let next = next_live(surface, parent_dom, prev);
                if next != Some(child_dom) {
                    Track::touch(track, parent_dom);
                }
                if surface.parent(child_dom) == Some(parent_dom) {
                    let mut cur = next;
                    while let Some(node) = cur {
                        if node == child_dom {
                            break;
                        }
                        cur = surface.remove(node);
                    }
                    if cur.is_none() {
                        surface.insert_before(parent_dom, child_dom, None);
                    }
                } else {
                    surface.insert_before(parent_dom, child_dom, next);
                }
                prev = Some(child_dom);
            }
            let mut next = next_live(surface, parent_dom, prev);
            if next.is_some() {
                Track::touch(track, parent_dom);
            }
            while let Some(node) = next {
                next = surface.remove(node);
            }
        } else if dirty.contains(Dirty::CHILD) {
            for child in children {
                if !self.dirty(child).is_empty() {
                    self.sync(child, surface, track);
                    self.clear_dirty(child);
                }
            }
        }
    }

    /// Gives an empty line, or one ending in a non-editable view, a
    /// placeholder break so the host can place a caret in it.
    fn ensure_line_break(&self, id: ViewId, surface: &mut LiveSurface) {
        let Some(dom) = self.dom(id) else {
            return;
        };
        let mut last = surface.last_child(dom);
        while let Some(node) = last {
            let in_mark = self
                .live_view(surface, node)
                .is_some_and(|v| self.is_mark(v));
            if !in_mark {
                break;
            }
            last = surface.last_child(node);
        }
        let needs_break = match last {
            None => true,
            Some(node) => {
                surface.tag(node) != Some("br")
                    && self
                        .live_view(surface, node)
                        .is_some_and(|v| !self.is_editable(v))
            }
        };
        if needs_break {
            let br = surface.create_element("br");
            surface.append(dom, br);
        }
    }
}
