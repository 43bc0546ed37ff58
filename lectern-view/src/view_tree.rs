//! The view tree.
//!
//! ## Usage
//!
//! Views live in a [`SlotMap`] arena owned by [`ViewTree`]. A parent owns
//! its ordered child list; children keep a non-owning back link to their
//! parent for ancestor walks. Every view carries a [`Dirty`] mask that is
//! propagated upward when it is set, so the sync pass can skip clean
//! subtrees, and an optional link to the live node that renders it.

mod cursor;
mod dom_pos;
mod sync;

use std::{mem, rc::Rc};

use bitflags::bitflags;
use indextree::NodeId;
use slotmap::{SlotMap, new_key_type};

use crate::{
    decoration::{Attrs, BlockType, MarkDecoration},
    error::{Result, ViewError},
    text::char_len,
    widget::Widget,
};

pub(crate) use cursor::ChildCursor;
pub(crate) use sync::Track;

new_key_type! {
    /// Identifier of a view in a [`ViewTree`].
    pub struct ViewId;
}

bitflags! {
    /// What a view needs from the next sync pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Dirty: u8 {
        /// Some descendant needs syncing.
        const CHILD = 1;
        /// The view's own content or child list changed.
        const NODE = 2;
        /// The attributes of the view's element changed.
        const ATTRS = 4;
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineData {
    /// Attributes from line decorations.
    pub attrs: Option<Attrs>,
    /// Attributes currently on the live element, when they are stale.
    pub(crate) prev_attrs: Option<Option<Attrs>>,
}

#[derive(Debug, Clone)]
pub struct WidgetData {
    pub widget: Widget,
    pub side: i32,
    /// Widget that built the current live node, when it was replaced since.
    pub(crate) prev_widget: Option<Widget>,
}

#[derive(Debug, Clone)]
pub struct BlockWidgetData {
    pub widget: Widget,
    pub block_type: BlockType,
    pub(crate) prev_widget: Option<Widget>,
}

/// The closed set of view kinds.
#[derive(Debug, Clone)]
pub enum ViewKind {
    /// The document root. Its children are lines and block widgets.
    Doc,
    Line(LineData),
    BlockWidget(BlockWidgetData),
    Text(String),
    Mark(Rc<MarkDecoration>),
    Widget(WidgetData),
    /// Zero-length image that gives the host a caret stop next to a
    /// non-editable widget.
    WidgetBuffer {
        side: i32,
    },
    /// Stand-in for host-owned composition content.
    Composition(WidgetData),
}

impl ViewKind {
    fn same_variant(&self, other: &ViewKind) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

/// A node of the view tree.
#[derive(Debug, Clone)]
pub struct ViewNode {
    pub(crate) kind: ViewKind,
    pub(crate) parent: Option<ViewId>,
    pub(crate) children: Vec<ViewId>,
    pub(crate) length: usize,
    pub(crate) break_after: u8,
    pub(crate) dirty: Dirty,
    pub(crate) dom: Option<NodeId>,
    pub(crate) destroyed: bool,
}

impl ViewNode {
    fn new(kind: ViewKind, length: usize) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            length,
            break_after: 0,
            dirty: Dirty::NODE,
            dom: None,
            destroyed: false,
        }
    }

    pub fn kind(&self) -> &ViewKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    pub fn children(&self) -> &[ViewId] {
        &self.children
    }

    /// Number of document positions covered, excluding a trailing break.
    pub fn length(&self) -> usize {
        self.length
    }

    /// 1 when a line break follows this block.
    pub fn break_after(&self) -> u8 {
        self.break_after
    }

    pub fn dirty(&self) -> Dirty {
        self.dirty
    }

    /// The live node rendering this view, once synced.
    pub fn dom(&self) -> Option<NodeId> {
        self.dom
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            ViewKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(self.kind, ViewKind::Line(_))
    }

    pub(crate) fn block_type(&self) -> Option<BlockType> {
        match &self.kind {
            ViewKind::BlockWidget(data) => Some(data.block_type),
            _ => None,
        }
    }
}

/// Arena of views rooted at a document view.
pub struct ViewTree {
    nodes: SlotMap<ViewId, ViewNode>,
    root: ViewId,
    /// Widgets whose views were destroyed while rendered, with their node.
    released: Vec<(Widget, NodeId)>,
    /// Destroyed views, kept until the next sync pass finished.
    graveyard: Vec<ViewId>,
    pub(crate) max_text_join: usize,
}

impl ViewTree {
    pub(crate) fn new(max_text_join: usize) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(ViewNode::new(ViewKind::Doc, 0));
        Self {
            nodes,
            root,
            released: Vec::new(),
            graveyard: Vec::new(),
            max_text_join,
        }
    }

    pub fn root(&self) -> ViewId {
        self.root
    }

    pub fn get(&self, id: ViewId) -> Option<&ViewNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: ViewId) -> Option<&mut ViewNode> {
        self.nodes.get_mut(id)
    }

    /// Number of views in the arena, destroyed ones awaiting collection
    /// included.
    pub fn view_count(&self) -> usize {
        self.nodes.len()
    }

    /// Creates a detached, dirty view.
    pub(crate) fn create(&mut self, kind: ViewKind, length: usize) -> ViewId {
        self.nodes.insert(ViewNode::new(kind, length))
    }

    pub(crate) fn create_text(&mut self, text: String) -> ViewId {
        let length = char_len(&text);
        self.create(ViewKind::Text(text), length)
    }

    pub(crate) fn create_line(&mut self) -> ViewId {
        self.create(ViewKind::Line(LineData::default()), 0)
    }

    pub fn kind(&self, id: ViewId) -> Option<&ViewKind> {
        self.nodes.get(id).map(|n| &n.kind)
    }

    pub fn len(&self, id: ViewId) -> usize {
        self.nodes.get(id).map_or(0, |n| n.length)
    }

    pub(crate) fn set_len(&mut self, id: ViewId, length: usize) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.length = length;
        }
    }

    pub fn break_after(&self, id: ViewId) -> u8 {
        self.nodes.get(id).map_or(0, |n| n.break_after)
    }

    pub(crate) fn set_break_after(&mut self, id: ViewId, value: u8) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.break_after = value;
        }
    }

    pub fn children(&self, id: ViewId) -> &[ViewId] {
        self.nodes.get(id).map_or(&[], |n| &n.children)
    }

    pub fn child_at(&self, parent: ViewId, index: usize) -> Option<ViewId> {
        self.children(parent).get(index).copied()
    }

    /// Whether the last child of `id` is zero-length.
    pub(crate) fn ends_with_empty(&self, id: ViewId) -> bool {
        self.children(id).last().is_some_and(|&c| self.len(c) == 0)
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn dom(&self, id: ViewId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.dom)
    }

    pub fn dirty(&self, id: ViewId) -> Dirty {
        self.nodes.get(id).map_or(Dirty::empty(), |n| n.dirty)
    }

    pub(crate) fn clear_dirty(&mut self, id: ViewId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.dirty = Dirty::empty();
        }
    }

    pub(crate) fn is_text(&self, id: ViewId) -> bool {
        matches!(self.kind(id), Some(ViewKind::Text(_)))
    }

    pub(crate) fn is_mark(&self, id: ViewId) -> bool {
        matches!(self.kind(id), Some(ViewKind::Mark(_)))
    }

    pub(crate) fn is_line(&self, id: ViewId) -> bool {
        matches!(self.kind(id), Some(ViewKind::Line(_)))
    }

    pub(crate) fn is_buffer(&self, id: ViewId) -> bool {
        matches!(self.kind(id), Some(ViewKind::WidgetBuffer { .. }))
    }

    pub(crate) fn block_type(&self, id: ViewId) -> Option<BlockType> {
        self.nodes.get(id).and_then(|n| n.block_type())
    }

    /// Whether the host may place a caret inside the view's content.
    pub fn is_editable(&self, id: ViewId) -> bool {
        match self.kind(id) {
            Some(ViewKind::Widget(data)) => data.widget.editable(),
            Some(ViewKind::BlockWidget(data)) => data.widget.editable(),
            _ => true,
        }
    }

    /// The side a zero-length view sits on relative to its position.
    pub fn get_side(&self, id: ViewId) -> i32 {
        match self.kind(id) {
            Some(ViewKind::Widget(data)) => data.side,
            Some(ViewKind::WidgetBuffer { side }) => *side,
            _ => 0,
        }
    }

    /// Whether the view is reachable from the root.
    pub fn is_attached(&self, id: ViewId) -> bool {
        let mut cur = id;
        loop {
            if cur == self.root {
                return true;
            }
            match self.nodes.get(cur) {
                Some(node) if !node.destroyed => match node.parent {
                    Some(parent) => cur = parent,
                    None => return false,
                },
                _ => return false,
            }
        }
    }

    pub(crate) fn set_parent(&mut self, child: ViewId, parent: ViewId) {
        let Some(node) = self.nodes.get_mut(child) else {
            return;
        };
        if node.parent != Some(parent) {
            node.parent = Some(parent);
            if !node.dirty.is_empty() {
                self.mark_parents_dirty(child, true);
            }
        }
    }

    /// Marks the view's own content dirty. With `and_parent`, the parent's
    /// child list is marked dirty too.
    pub(crate) fn mark_dirty(&mut self, id: ViewId, and_parent: bool) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.dirty |= Dirty::NODE;
        }
        self.mark_parents_dirty(id, and_parent);
    }

    pub(crate) fn mark_parents_dirty(&mut self, id: ViewId, mut child_list: bool) {
        let mut cur = self.parent(id);
        while let Some(parent) = cur {
            let Some(node) = self.nodes.get_mut(parent) else {
                return;
            };
            if child_list {
                node.dirty |= Dirty::NODE;
            }
            if node.dirty.contains(Dirty::CHILD) {
                return;
            }
            node.dirty |= Dirty::CHILD;
            child_list = false;
            cur = node.parent;
        }
    }

    /// Replaces children `from..to` of `parent` with `insert`, destroying
    /// the replaced children that are not reinserted.
    pub(crate) fn replace_children(
        &mut self,
        parent: ViewId,
        from: usize,
        to: usize,
        insert: Vec<ViewId>,
    ) {
        self.mark_dirty(parent, false);
        let removed: Vec<ViewId> = match self.nodes.get(parent) {
            Some(node) => node.children[from.min(node.children.len())..to.min(node.children.len())]
                .to_vec(),
            None => return,
        };
        for old in removed {
            if !insert.contains(&old) && self.parent(old) == Some(parent) {
                self.destroy(old);
            }
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            let to = to.min(node.children.len());
            let from = from.min(to);
            node.children.splice(from..to, insert.iter().copied());
        }
        for child in insert {
            self.set_parent(child, parent);
        }
    }

    /// Detaches a view and every descendant it still owns. Destroyed views
    /// stay in the arena until [`ViewTree::collect_destroyed`].
    pub(crate) fn destroy(&mut self, id: ViewId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.destroyed || id == self.root {
            return;
        }
        node.destroyed = true;
        node.parent = None;
        let children = node.children.clone();
        if let Some(dom) = node.dom {
            match &node.kind {
                ViewKind::Widget(data) | ViewKind::Composition(data) => {
                    let widget = data.prev_widget.clone().unwrap_or_else(|| data.widget.clone());
                    self.released.push((widget, dom));
                }
                ViewKind::BlockWidget(data) => {
                    let widget = data.prev_widget.clone().unwrap_or_else(|| data.widget.clone());
                    self.released.push((widget, dom));
                }
                _ => {}
            }
        }
        self.graveyard.push(id);
        for child in children {
            if self.parent(child) == Some(id) {
                self.destroy(child);
            }
        }
    }

    pub(crate) fn take_released(&mut self) -> Vec<(Widget, NodeId)> {
        mem::take(&mut self.released)
    }

    /// Frees destroyed views.
    pub(crate) fn collect_destroyed(&mut self) {
        for id in mem::take(&mut self.graveyard) {
            if self.nodes.get(id).is_some_and(|n| n.destroyed) {
                self.nodes.remove(id);
            }
        }
    }

    /// Document position at which `id` starts.
    pub fn pos_at_start(&self, id: ViewId) -> usize {
        let mut pos = 0;
        let mut cur = id;
        while let Some(parent) = self.parent(cur) {
            for &child in self.children(parent) {
                if child == cur {
                    break;
                }
                pos += self.len(child) + usize::from(self.break_after(child));
            }
            cur = parent;
        }
        pos
    }

    pub fn pos_at_end(&self, id: ViewId) -> usize {
        self.pos_at_start(id) + self.len(id)
    }

    /// A cursor over the children of `parent`. The document starts on its
    /// last line; lines and marks start past their last child.
    pub(crate) fn child_cursor(&self, parent: ViewId, length: usize) -> ChildCursor {
        match self.kind(parent) {
            Some(ViewKind::Doc) => ChildCursor::new(self, parent, length),
            _ => ChildCursor::past_end(self, parent, length),
        }
    }

    /// Child index and offset inside that child for `pos`.
    pub(crate) fn child_pos(&self, parent: ViewId, pos: usize, bias: i32) -> (usize, usize) {
        self.child_cursor(parent, self.len(parent))
            .find_pos(self, parent, pos, bias)
    }

    /// Verifies the length and parent-link invariants below `id`.
    pub fn check_invariants(&self, id: ViewId) -> Result<()> {
        let Some(node) = self.nodes.get(id) else {
            return Err(ViewError::Inconsistent(format!("missing view {id:?}")));
        };
        if let ViewKind::Text(text) = &node.kind {
            if char_len(text) != node.length {
                return Err(ViewError::Inconsistent(format!(
                    "text view {id:?} has length {} for {:?}",
                    node.length, text
                )));
            }
        }
        if matches!(node.kind, ViewKind::Doc | ViewKind::Line(_) | ViewKind::Mark(_)) {
            let mut sum = 0;
            for &child in &node.children {
                if self.parent(child) != Some(id) {
                    return Err(ViewError::Inconsistent(format!(
                        "child {child:?} of {id:?} links to {:?}",
                        self.parent(child)
                    )));
                }
                sum += self.len(child) + usize::from(self.break_after(child));
                self.check_invariants(child)?;
            }
            if sum != node.length {
                return Err(ViewError::Inconsistent(format!(
                    "view {id:?} has length {} but its children sum to {sum}",
                    node.length
                )));
            }
        }
        Ok(())
    }
}
