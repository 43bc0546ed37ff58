//! Headless live surface.
//!
//! ## Usage
//!
//! The surface is the retained, host-owned tree the view renders into. It
//! plays the role a browser DOM plays for an editor: elements and text nodes
//! in an [`indextree`] arena, a native selection that the host may move on its
//! own, a focus flag, an in-progress composition flag, and a mutation log the
//! host observer reads. Mutations performed by the view itself are wrapped in
//! an [`IgnoreMutations`] guard so they never show up in that log.

use std::{
    collections::BTreeMap,
    ops::{Deref, DerefMut},
};

use indextree::{Arena, NodeId};
use tracing::warn;

use crate::view_tree::ViewId;

/// Content of a live element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes, including `class`.
    pub attrs: BTreeMap<String, String>,
}

/// Kind of a live node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveKind {
    Element(ElementData),
    Text(String),
}

/// A node of the live surface, with an optional back link to the view that
/// renders it.
#[derive(Debug, Clone)]
pub struct LiveNode {
    pub kind: LiveKind,
    view: Option<ViewId>,
}

/// A boundary point in the live tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LivePoint {
    pub node: NodeId,
    pub offset: usize,
}

/// A boundary point produced by position mapping.
///
/// `precise` is false when the mapping had to approximate, for example when a
/// logical position falls inside a widget that has no addressable interior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivePos {
    pub node: NodeId,
    pub offset: usize,
    pub precise: bool,
}

impl LivePos {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self {
            node,
            offset,
            precise: true,
        }
    }

    pub(crate) fn with_precision(node: NodeId, offset: usize, precise: bool) -> Self {
        Self {
            node,
            offset,
            precise,
        }
    }

    /// The point directly before `node` in its parent.
    pub(crate) fn before(surface: &LiveSurface, node: NodeId, precise: bool) -> Option<Self> {
        let parent = surface.parent(node)?;
        Some(Self::with_precision(parent, surface.index_in_parent(node), precise))
    }

    /// The point directly after `node` in its parent.
    pub(crate) fn after(surface: &LiveSurface, node: NodeId, precise: bool) -> Option<Self> {
        let parent = surface.parent(node)?;
        Some(Self::with_precision(
            parent,
            surface.index_in_parent(node) + 1,
            precise,
        ))
    }

    pub fn point(&self) -> LivePoint {
        LivePoint {
            node: self.node,
            offset: self.offset,
        }
    }
}

impl From<LivePos> for LivePoint {
    fn from(pos: LivePos) -> Self {
        pos.point()
    }
}

/// The host's native selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeSelection {
    pub anchor: LivePoint,
    pub focus: LivePoint,
    /// Caret bidi level hint, when the host accepted one.
    pub bidi_level: Option<u8>,
}

/// Where input focus currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FocusState {
    /// The editable content element has focus.
    Content,
    /// Some element inside the content (an input in a widget, say) has focus.
    Elsewhere,
    /// Nothing in the surface has focus.
    #[default]
    Blurred,
}

/// Direction of a line-boundary selection nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeDirection {
    Forward,
    Backward,
}

/// A change to the surface as seen by the host observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ChildList { target: NodeId },
    CharacterData { target: NodeId },
    Attributes { target: NodeId, name: String },
}

/// Counters over everything that touched the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    /// Nodes inserted into (or moved within) the tree.
    pub inserted: usize,
    /// Nodes removed from the tree.
    pub removed: usize,
    /// Text node content writes.
    pub text_writes: usize,
    /// Native selection writes.
    pub selection_writes: usize,
}

/// The retained live tree plus host state.
pub struct LiveSurface {
    arena: Arena<LiveNode>,
    root: NodeId,
    selection: Option<NativeSelection>,
    focus: FocusState,
    composing: bool,
    observing: bool,
    mutations: Vec<Mutation>,
    nudges: Vec<NudgeDirection>,
    detached: Vec<NodeId>,
    stats: SurfaceStats,
}

impl Default for LiveSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSurface {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(LiveNode {
            kind: LiveKind::Element(ElementData {
                tag: "body".to_string(),
                attrs: BTreeMap::new(),
            }),
            view: None,
        });
        Self {
            arena,
            root,
            selection: None,
            focus: FocusState::default(),
            composing: false,
            observing: true,
            mutations: Vec::new(),
            nudges: Vec::new(),
            detached: Vec::new(),
            stats: SurfaceStats::default(),
        }
    }

    /// The top element of the surface.
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&indextree::Node<LiveNode>> {
        if id.is_removed(&self.arena) {
            return None;
        }
        self.arena.get(id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut indextree::Node<LiveNode>> {
        if id.is_removed(&self.arena) {
            return None;
        }
        self.arena.get_mut(id)
    }

    fn record(&mut self, mutation: Mutation) {
        if self.observing {
            self.mutations.push(mutation);
        }
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.arena.new_node(LiveNode {
            kind: LiveKind::Element(ElementData {
                tag: tag.to_ascii_lowercase(),
                attrs: BTreeMap::new(),
            }),
            view: None,
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.arena.new_node(LiveNode {
            kind: LiveKind::Text(text.to_string()),
            view: None,
        })
    }

    pub fn kind(&self, node: NodeId) -> Option<&LiveKind> {
        self.node(node).map(|n| &n.get().kind)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(LiveKind::Text(_)))
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            Some(LiveKind::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            Some(LiveKind::Element(data)) => Some(&data.tag),
            _ => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.kind(node) {
            Some(LiveKind::Element(data)) => data.attrs.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// Block elements stop position-equivalence scans.
    pub fn is_block(&self, node: NodeId) -> bool {
        self.tag(node) == Some("div")
    }

    /// Whether `node` is an element explicitly marked non-editable.
    pub fn is_uneditable(&self, node: NodeId) -> bool {
        self.attr(node, "contenteditable") == Some("false")
    }

    pub fn is_placeholder_break(&self, node: NodeId) -> bool {
        self.tag(node) == Some("br") && self.view_of(node).is_none()
    }

    pub fn view_of(&self, node: NodeId) -> Option<ViewId> {
        self.node(node).and_then(|n| n.get().view)
    }

    pub(crate) fn set_view(&mut self, node: NodeId, view: Option<ViewId>) {
        if let Some(n) = self.node_mut(node) {
            n.get_mut().view = view;
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent())
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.first_child())
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.last_child())
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.next_sibling())
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.previous_sibling())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        if self.node(node).is_none() {
            return Vec::new();
        }
        node.children(&self.arena).collect()
    }

    pub fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        if self.node(node).is_none() {
            return None;
        }
        node.children(&self.arena).nth(index)
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        if self.node(node).is_none() {
            return 0;
        }
        node.children(&self.arena).count()
    }

    /// Index of `node` among its siblings.
    pub fn index_in_parent(&self, node: NodeId) -> usize {
        let mut index = 0;
        let mut cur = self.previous_sibling(node);
        while let Some(prev) = cur {
            index += 1;
            cur = self.previous_sibling(prev);
        }
        index
    }

    /// Number of boundary offsets inside `node`: characters for text nodes,
    /// children for elements.
    pub fn max_offset(&self, node: NodeId) -> usize {
        match self.kind(node) {
            Some(LiveKind::Text(text)) => text.chars().count(),
            Some(LiveKind::Element(_)) => self.child_count(node),
            None => 0,
        }
    }

    /// Whether `node` is `ancestor` or lies inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if self.node(node).is_none() {
            return false;
        }
        node.ancestors(&self.arena).any(|a| a == ancestor)
    }

    /// Concatenated text of all text nodes inside `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        if self.node(node).is_none() {
            return String::new();
        }
        node.descendants(&self.arena)
            .filter_map(|id| match &self.arena.get(id)?.get().kind {
                LiveKind::Text(text) => Some(text.as_str()),
                LiveKind::Element(_) => None,
            })
            .collect()
    }

    /// Inserts `child` into `parent` before `before`, or at the end when
    /// `before` is `None`. A child attached elsewhere is moved.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        if let Some(old_parent) = self.parent(child) {
            let index = self.index_in_parent(child);
            child.detach(&mut self.arena);
            self.shift_selection_after_removal(old_parent, index, child);
            self.record(Mutation::ChildList { target: old_parent });
        }
        let result = match before {
            Some(before) if self.parent(before) == Some(parent) => {
                before.checked_insert_before(child, &mut self.arena)
            }
            _ => parent.checked_append(child, &mut self.arena),
        };
        if let Err(err) = result {
            warn!("failed to insert live node: {err:?}");
            return;
        }
        let index = self.index_in_parent(child);
        self.shift_selection_after_insertion(parent, index);
        self.stats.inserted += 1;
        self.record(Mutation::ChildList { target: parent });
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Detaches `node` from its parent and returns its former next sibling.
    ///
    /// Detached nodes stay allocated until [`LiveSurface::collect_detached`]
    /// runs, so they can still be moved back into the tree.
    pub fn remove(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let next = self.next_sibling(node);
        let index = self.index_in_parent(node);
        node.detach(&mut self.arena);
        self.shift_selection_after_removal(parent, index, node);
        self.detached.push(node);
        self.stats.removed += 1;
        self.record(Mutation::ChildList { target: parent });
        next
    }

    /// Frees every node removed since the last collection that was not moved
    /// back into the tree.
    pub fn collect_detached(&mut self) {
        for node in std::mem::take(&mut self.detached) {
            if self.node(node).is_some() && self.parent(node).is_none() && node != self.root {
                node.remove_subtree(&mut self.arena);
            }
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        let Some(n) = self.node_mut(node) else {
            return;
        };
        if let LiveKind::Text(current) = &mut n.get_mut().kind {
            current.clear();
            current.push_str(text);
        } else {
            return;
        }
        let len = text.chars().count();
        if let Some(sel) = &mut self.selection {
            for point in [&mut sel.anchor, &mut sel.focus] {
                if point.node == node && point.offset > len {
                    point.offset = len;
                }
            }
        }
        self.stats.text_writes += 1;
        self.record(Mutation::CharacterData { target: node });
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(n) = self.node_mut(node) else {
            return;
        };
        if let LiveKind::Element(data) = &mut n.get_mut().kind {
            if data.attrs.get(name).map(String::as_str) == Some(value) {
                return;
            }
            data.attrs.insert(name.to_string(), value.to_string());
        }
        self.record(Mutation::Attributes {
            target: node,
            name: name.to_string(),
        });
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        let Some(n) = self.node_mut(node) else {
            return;
        };
        let removed = match &mut n.get_mut().kind {
            LiveKind::Element(data) => data.attrs.remove(name).is_some(),
            LiveKind::Text(_) => false,
        };
        if removed {
            self.record(Mutation::Attributes {
                target: node,
                name: name.to_string(),
            });
        }
    }

    pub fn clear_attrs(&mut self, node: NodeId) {
        let names: Vec<String> = match self.kind(node) {
            Some(LiveKind::Element(data)) => data.attrs.keys().cloned().collect(),
            _ => return,
        };
        for name in names {
            self.remove_attr(node, &name);
        }
    }

    /// Adds `class` to the class list of `node` unless already present.
    pub fn add_class(&mut self, node: NodeId, class: &str) {
        let current = self.attr(node, "class").unwrap_or_default();
        if current.split_whitespace().any(|c| c == class) {
            return;
        }
        let value = if current.is_empty() {
            class.to_string()
        } else {
            format!("{current} {class}")
        };
        self.set_attr(node, "class", &value);
    }

    pub fn selection(&self) -> Option<&NativeSelection> {
        self.selection.as_ref()
    }

    /// Collapses the native selection to `point`.
    pub fn collapse(&mut self, point: LivePoint) {
        let bidi_level = self.selection.and_then(|s| s.bidi_level);
        self.selection = Some(NativeSelection {
            anchor: point,
            focus: point,
            bidi_level,
        });
        self.stats.selection_writes += 1;
    }

    /// Moves the focus of the native selection, keeping its anchor.
    pub fn extend(&mut self, point: LivePoint) {
        match &mut self.selection {
            Some(sel) => sel.focus = point,
            None => {
                self.selection = Some(NativeSelection {
                    anchor: point,
                    focus: point,
                    bidi_level: None,
                })
            }
        }
        self.stats.selection_writes += 1;
    }

    /// Replaces the native selection with a forward range.
    pub fn set_range(&mut self, start: LivePoint, end: LivePoint) {
        self.selection = Some(NativeSelection {
            anchor: start,
            focus: end,
            bidi_level: None,
        });
        self.stats.selection_writes += 1;
    }

    pub fn set_bidi_level(&mut self, level: u8) {
        if let Some(sel) = &mut self.selection {
            sel.bidi_level = Some(level);
        }
    }

    /// Requests a line-boundary move of the native selection. The headless
    /// surface has no layout of its own, so the request is only logged.
    pub fn modify_line_boundary(&mut self, direction: NudgeDirection) {
        self.nudges.push(direction);
    }

    pub fn nudges(&self) -> &[NudgeDirection] {
        &self.nudges
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn focus_state(&self) -> FocusState {
        self.focus
    }

    pub fn set_focus_state(&mut self, focus: FocusState) {
        self.focus = focus;
    }

    pub fn has_focus(&self) -> bool {
        self.focus == FocusState::Content
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn set_composing(&mut self, composing: bool) {
        self.composing = composing;
    }

    pub fn stats(&self) -> SurfaceStats {
        self.stats
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    /// Suppresses mutation records until the returned guard is dropped.
    pub fn ignore_mutations(&mut self) -> IgnoreMutations<'_> {
        let previous = self.observing;
        self.observing = false;
        IgnoreMutations {
            surface: self,
            previous,
        }
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    fn shift_selection_after_insertion(&mut self, parent: NodeId, index: usize) {
        if let Some(sel) = &mut self.selection {
            for point in [&mut sel.anchor, &mut sel.focus] {
                if point.node == parent && point.offset > index {
                    point.offset += 1;
                }
            }
        }
    }

    fn shift_selection_after_removal(&mut self, parent: NodeId, index: usize, removed: NodeId) {
        let Some(mut sel) = self.selection else {
            return;
        };
        for point in [&mut sel.anchor, &mut sel.focus] {
            if self.contains(removed, point.node) {
                *point = LivePoint {
                    node: parent,
                    offset: index,
                };
            } else if point.node == parent && point.offset > index {
                point.offset -= 1;
            }
        }
        self.selection = Some(sel);
    }

    /// Serializes the subtree at `node` as markup, for logging and tests.
    pub fn markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            Some(LiveKind::Text(text)) => out.push_str(text),
            Some(LiveKind::Element(data)) => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attrs {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in self.children(node) {
                    self.write_markup(child, out);
                }
                out.push_str("</");
                out.push_str(&data.tag);
                out.push('>');
            }
            None => {}
        }
    }
}

/// RAII guard returned by [`LiveSurface::ignore_mutations`].
///
/// Mutations made through the guard are not recorded. Observation is restored
/// when the guard is dropped, including during unwinding.
pub struct IgnoreMutations<'a> {
    surface: &'a mut LiveSurface,
    previous: bool,
}

impl Deref for IgnoreMutations<'_> {
    type Target = LiveSurface;

    fn deref(&self) -> &Self::Target {
        self.surface
    }
}

impl DerefMut for IgnoreMutations<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.surface
    }
}

impl Drop for IgnoreMutations<'_> {
    fn drop(&mut self) {
        self.surface.observing = self.previous;
    }
}

/// Tests whether two boundary points denote the same caret position, scanning
/// through inline element boundaries in both directions. Scans stop at block
/// elements and never enter non-editable elements.
pub fn is_equivalent_position(
    surface: &LiveSurface,
    node: NodeId,
    offset: usize,
    target: NodeId,
    target_offset: usize,
) -> bool {
    scan_for(surface, node, offset, target, target_offset, -1)
        || scan_for(surface, node, offset, target, target_offset, 1)
}

fn scan_for(
    surface: &LiveSurface,
    mut node: NodeId,
    mut offset: usize,
    target: NodeId,
    target_offset: usize,
    dir: i32,
) -> bool {
    loop {
        if node == target && offset == target_offset {
            return true;
        }
        let edge = if dir < 0 { 0 } else { surface.max_offset(node) };
        if offset == edge {
            if surface.is_block(node) {
                return false;
            }
            let Some(parent) = surface.parent(node) else {
                return false;
            };
            offset = surface.index_in_parent(node) + usize::from(dir > 0);
            node = parent;
        } else if !surface.is_text(node) {
            let index = if dir < 0 { offset - 1 } else { offset };
            let Some(child) = surface.child_at(node, index) else {
                return false;
            };
            if surface.is_uneditable(child) {
                return false;
            }
            node = child;
            offset = if dir < 0 { surface.max_offset(node) } else { 0 };
        } else {
            return false;
        }
    }
}

/// Finds the text node nearest to a boundary point, descending into the
/// child before (`side <= 0`) or after (`side >= 0`) the point.
pub fn nearby_text_node(
    surface: &LiveSurface,
    mut node: NodeId,
    mut offset: usize,
    side: i32,
) -> Option<NodeId> {
    loop {
        if surface.is_text(node) {
            return Some(node);
        }
        if offset > 0 && side <= 0 {
            node = surface.child_at(node, offset - 1)?;
            offset = surface.max_offset(node);
        } else if offset < surface.child_count(node) && side >= 0 {
            node = surface.child_at(node, offset)?;
            offset = 0;
        } else {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_with(surface: &mut LiveSurface, parts: &[&str]) -> (NodeId, Vec<NodeId>) {
        let line = surface.create_element("div");
        surface.append(surface.root(), line);
        let mut nodes = Vec::new();
        for part in parts {
            let node = if let Some(tag) = part.strip_prefix('<') {
                let el = surface.create_element(tag);
                surface.set_attr(el, "contenteditable", "false");
                el
            } else {
                surface.create_text(part)
            };
            surface.append(line, node);
            nodes.push(node);
        }
        (line, nodes)
    }

    #[test]
    fn ignore_guard_suppresses_records_and_restores_observation() {
        let mut surface = LiveSurface::new();
        let text = surface.create_text("a");
        {
            let mut guard = surface.ignore_mutations();
            let root = guard.root();
            guard.append(root, text);
            assert!(!guard.is_observing());
        }
        assert!(surface.is_observing());
        assert!(surface.take_mutations().is_empty());

        surface.set_text(text, "b");
        assert_eq!(
            surface.take_mutations(),
            vec![Mutation::CharacterData { target: text }]
        );
    }

    #[test]
    fn equivalent_positions_cross_inline_boundaries() {
        let mut surface = LiveSurface::new();
        let (line, nodes) = line_with(&mut surface, &["ab", "cd"]);
        // End of the first text node and start of the second are the same caret spot.
        assert!(is_equivalent_position(&surface, nodes[0], 2, nodes[1], 0));
        assert!(is_equivalent_position(&surface, line, 1, nodes[1], 0));
        assert!(!is_equivalent_position(&surface, nodes[0], 1, nodes[1], 0));
    }

    #[test]
    fn equivalence_stops_at_uneditable_elements() {
        let mut surface = LiveSurface::new();
        let (line, nodes) = line_with(&mut surface, &["ab", "<span", "cd"]);
        assert!(!is_equivalent_position(&surface, nodes[0], 2, nodes[2], 0));
        assert!(is_equivalent_position(&surface, nodes[0], 2, line, 1));
    }

    #[test]
    fn removing_a_node_relocates_a_selection_inside_it() {
        let mut surface = LiveSurface::new();
        let (line, nodes) = line_with(&mut surface, &["ab", "cd"]);
        surface.collapse(LivePoint {
            node: nodes[1],
            offset: 1,
        });
        surface.remove(nodes[1]);
        let sel = surface.selection().copied().expect("selection");
        assert_eq!(
            sel.focus,
            LivePoint {
                node: line,
                offset: 1
            }
        );
        surface.collect_detached();
        assert!(!surface.contains_node(nodes[1]));
        assert!(surface.contains_node(nodes[0]));
    }

    #[test]
    fn moved_nodes_survive_collection() {
        let mut surface = LiveSurface::new();
        let (line, nodes) = line_with(&mut surface, &["ab", "cd"]);
        surface.remove(nodes[0]);
        surface.append(line, nodes[0]);
        surface.collect_detached();
        assert_eq!(surface.children(line), vec![nodes[1], nodes[0]]);
    }

    #[test]
    fn nearby_text_node_descends_towards_side() {
        let mut surface = LiveSurface::new();
        let (line, nodes) = line_with(&mut surface, &["ab", "cd"]);
        assert_eq!(nearby_text_node(&surface, line, 1, -1), Some(nodes[0]));
        assert_eq!(nearby_text_node(&surface, line, 1, 1), Some(nodes[1]));
        assert_eq!(nearby_text_node(&surface, line, 0, -1), None);
    }
}
