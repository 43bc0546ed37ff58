//! The document view: the root controller of the update cycle.
//!
//! ## Usage
//!
//! A [`DocView`] owns the view tree, the live surface it renders into and
//! the current document, selection and decoration sources. Every edit is
//! described by a [`ViewUpdate`] and applied with [`DocView::update`], which
//! reconciles the changed ranges, syncs the dirty views to the surface and
//! then brings the native selection in line with the logical one.

mod composition;
mod selection;
#[cfg(test)]
mod tests;

use std::{mem, rc::Rc};

use indextree::NodeId;
use tracing::{debug, trace, warn};

use crate::{
    builder::{ContentBuilder, DecoratedContentBuilder},
    config::ViewConfig,
    decoration::{Decoration, DecorationSet, compare_snapshots},
    error::{Result, ViewError},
    geometry::{
        Measure, MonospaceMeasure, Rect, ScrollMargins, ScrollRequest, TextSize, bounding_rect,
        flatten_rect,
    },
    selection::{EditorSelection, SelectionRange},
    surface::{LivePoint, LivePos, LiveSurface},
    text::{ChangeSet, ChangedRange, Document},
    view_tree::{Track, ViewId, ViewTree},
    widget::{BlockGapWidget, Widget},
};

/// Text laid out to sample the character width when no line can be
/// measured.
const SAMPLE_TEXT: &str = "abc def ghi jkl mno pqr stu";

/// The rendered part of the document. Lines outside it are drawn as gap
/// placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub from: usize,
    pub to: usize,
}

/// One step of the update cycle: a change set from the current document,
/// plus whatever else changed along with it.
#[derive(Debug, Clone)]
pub struct ViewUpdate {
    changes: ChangeSet,
    doc: Document,
    start_lines: usize,
    selection: Option<EditorSelection>,
    decorations: Option<Vec<DecorationSet>>,
    line_gaps: Option<DecorationSet>,
    viewport: Option<Viewport>,
    from_pointer: bool,
}

impl ViewUpdate {
    /// An update applying `changes` to `start`.
    pub fn new(start: &Document, changes: ChangeSet) -> Result<Self> {
        let doc = changes.apply(start)?;
        Ok(Self {
            changes,
            doc,
            start_lines: start.lines(),
            selection: None,
            decorations: None,
            line_gaps: None,
            viewport: None,
            from_pointer: false,
        })
    }

    /// An update that leaves the text of `doc` alone.
    pub fn unchanged(doc: &Document) -> Self {
        Self {
            changes: ChangeSet::empty(doc.len()),
            doc: doc.clone(),
            start_lines: doc.lines(),
            selection: None,
            decorations: None,
            line_gaps: None,
            viewport: None,
            from_pointer: false,
        }
    }

    /// Replaces the selection instead of mapping the current one.
    pub fn with_selection(mut self, selection: EditorSelection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Replaces the decoration sources instead of mapping the current ones.
    pub fn with_decorations(mut self, decorations: Vec<DecorationSet>) -> Self {
        self.decorations = Some(decorations);
        self
    }

    /// Replaces the long-line collapse decorations.
    pub fn with_line_gaps(mut self, line_gaps: DecorationSet) -> Self {
        self.line_gaps = Some(line_gaps);
        self
    }

    pub fn with_viewport(mut self, from: usize, to: usize) -> Self {
        self.viewport = Some(Viewport { from, to });
        self
    }

    /// Marks the update as caused by a pointer, which lets selection sync
    /// run without focus.
    pub fn from_pointer(mut self) -> Self {
        self.from_pointer = true;
        self
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// The document after the changes.
    pub fn doc(&self) -> &Document {
        &self.doc
    }
}

/// Root controller keeping a [`LiveSurface`] in sync with a document.
pub struct DocView {
    surface: LiveSurface,
    tree: ViewTree,
    /// The content element all lines render into.
    content: NodeId,
    doc: Document,
    selection: EditorSelection,
    config: ViewConfig,
    sources: Vec<DecorationSet>,
    line_gaps: DecorationSet,
    composition_deco: DecorationSet,
    /// The snapshot the tree currently reflects.
    decorations: Vec<DecorationSet>,
    viewport: Viewport,
    min_width: f32,
    min_width_from: usize,
    min_width_to: usize,
    force_selection: bool,
    imprecise_anchor: Option<LivePoint>,
    imprecise_head: Option<LivePoint>,
    builder: Box<dyn ContentBuilder>,
    measure: Box<dyn Measure>,
}

impl DocView {
    /// A view of `doc` rendering into a fresh headless surface.
    pub fn new(doc: Document, config: ViewConfig) -> Self {
        Self::with_surface(LiveSurface::new(), doc, config, Vec::new())
    }

    /// A view of `doc` with decoration `sources`, rendering into `surface`.
    #[tracing::instrument(level = "debug", skip_all, fields(len = doc.len()))]
    pub fn with_surface(
        mut surface: LiveSurface,
        doc: Document,
        config: ViewConfig,
        sources: Vec<DecorationSet>,
    ) -> Self {
        let content = {
            let mut surface = surface.ignore_mutations();
            let content = surface.create_element("div");
            surface.set_attr(content, "class", "cm-content");
            let editable = if config.editable { "true" } else { "false" };
            surface.set_attr(content, "contenteditable", editable);
            let root = surface.root();
            surface.append(root, content);
            content
        };
        let mut tree = ViewTree::new(config.max_text_join);
        let root = tree.root();
        if let Some(node) = tree.get_mut(root) {
            node.dom = Some(content);
        }
        surface.set_view(content, Some(root));
        let line = tree.create_line();
        tree.replace_children(root, 0, 0, vec![line]);

        let len = doc.len();
        let mut view = Self {
            surface,
            tree,
            content,
            doc,
            selection: EditorSelection::default(),
            config,
            sources,
            line_gaps: DecorationSet::empty(),
            composition_deco: DecorationSet::empty(),
            decorations: Vec::new(),
            viewport: Viewport { from: 0, to: len },
            min_width: 0.0,
            min_width_from: 0,
            min_width_to: 0,
            force_selection: false,
            imprecise_anchor: None,
            imprecise_head: None,
            builder: Box::new(DecoratedContentBuilder),
            measure: Box::new(MonospaceMeasure::default()),
        };
        view.decorations = view.snapshot();
        view.update_inner(&[ChangedRange::new(0, 0, 0, len)], 0);
        view
    }

    /// Uses `measure` for coordinate queries and gap heights.
    pub fn set_measure(&mut self, measure: Box<dyn Measure>) {
        self.measure = measure;
    }

    /// Uses `builder` for content built by later updates.
    pub fn set_content_builder(&mut self, builder: Box<dyn ContentBuilder>) {
        self.builder = builder;
    }

    pub fn surface(&self) -> &LiveSurface {
        &self.surface
    }

    /// The surface, for host-side changes such as moving the native
    /// selection, focusing or starting a composition.
    pub fn surface_mut(&mut self) -> &mut LiveSurface {
        &mut self.surface
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &EditorSelection {
        &self.selection
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The live element holding the lines.
    pub fn content_dom(&self) -> NodeId {
        self.content
    }

    /// Applies `update`. Returns whether the view tree was reconciled;
    /// `false` means only the selection was synced.
    #[tracing::instrument(level = "debug", skip_all, fields(changes = !update.changes.is_empty()))]
    pub fn update(&mut self, update: ViewUpdate) -> bool {
        let ViewUpdate {
            changes,
            doc,
            start_lines,
            selection,
            decorations,
            line_gaps,
            viewport,
            from_pointer,
        } = update;
        let old_len = self.doc.len();
        let mut ranges = if changes.len() == old_len {
            changes.changed_ranges()
        } else {
            warn!(
                expected = old_len,
                found = changes.len(),
                "change set does not fit the document, rebuilding the view"
            );
            vec![ChangedRange::new(0, old_len, 0, doc.len())]
        };
        let mappable = changes.len() == old_len;

        if self.min_width > 0.0 && !ranges.is_empty() {
            let touched = ranges
                .iter()
                .any(|r| r.to_a >= self.min_width_from && r.from_a <= self.min_width_to);
            if touched || !mappable {
                self.min_width = 0.0;
                self.min_width_from = 0;
                self.min_width_to = 0;
            } else {
                self.min_width_from = changes.map_pos(self.min_width_from, 1);
                self.min_width_to = changes.map_pos(self.min_width_to, 1);
            }
        }

        let carries_transaction = !changes.is_empty() || selection.is_some();
        let new_len = doc.len();
        self.selection = match selection {
            Some(selection) => selection.clamp(new_len),
            None if mappable => self.selection.map(&changes),
            None => self.selection.clamp(new_len),
        };
        self.viewport = self.next_viewport(viewport, &changes, mappable, &doc);

        self.composition_deco = if !self.surface.is_composing() || !mappable {
            DecorationSet::empty()
        } else if carries_transaction {
            self.compute_composition_deco(&changes, &doc)
        } else {
            self.composition_deco.clone()
        };
        if self.config.capabilities.force_on_line_count_change
            && self.composition_deco.is_empty()
            && doc.lines() != start_lines
        {
            self.force_selection = true;
        }

        self.sources = match decorations {
            Some(sources) => sources,
            None if mappable => self.sources.iter().map(|set| set.map(&changes)).collect(),
            None => self.sources.clone(),
        };
        self.line_gaps = match line_gaps {
            Some(gaps) => gaps,
            None if mappable => self.line_gaps.map(&changes),
            None => DecorationSet::empty(),
        };
        self.doc = doc;

        let prev = mem::take(&mut self.decorations);
        self.decorations = self.snapshot();
        if mappable {
            let diff = compare_snapshots(&prev, &self.decorations, &changes);
            trace!(ranges = diff.len(), "decoration changes");
            ranges = ChangedRange::extend_with_ranges(ranges, &diff);
        }

        let main = self.selection.main();
        let in_viewport = main.from() >= self.viewport.from && main.to() <= self.viewport.to;
        if self.tree.dirty(self.tree.root()).is_empty() && ranges.is_empty() && in_viewport {
            debug!("no structural change");
            self.update_selection(from_pointer);
            return false;
        }
        self.update_inner(&ranges, old_len);
        self.update_selection(from_pointer);
        if !self.surface.is_composing() {
            self.enforce_cursor_assoc();
        }
        true
    }

    /// Reconciles `ranges` and writes the result to the surface.
    fn update_inner(&mut self, ranges: &[ChangedRange], old_length: usize) {
        self.tree.update_children(
            ranges,
            old_length,
            &self.doc,
            &self.decorations,
            self.builder.as_mut(),
        );
        self.sync_surface();
    }

    /// Writes the dirty part of the tree and the content width to the
    /// surface, then frees what the tree released.
    fn sync_surface(&mut self) {
        let root = self.tree.root();
        let focus = self.surface.selection().map(|sel| sel.focus.node);
        let mut track = if self.config.capabilities.track_focus_writes {
            focus.map(Track::new)
        } else {
            None
        };
        {
            let mut surface = self.surface.ignore_mutations();
            self.tree.sync(root, &mut surface, &mut track);
            let style = (self.min_width > 0.0).then(|| format!("min-width: {}px", self.min_width));
            match style {
                Some(style) if surface.attr(self.content, "style") != Some(style.as_str()) => {
                    surface.set_attr(self.content, "style", &style)
                }
                None if surface.attr(self.content, "style").is_some() => {
                    surface.remove_attr(self.content, "style")
                }
                _ => {}
            }
        }
        self.tree.clear_dirty(root);
        let released = self.tree.take_released();
        for (widget, dom) in released {
            widget.destroy(&mut self.surface, dom);
        }
        self.tree.collect_destroyed();
        self.surface.collect_detached();
        let focus_moved = track.is_some_and(|t| {
            t.written || self.surface.selection().map(|sel| sel.focus.node) != Some(t.node)
        });
        if focus_moved {
            debug!("host focus node touched during sync, forcing a selection write");
            self.force_selection = true;
        }
    }

    /// The decoration snapshot for the current state, highest precedence
    /// first.
    fn snapshot(&self) -> Vec<DecorationSet> {
        let mut sets = Vec::with_capacity(self.sources.len() + 3);
        sets.push(self.composition_deco.clone());
        sets.extend(self.sources.iter().cloned());
        sets.push(self.block_gap_deco());
        sets.push(self.line_gaps.clone());
        sets
    }

    /// Gap placeholders for the lines before and after the viewport.
    fn block_gap_deco(&self) -> DecorationSet {
        let len = self.doc.len();
        let mut gaps = Vec::new();
        let mut push_gap = |from: usize, to: usize| {
            if to > from {
                let lines = self.doc.line_at(to).number - self.doc.line_at(from).number + 1;
                let widget: Widget = Rc::new(BlockGapWidget {
                    height: lines as f32 * self.measure.line_height(),
                });
                gaps.push(Decoration::block_replace(Some(widget)).range(from, to));
            }
        };
        if self.viewport.from > 0 {
            push_gap(0, self.viewport.from - 1);
        }
        push_gap(self.viewport.to + 1, len);
        DecorationSet::new(gaps)
    }

    fn next_viewport(
        &self,
        requested: Option<Viewport>,
        changes: &ChangeSet,
        mappable: bool,
        doc: &Document,
    ) -> Viewport {
        let len = doc.len();
        let Viewport { mut from, mut to } = match requested {
            Some(viewport) => viewport,
            None if mappable => {
                let from = changes.map_pos(self.viewport.from, -1);
                Viewport {
                    from,
                    to: changes.map_pos(self.viewport.to, 1).max(from),
                }
            }
            None => Viewport { from: 0, to: len },
        };
        let main = self.selection.main();
        from = from.min(main.head).min(len);
        to = to.max(main.head).min(len);
        Viewport {
            from: doc.line_at(from).from,
            to: doc.line_at(to.max(from)).to,
        }
    }

    /// Records a minimum content width valid while `from..to` is untouched.
    pub fn set_min_width(&mut self, width: f32, from: usize, to: usize) {
        self.min_width = width;
        self.min_width_from = from;
        self.min_width_to = to;
    }

    pub fn min_width(&self) -> f32 {
        self.min_width
    }

    /// Heights of the rendered blocks inside the viewport, in document
    /// order. A line wider than both `client_width` and the current minimum
    /// width becomes the new minimum, held until its range is edited.
    pub fn measure_visible_line_heights(&mut self, client_width: f32) -> Vec<f32> {
        let Viewport { from, to } = self.viewport;
        let mut min_width = client_width.max(self.min_width) + 1.0;
        let mut heights = Vec::new();
        let mut pos = 0;
        for &child in self.tree.children(self.tree.root()) {
            let end = pos + self.tree.len(child);
            if end > to {
                break;
            }
            if pos >= from {
                if let Some(dom) = self.tree.dom(child) {
                    let rects = self.measure.client_rects(&self.surface, dom);
                    heights.push(bounding_rect(&rects).map_or(0.0, |rect| rect.height()));
                    let width = self.measure.scroll_width(&self.surface, dom);
                    if width > min_width {
                        min_width = width;
                        self.min_width = width;
                        self.min_width_from = pos;
                        self.min_width_to = end;
                    }
                }
            }
            pos = end + usize::from(self.tree.break_after(child));
        }
        trace!(lines = heights.len(), min_width = self.min_width, "measured visible lines");
        heights
    }

    /// Line height and character width of the content. Taken from the
    /// first short plain-text line, or from a sample line added to the
    /// content for the measurement when there is none.
    pub fn measure_text_size(&mut self) -> TextSize {
        let root = self.tree.root();
        let measured = self
            .tree
            .children(root)
            .iter()
            .filter(|&&child| self.tree.is_line(child))
            .find_map(|&child| self.tree.line_text_size(child, &self.surface, self.measure.as_ref()));
        if let Some(size) = measured {
            return size;
        }
        debug!("no measurable line, measuring a sample");
        let mut surface = self.surface.ignore_mutations();
        let dummy = surface.create_element("div");
        surface.set_attr(dummy, "class", "cm-line");
        let text = surface.create_text(SAMPLE_TEXT);
        surface.append(dummy, text);
        surface.append(self.content, dummy);
        let sample_len = SAMPLE_TEXT.chars().count();
        let char_width = self
            .measure
            .text_rects(&surface, text, 0, sample_len)
            .first()
            .map_or(7.0, |rect| rect.width() / sample_len as f32);
        let line_height = bounding_rect(&self.measure.client_rects(&surface, dummy))
            .map_or(self.measure.line_height(), |rect| rect.height());
        surface.remove(dummy);
        surface.collect_detached();
        TextSize {
            line_height,
            char_width,
        }
    }

    /// Marks the view rendering `node` dirty after the host changed the
    /// node behind the view's back. The next update or [`DocView::reset`]
    /// writes the view's content over it. Returns `false` when no view
    /// renders `node`.
    pub fn mark_dom_changed(&mut self, node: NodeId) -> bool {
        match self.tree.nearest(&self.surface, node) {
            Some(view) => {
                self.tree.mark_dirty(view, false);
                true
            }
            None => false,
        }
    }

    /// Writes pending view changes to the surface and, with `selection`,
    /// re-syncs the native selection.
    pub fn reset(&mut self, selection: bool) {
        if !self.tree.dirty(self.tree.root()).is_empty() {
            debug!("writing pending views");
            self.sync_surface();
        }
        if selection {
            self.update_selection(false);
        }
    }

    fn check_pos(&self, pos: usize) -> Result<()> {
        if pos > self.doc.len() {
            return Err(ViewError::PositionOutOfRange {
                pos,
                len: self.doc.len(),
            });
        }
        Ok(())
    }

    /// The live boundary point for document position `pos`.
    pub fn dom_at_pos(&self, pos: usize) -> Result<LivePos> {
        self.check_pos(pos)?;
        self.tree
            .dom_at_pos(self.tree.root(), pos, &self.surface)
            .ok_or_else(|| ViewError::Inconsistent(format!("no live node renders position {pos}")))
    }

    /// Document position of a live boundary point.
    pub fn pos_from_dom(&self, node: NodeId, offset: usize) -> Result<usize> {
        if !self.surface.contains(self.content, node) {
            return Err(ViewError::PositionOutsideView);
        }
        self.tree.pos_from_dom(&self.surface, node, offset)
    }

    /// The closest view rendering `node`.
    pub fn nearest(&self, node: NodeId) -> Option<ViewId> {
        self.tree.nearest(&self.surface, node)
    }

    /// The line view at `pos`, or `None` when a block widget covers it.
    pub fn line_at(&self, pos: usize) -> Option<ViewId> {
        self.tree.find_line(pos)
    }

    /// Screen rectangle of the caret at `pos`. `side` picks the character
    /// before (negative) or after (zero or positive) the position.
    pub fn coords_at(&self, pos: usize, side: i32) -> Result<Option<Rect>> {
        self.check_pos(pos)?;
        let rect = self.raw_coords(pos, side);
        Ok(rect.map(|rect| flatten_rect(rect, side >= 0)))
    }

    fn raw_coords(&self, pos: usize, side: i32) -> Option<Rect> {
        self.tree
            .coords_at(self.tree.root(), pos, side, &self.surface, self.measure.as_ref())
    }

    /// The rectangle the host should scroll to so that `range` is visible,
    /// padded by the largest contributed margin on every edge.
    pub fn scroll_into_view(&self, range: SelectionRange, margins: &[ScrollMargins]) -> Option<ScrollRequest> {
        let head_side = if range.is_empty() {
            i32::from(range.assoc)
        } else if range.head > range.anchor {
            -1
        } else {
            1
        };
        let mut rect = self.raw_coords(range.head, head_side)?;
        if !range.is_empty() {
            let anchor_side = if range.anchor > range.head { -1 } else { 1 };
            if let Some(other) = self.raw_coords(range.anchor, anchor_side) {
                rect = rect.union(&other);
            }
        }
        let m = ScrollMargins::combine(margins);
        Some(ScrollRequest {
            rect: Rect::new(
                rect.left - m.left,
                rect.top - m.top,
                rect.right + m.right,
                rect.bottom + m.bottom,
            ),
            bias: if range.head < range.anchor { -1 } else { 1 },
        })
    }

    /// Verifies the structural invariants of the whole tree.
    pub fn check_invariants(&self) -> Result<()> {
        let root = self.tree.root();
        self.tree.check_invariants(root)?;
        if self.tree.len(root) != self.doc.len() {
            return Err(ViewError::LengthMismatch {
                expected: self.doc.len(),
                found: self.tree.len(root),
            });
        }
        Ok(())
    }
}
