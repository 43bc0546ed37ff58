//! Building replacement views for a document range.
//!
//! ## Usage
//!
//! Reconciliation asks a [`ContentBuilder`] for the views covering each
//! changed range. [`DecoratedContentBuilder`] is the default: it walks the
//! range with [`spans`] and emits lines, text runs wrapped in their marks,
//! widgets, widget buffers and block widgets.

use std::rc::Rc;

use crate::{
    decoration::{BlockType, Decoration, DecorationSet, MarkDecoration, SpanIterator, spans},
    text::Document,
    view_tree::{BlockWidgetData, ViewId, ViewKind, ViewTree, WidgetData},
    widget::{CompositionWidget, NullWidget, Widget},
};

/// Longest text run the builder emits.
const TEXT_CHUNK: usize = 512;

/// Views built for a range, with the flags reconciliation needs to fit
/// them between the untouched content around the range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltContent {
    /// Detached block views covering the range.
    pub content: Vec<ViewId>,
    /// 1 when the range starts right after a line break.
    pub break_at_start: u8,
    /// Mark levels at the start that continue from the content before.
    pub open_start: usize,
    /// Mark levels at the end that continue into the content after.
    pub open_end: usize,
}

/// Turns a document range plus decorations into block views.
pub trait ContentBuilder {
    fn build(
        &mut self,
        tree: &mut ViewTree,
        doc: &Document,
        from: usize,
        to: usize,
        decorations: &[DecorationSet],
    ) -> BuiltContent;
}

/// The default content builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoratedContentBuilder;

impl ContentBuilder for DecoratedContentBuilder {
    fn build(
        &mut self,
        tree: &mut ViewTree,
        doc: &Document,
        from: usize,
        to: usize,
        decorations: &[DecorationSet],
    ) -> BuiltContent {
        let mut state = BuildState {
            tree,
            doc,
            pos: from,
            content: Vec::new(),
            cur_line: None,
            break_at_start: 0,
            pending_buffer: PendingBuffer::No,
            at_cursor_pos: true,
            open_start: None,
        };
        let open_end = spans(decorations, from, to, &mut state);
        let open_start = state.open_start.unwrap_or(open_end);
        state.finish(open_end);
        BuiltContent {
            content: state.content,
            break_at_start: state.break_at_start,
            open_start,
            open_end,
        }
    }
}

/// Whether a buffer still has to follow the last widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingBuffer {
    No,
    Yes,
    /// Only when the next content is itself a caret stop.
    IfCursor,
}

struct BuildState<'a> {
    tree: &'a mut ViewTree,
    doc: &'a Document,
    pos: usize,
    content: Vec<ViewId>,
    cur_line: Option<ViewId>,
    break_at_start: u8,
    pending_buffer: PendingBuffer,
    /// False right after a widget that covers the caret position after it.
    at_cursor_pos: bool,
    open_start: Option<usize>,
}

impl BuildState<'_> {
    /// Whether the current position already belongs to a line or block.
    fn pos_covered(&self) -> bool {
        match self.content.last() {
            None => self.break_at_start == 0 && self.doc.line_at(self.pos).from != self.pos,
            Some(&last) => {
                self.tree.break_after(last) == 0
                    && self.tree.block_type(last) != Some(BlockType::WidgetBefore)
            }
        }
    }

    fn get_line(&mut self) -> ViewId {
        match self.cur_line {
            Some(line) => line,
            None => {
                let line = self.tree.create_line();
                self.content.push(line);
                self.cur_line = Some(line);
                self.at_cursor_pos = true;
                line
            }
        }
    }

    /// Wraps `view` in `active` marks, innermost last in `active`.
    fn wrap_marks(&mut self, mut view: ViewId, active: &[Rc<MarkDecoration>]) -> ViewId {
        for mark in active.iter().rev() {
            let length = self.tree.len(view);
            let wrapper = self.tree.create(ViewKind::Mark(mark.clone()), length);
            self.tree.replace_children(wrapper, 0, 0, vec![view]);
            view = wrapper;
        }
        view
    }

    fn flush_buffer(&mut self, active: &[Rc<MarkDecoration>]) {
        if self.pending_buffer == PendingBuffer::No {
            return;
        }
        self.pending_buffer = PendingBuffer::No;
        if let Some(line) = self.cur_line {
            let buffer = self.tree.create(ViewKind::WidgetBuffer { side: -1 }, 0);
            let view = self.wrap_marks(buffer, active);
            self.tree.join_inline_into(line, view, active.len());
        }
    }

    fn add_block_widget(&mut self, view: ViewId) {
        self.flush_buffer(&[]);
        self.cur_line = None;
        self.content.push(view);
    }

    fn finish(&mut self, open_end: usize) {
        if open_end == 0 {
            self.flush_buffer(&[]);
        } else {
            self.pending_buffer = PendingBuffer::No;
        }
        if !self.pos_covered() {
            self.get_line();
        }
    }

    fn build_text(&mut self, mut length: usize, active: &[Rc<MarkDecoration>], mut open_start: usize) {
        while length > 0 && self.pos < self.doc.len() {
            let line = self.doc.line_at(self.pos);
            if self.pos == line.to {
                if !self.pos_covered() {
                    self.get_line();
                }
                match self.content.last() {
                    Some(&last) => self.tree.set_break_after(last, 1),
                    None => self.break_at_start = 1,
                }
                self.flush_buffer(&[]);
                self.cur_line = None;
                self.pos += 1;
                length -= 1;
                continue;
            }
            let take = (line.to - self.pos).min(length).min(TEXT_CHUNK);
            self.flush_buffer(&active[..open_start.min(active.len())]);
            let text = self.tree.create_text(self.doc.slice_string(self.pos, self.pos + take));
            let view = self.wrap_marks(text, active);
            let line = self.get_line();
            self.tree.join_inline_into(line, view, open_start);
            self.at_cursor_pos = true;
            self.pos += take;
            length -= take;
            open_start = 0;
        }
    }

    fn inline_widget(
        &mut self,
        widget: Widget,
        from: usize,
        to: usize,
        side: i32,
        active: &[Rc<MarkDecoration>],
        mut open_start: usize,
    ) -> usize {
        let data = WidgetData {
            widget: widget.clone(),
            side,
            prev_widget: None,
        };
        let kind = if widget.downcast_ref::<CompositionWidget>().is_some() {
            ViewKind::Composition(data)
        } else {
            ViewKind::Widget(data)
        };
        let view = self.tree.create(kind, to - from);
        let editable = self.tree.is_editable(view);
        let cursor_before = self.at_cursor_pos
            && !editable
            && open_start <= active.len()
            && (from < to || side > 0);
        let cursor_after = !editable && (from < to || side <= 0);
        let line = self.get_line();
        if self.pending_buffer == PendingBuffer::IfCursor && !cursor_before {
            self.pending_buffer = PendingBuffer::No;
        }
        self.flush_buffer(active);
        if cursor_before {
            let buffer = self.tree.create(ViewKind::WidgetBuffer { side: 1 }, 0);
            let wrapped = self.wrap_marks(buffer, active);
            self.tree.join_inline_into(line, wrapped, open_start);
            open_start = open_start.max(active.len());
        }
        let wrapped = self.wrap_marks(view, active);
        self.tree.join_inline_into(line, wrapped, open_start);
        self.at_cursor_pos = cursor_after;
        self.pending_buffer = if !cursor_after {
            PendingBuffer::No
        } else if from < to {
            PendingBuffer::Yes
        } else {
            PendingBuffer::IfCursor
        };
        open_start
    }
}

impl SpanIterator for BuildState<'_> {
    fn span(&mut self, from: usize, to: usize, active: &[Rc<MarkDecoration>], open_start: usize) {
        self.build_text(to - from, active, open_start);
        self.pos = to;
        if self.open_start.is_none() {
            self.open_start = Some(open_start);
        }
    }

    fn point(
        &mut self,
        from: usize,
        to: usize,
        deco: &Decoration,
        active: &[Rc<MarkDecoration>],
        mut open_start: usize,
        _index: usize,
    ) {
        match deco {
            Decoration::Widget(_) | Decoration::Replace(_) => {
                let widget = deco.widget_handle().cloned();
                if let Some(block_type) = deco.block_type() {
                    if block_type == BlockType::WidgetAfter && !self.pos_covered() {
                        self.get_line();
                    }
                    let widget = widget.unwrap_or_else(|| Rc::new(NullWidget::block()));
                    let view = self.tree.create(
                        ViewKind::BlockWidget(BlockWidgetData {
                            widget,
                            block_type,
                            prev_widget: None,
                        }),
                        to - from,
                    );
                    self.add_block_widget(view);
                } else {
                    let widget = widget.unwrap_or_else(|| Rc::new(NullWidget::inline()));
                    let side = i32::try_from(deco.start_side()).unwrap_or(0);
                    open_start = self.inline_widget(widget, from, to, side, active, open_start);
                }
            }
            Decoration::Line(line_deco) => {
                if self.doc.line_at(self.pos).from == self.pos {
                    let line = self.get_line();
                    self.tree.add_line_deco(line, line_deco);
                }
            }
            Decoration::Mark(_) => {}
        }
        if to > from {
            self.pos = to;
        }
        if self.open_start.is_none() {
            self.open_start = Some(open_start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::{DecoRange, LineDecoration};

    #[derive(Debug, PartialEq)]
    struct Pill;

    impl crate::widget::WidgetType for Pill {
        fn to_dom(&self, surface: &mut crate::surface::LiveSurface) -> indextree::NodeId {
            surface.create_element("span")
        }
    }

    fn build(doc: &str, from: usize, to: usize, decos: Vec<DecoRange>) -> (ViewTree, BuiltContent) {
        let mut tree = ViewTree::new(256);
        let doc = Document::new(doc);
        let sets = [DecorationSet::new(decos)];
        let built = DecoratedContentBuilder.build(&mut tree, &doc, from, to, &sets);
        (tree, built)
    }

    fn describe(tree: &ViewTree, id: ViewId) -> String {
        let inner = || {
            tree.children(id)
                .iter()
                .map(|&c| describe(tree, c))
                .collect::<Vec<_>>()
                .join(",")
        };
        match tree.kind(id) {
            Some(ViewKind::Line(_)) => format!("line[{}]", inner()),
            Some(ViewKind::Mark(_)) => format!("mark[{}]", inner()),
            Some(ViewKind::Text(t)) => format!("{t:?}"),
            Some(ViewKind::Widget(_)) => "widget".into(),
            Some(ViewKind::WidgetBuffer { side }) => format!("buffer{side}"),
            Some(ViewKind::BlockWidget(_)) => "block".into(),
            Some(ViewKind::Composition(_)) => "composition".into(),
            Some(ViewKind::Doc) | None => "?".into(),
        }
    }

    #[test]
    fn lines_are_separated_by_breaks() {
        let (tree, built) = build("ab\ncd", 0, 5, Vec::new());
        assert_eq!(built.content.len(), 2);
        assert_eq!(describe(&tree, built.content[0]), "line[\"ab\"]");
        assert_eq!(tree.break_after(built.content[0]), 1);
        assert_eq!(describe(&tree, built.content[1]), "line[\"cd\"]");
        assert_eq!(built.break_at_start, 0);
    }

    #[test]
    fn a_range_starting_on_a_break_reports_it() {
        let (tree, built) = build("ab\ncd", 2, 5, Vec::new());
        assert_eq!(built.break_at_start, 1);
        assert_eq!(built.content.len(), 1);
        assert_eq!(describe(&tree, built.content[0]), "line[\"cd\"]");
    }

    #[test]
    fn non_editable_widgets_get_buffers_on_open_sides() {
        let widget: Widget = Rc::new(Pill);
        let (tree, built) = build(
            "abc",
            0,
            3,
            vec![Decoration::replace(Some(widget)).range(1, 2)],
        );
        assert_eq!(
            describe(&tree, built.content[0]),
            "line[\"a\",buffer1,widget,buffer-1,\"c\"]"
        );
    }

    #[test]
    fn marks_wrap_text_and_line_decorations_apply() {
        let (tree, built) = build(
            "abcd",
            0,
            4,
            vec![
                Decoration::mark(MarkDecoration::with_class("x")).range(1, 3),
                Decoration::line(LineDecoration {
                    class: Some("first".into()),
                    attrs: Default::default(),
                })
                .point(0),
            ],
        );
        let line = built.content[0];
        assert_eq!(describe(&tree, line), "line[\"a\",mark[\"bc\"],\"d\"]");
        let class = match tree.kind(line) {
            Some(ViewKind::Line(data)) => data.attrs.as_ref().and_then(|a| a.get("class").cloned()),
            _ => None,
        };
        assert_eq!(class.as_deref(), Some("first"));
        assert_eq!(tree.len(line), 4);
    }

    #[test]
    fn block_replace_covers_lines() {
        let (tree, built) = build(
            "ab\ncd\nef",
            0,
            8,
            vec![Decoration::block_replace(None).range(3, 5)],
        );
        let kinds: Vec<String> = built.content.iter().map(|&c| describe(&tree, c)).collect();
        assert_eq!(kinds, vec!["line[\"ab\"]", "block", "line[\"ef\"]"]);
        assert_eq!(tree.len(built.content[1]), 2);
        assert_eq!(tree.break_after(built.content[1]), 1);
    }
}
