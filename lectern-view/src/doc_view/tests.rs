use std::rc::Rc;

use indextree::NodeId;

use super::*;
use crate::{
    config::HostCapabilities,
    decoration::MarkDecoration,
    error::ViewError,
    surface::FocusState,
    text::ChangeSpec,
    view_tree::ViewKind,
    widget::{CompositionWidget, NullWidget},
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn view_of(text: &str) -> DocView {
    init_logging();
    DocView::new(Document::new(text), ViewConfig::default())
}

fn edit(view: &mut DocView, specs: Vec<ChangeSpec>) -> bool {
    let changes = ChangeSet::of(view.doc().len(), specs).expect("valid change set");
    let update = ViewUpdate::new(view.doc(), changes).expect("change set fits the document");
    view.update(update)
}

fn lines(view: &DocView) -> Vec<ViewId> {
    view.tree().children(view.tree().root()).to_vec()
}

fn line_dom(view: &DocView, index: usize) -> NodeId {
    view.tree().dom(lines(view)[index]).expect("line is rendered")
}

fn rendered_text(view: &DocView) -> Vec<String> {
    lines(view)
        .into_iter()
        .map(|line| {
            let dom = view.tree().dom(line).expect("line is rendered");
            view.surface().text_content(dom)
        })
        .collect()
}

fn content_markup(view: &DocView) -> String {
    let surface = view.surface();
    surface
        .children(view.content_dom())
        .into_iter()
        .map(|node| surface.markup(node))
        .collect()
}

fn mark(class: &str, from: usize, to: usize) -> crate::decoration::DecoRange {
    Decoration::mark(MarkDecoration::with_class(class)).range(from, to)
}

#[test]
fn initial_render_has_one_element_per_line() {
    let view = view_of("one\n\nthree");
    assert_eq!(
        content_markup(&view),
        "<div class=\"cm-line\">one</div>\
         <div class=\"cm-line\"><br></br></div>\
         <div class=\"cm-line\">three</div>"
    );
    assert!(view.check_invariants().is_ok());
}

#[test]
fn edit_inside_a_line_rewrites_only_its_text() {
    let mut view = view_of("abcdef");
    let line = lines(&view)[0];
    let text = view.tree().children(line)[0];
    let text_dom = view.tree().dom(text);
    let before = view.surface().stats();

    assert!(edit(&mut view, vec![ChangeSpec::new(2, 4, "XY")]));

    assert_eq!(lines(&view), vec![line]);
    assert_eq!(view.tree().children(line), &[text]);
    assert_eq!(view.tree().dom(text), text_dom);
    let after = view.surface().stats();
    assert_eq!(after.text_writes, before.text_writes + 1);
    assert_eq!(after.inserted, before.inserted);
    assert_eq!(rendered_text(&view), vec!["abXYef"]);
    assert!(view.check_invariants().is_ok());
}

#[test]
fn untouched_lines_keep_their_views_and_nodes() {
    let mut view = view_of("one\ntwo\nthree");
    let ids = lines(&view);
    let doms: Vec<_> = ids.iter().map(|&id| view.tree().dom(id)).collect();

    edit(&mut view, vec![ChangeSpec::insert(5, "X")]);

    assert_eq!(lines(&view), ids);
    let after: Vec<_> = ids.iter().map(|&id| view.tree().dom(id)).collect();
    assert_eq!(after, doms);
    assert_eq!(rendered_text(&view), vec!["one", "tXwo", "three"]);
}

#[test]
fn line_count_changes_follow_the_document() {
    let mut view = view_of("one\ntwo\nthree");

    edit(&mut view, vec![ChangeSpec::insert(2, "\nX")]);
    assert_eq!(view.doc().as_str(), "on\nXe\ntwo\nthree");
    assert_eq!(rendered_text(&view), vec!["on", "Xe", "two", "three"]);
    assert!(view.check_invariants().is_ok());

    edit(&mut view, vec![ChangeSpec::delete(1, 9)]);
    assert_eq!(view.doc().as_str(), "o\nthree");
    assert_eq!(rendered_text(&view), vec!["o", "three"]);
    assert!(view.check_invariants().is_ok());
}

#[test]
fn adjacent_equal_marks_share_an_element_once_joined() {
    init_logging();
    let doc = Document::new("ab-cd");
    let sources = vec![DecorationSet::new([mark("x", 0, 2), mark("x", 3, 5)])];
    let mut view = DocView::with_surface(LiveSurface::new(), doc, ViewConfig::default(), sources);

    edit(&mut view, vec![ChangeSpec::delete(2, 3)]);

    assert_eq!(
        content_markup(&view),
        "<div class=\"cm-line\"><span class=\"x\">abcd</span></div>"
    );
    let line = lines(&view)[0];
    assert_eq!(view.tree().children(line).len(), 1);
    assert!(view.check_invariants().is_ok());
}

#[test]
fn block_replace_swaps_lines_for_a_widget() {
    let mut view = view_of("ab\ncd\nef\ngh");
    let before = lines(&view);
    let widget: Widget = Rc::new(NullWidget::block());
    let decorations = vec![DecorationSet::new([
        Decoration::block_replace(Some(widget)).range(3, 8),
    ])];

    assert!(view.update(ViewUpdate::unchanged(view.doc()).with_decorations(decorations)));

    let after = lines(&view);
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[3]);
    assert!(matches!(view.tree().kind(after[1]), Some(ViewKind::BlockWidget(_))));
    assert_eq!(view.tree().len(after[1]), 5);
    let widget_dom = view.tree().dom(after[1]).expect("widget is rendered");
    assert_eq!(view.surface().attr(widget_dom, "contenteditable"), Some("false"));
    assert!(view.check_invariants().is_ok());
}

#[test]
fn positions_round_trip_through_live_nodes() {
    for marked in [false, true] {
        let sources = if marked {
            vec![DecorationSet::new([mark("m", 1, 4)])]
        } else {
            Vec::new()
        };
        let view = DocView::with_surface(
            LiveSurface::new(),
            Document::new("ab\ncd"),
            ViewConfig::default(),
            sources,
        );
        for pos in 0..=5 {
            let dom = view.dom_at_pos(pos).expect("position is rendered");
            assert_eq!(view.pos_from_dom(dom.node, dom.offset).ok(), Some(pos), "pos {pos}");
        }
    }
}

#[test]
fn queries_reject_positions_outside_the_view() {
    let mut view = view_of("abc");
    assert!(matches!(
        view.dom_at_pos(4),
        Err(ViewError::PositionOutOfRange { pos: 4, len: 3 })
    ));
    assert!(view.coords_at(9, 1).is_err());

    let stray = view.surface_mut().create_element("div");
    let root = view.surface().root();
    view.surface_mut().append(root, stray);
    assert!(matches!(
        view.pos_from_dom(stray, 0),
        Err(ViewError::PositionOutsideView)
    ));
}

#[test]
fn selection_is_written_once_while_focused() {
    let mut view = view_of("ab\ncd");
    view.surface_mut().set_focus_state(FocusState::Content);
    let writes = view.surface().stats().selection_writes;

    let update = ViewUpdate::unchanged(view.doc()).with_selection(EditorSelection::cursor(4));
    assert!(!view.update(update));
    assert_eq!(view.surface().stats().selection_writes, writes + 1);

    view.update(ViewUpdate::unchanged(view.doc()));
    view.update_selection(false);
    assert_eq!(view.surface().stats().selection_writes, writes + 1);
    assert_eq!(view.read_selection(), Some(SelectionRange::range(4, 4)));
}

#[test]
fn selection_is_left_alone_without_focus() {
    let mut view = view_of("ab");
    let update = ViewUpdate::unchanged(view.doc()).with_selection(EditorSelection::cursor(1));
    view.update(update);
    assert_eq!(view.surface().stats().selection_writes, 0);
    assert!(view.surface().selection().is_none());
}

#[test]
fn host_selection_maps_back_to_positions() {
    let mut view = view_of("ab\ncd");
    view.surface_mut().set_focus_state(FocusState::Content);
    let update = ViewUpdate::unchanged(view.doc())
        .with_selection(EditorSelection::single(SelectionRange::range(1, 4)));
    view.update(update);
    assert_eq!(view.read_selection(), Some(SelectionRange::range(1, 4)));

    let second = line_dom(&view, 1);
    let text = view.surface().first_child(second).expect("line has text");
    view.surface_mut().collapse(LivePoint { node: text, offset: 2 });
    assert_eq!(view.read_selection(), Some(SelectionRange::range(5, 5)));
}

#[test]
fn caret_between_uneditable_nodes_gets_a_text_anchor() {
    init_logging();
    let widget: Widget = Rc::new(NullWidget::inline());
    let sources = vec![DecorationSet::new([Decoration::replace(Some(widget)).range(1, 2)])];
    let config = ViewConfig::default().with_capabilities(HostCapabilities {
        reset_next_to_uneditable: true,
        ..Default::default()
    });
    let mut view = DocView::with_surface(LiveSurface::new(), Document::new("ab"), config, sources);
    view.surface_mut().set_focus_state(FocusState::Content);
    let writes = view.surface().stats().selection_writes;

    let update = ViewUpdate::unchanged(view.doc()).with_selection(EditorSelection::cursor(2));
    assert!(!view.update(update));

    let native = *view.surface().selection().expect("selection was written");
    let anchor = native.anchor.node;
    assert!(view.surface().is_text(anchor));
    assert_eq!(view.surface().text(anchor), Some(""));
    assert_eq!(view.surface().parent(anchor), Some(line_dom(&view, 0)));
    assert_eq!(view.surface().stats().selection_writes, writes + 1);
}

#[test]
fn composition_keeps_the_host_text_node() {
    let mut view = view_of("abc");
    let line = lines(&view)[0];
    let line_node = line_dom(&view, 0);
    let text = view.surface().first_child(line_node).expect("line has text");

    let surface = view.surface_mut();
    surface.set_composing(true);
    surface.set_text(text, "abXc");
    surface.collapse(LivePoint { node: text, offset: 3 });

    edit(&mut view, vec![ChangeSpec::insert(2, "X")]);

    assert_eq!(lines(&view), vec![line]);
    assert_eq!(view.surface().first_child(line_node), Some(text));
    assert_eq!(view.surface().text(text), Some("abXc"));
    let first = view.tree().children(line)[0];
    match view.tree().kind(first) {
        Some(ViewKind::Composition(data)) => {
            let widget = data
                .widget
                .downcast_ref::<CompositionWidget>()
                .expect("composition widget");
            assert_eq!(widget.text, text);
        }
        other => panic!("expected a composition view, got {other:?}"),
    }
    assert!(view.check_invariants().is_ok());

    view.surface_mut().set_composing(false);
    view.update(ViewUpdate::unchanged(view.doc()));
    assert_eq!(view.surface().text_content(line_node), "abXc");
    assert!(view.check_invariants().is_ok());
}

#[test]
fn mismatched_change_set_rebuilds_the_content() {
    let mut view = view_of("abc");
    let other = Document::new("abcdef");
    let changes = ChangeSet::of(6, [ChangeSpec::insert(6, "!")]).expect("valid change set");
    let update = ViewUpdate::new(&other, changes).expect("fits the other document");

    assert!(view.update(update));
    assert_eq!(view.doc().as_str(), "abcdef!");
    assert_eq!(rendered_text(&view), vec!["abcdef!"]);
    assert!(view.check_invariants().is_ok());
}

#[test]
fn lines_outside_the_viewport_become_gaps() {
    let mut view = view_of("a\nb\nc\nd\ne");
    let update = ViewUpdate::unchanged(view.doc())
        .with_selection(EditorSelection::cursor(4))
        .with_viewport(4, 4);
    assert!(view.update(update));

    assert_eq!(view.viewport(), Viewport { from: 4, to: 5 });
    let children = lines(&view);
    assert_eq!(children.len(), 3);
    assert!(matches!(view.tree().kind(children[0]), Some(ViewKind::BlockWidget(_))));
    assert!(matches!(view.tree().kind(children[2]), Some(ViewKind::BlockWidget(_))));
    assert_eq!(view.surface().text_content(line_dom(&view, 1)), "c");
    let gap = view.tree().dom(children[0]).expect("gap is rendered");
    assert_eq!(view.surface().attr(gap, "style"), Some("height: 32px"));
    assert!(view.check_invariants().is_ok());
}

#[test]
fn min_width_survives_edits_elsewhere() {
    let mut view = view_of("abc\ndef");
    view.set_min_width(120.0, 0, 3);

    edit(&mut view, vec![ChangeSpec::insert(6, "x")]);
    assert_eq!(view.min_width(), 120.0);
    assert_eq!(
        view.surface().attr(view.content_dom(), "style"),
        Some("min-width: 120px")
    );

    edit(&mut view, vec![ChangeSpec::insert(1, "y")]);
    assert_eq!(view.min_width(), 0.0);
    assert_eq!(view.surface().attr(view.content_dom(), "style"), None);
}

#[test]
fn cursor_at_a_soft_wrap_is_nudged_to_its_side() {
    let config = ViewConfig::default().with_capabilities(HostCapabilities {
        selection_modify: true,
        ..Default::default()
    });
    let mut view = DocView::new(Document::new("abcdef"), config);
    view.set_measure(Box::new(MonospaceMeasure {
        wrap_column: Some(3),
        ..Default::default()
    }));

    let changes = ChangeSet::of(6, [ChangeSpec::insert(6, "g")]).expect("valid change set");
    let cursor = SelectionRange::cursor(3).with_assoc(-1);
    let update = ViewUpdate::new(view.doc(), changes)
        .expect("change set fits the document")
        .with_selection(EditorSelection::single(cursor));
    assert!(view.update(update));

    assert_eq!(view.surface().nudges(), &[crate::surface::NudgeDirection::Forward]);
    let native = view.surface().selection().expect("cursor was placed");
    assert_eq!(view.pos_from_dom(native.anchor.node, native.anchor.offset).ok(), Some(2));
}

#[test]
fn coordinates_come_from_the_measure() {
    let view = view_of("ab\ncd");
    assert_eq!(view.coords_at(0, 1).ok().flatten(), Some(Rect::new(0.0, 0.0, 0.0, 16.0)));
    assert_eq!(view.coords_at(4, -1).ok().flatten(), Some(Rect::new(8.0, 16.0, 8.0, 32.0)));

    let margins = [ScrollMargins {
        top: Some(4.0),
        ..Default::default()
    }];
    let request = view
        .scroll_into_view(SelectionRange::range(1, 4), &margins)
        .expect("range is rendered");
    assert_eq!(request.rect, Rect::new(0.0, -4.0, 16.0, 32.0));
    assert_eq!(request.bias, 1);
}

fn fresh_markup(view: &DocView) -> String {
    let fresh = DocView::with_surface(
        LiveSurface::new(),
        view.doc().clone(),
        ViewConfig::default(),
        view.sources.clone(),
    );
    content_markup(&fresh)
}

#[test]
fn removing_a_widget_at_the_end_of_a_line() {
    for side in [1, -1] {
        let widget: Widget = Rc::new(NullWidget::inline());
        let sources = vec![DecorationSet::new([Decoration::widget(widget, side).point(2)])];
        let mut view =
            DocView::with_surface(LiveSurface::new(), Document::new("aa"), ViewConfig::default(), sources);

        assert!(view.update(ViewUpdate::unchanged(view.doc()).with_decorations(Vec::new())));

        assert_eq!(content_markup(&view), "<div class=\"cm-line\">aa</div>", "side {side}");
        assert_eq!(content_markup(&view), fresh_markup(&view), "side {side}");
        assert!(view.check_invariants().is_ok());
    }
}

#[test]
fn deleting_the_marked_tail_of_a_line_drops_the_mark() {
    init_logging();
    let sources = vec![DecorationSet::new([mark("y", 1, 2)])];
    let mut view =
        DocView::with_surface(LiveSurface::new(), Document::new("ab"), ViewConfig::default(), sources);

    edit(&mut view, vec![ChangeSpec::delete(1, 2)]);

    assert_eq!(content_markup(&view), "<div class=\"cm-line\">a</div>");
    assert_eq!(content_markup(&view), fresh_markup(&view));
}

#[test]
fn clearing_a_line_leaves_a_placeholder_break() {
    let mut view = view_of("a\nb");
    let line = lines(&view)[0];

    edit(&mut view, vec![ChangeSpec::delete(0, 1)]);

    assert_eq!(lines(&view)[0], line);
    assert!(view.tree().children(line).is_empty());
    assert_eq!(
        content_markup(&view),
        "<div class=\"cm-line\"><br></br></div><div class=\"cm-line\">b</div>"
    );
    assert!(view.check_invariants().is_ok());
}

#[test]
fn block_replace_over_a_line_of_zero_length_views() {
    init_logging();
    let widget: Widget = Rc::new(NullWidget::inline());
    let sources = vec![DecorationSet::new([Decoration::widget(widget, 1).point(0)])];
    let mut view =
        DocView::with_surface(LiveSurface::new(), Document::new(""), ViewConfig::default(), sources);

    let block: Widget = Rc::new(NullWidget::block());
    let decorations = vec![DecorationSet::new([Decoration::block_replace(Some(block)).range(0, 0)])];
    assert!(view.update(ViewUpdate::unchanged(view.doc()).with_decorations(decorations)));

    let children = lines(&view);
    assert_eq!(children.len(), 1);
    assert!(matches!(view.tree().kind(children[0]), Some(ViewKind::BlockWidget(_))));
    assert_eq!(content_markup(&view), fresh_markup(&view));
    assert!(view.check_invariants().is_ok());
}

#[test]
fn read_only_view_syncs_a_selection_that_starts_inside_it() {
    let config = ViewConfig::default().with_editable(false);
    let mut view = DocView::new(Document::new("ab\ncd"), config);
    view.update(ViewUpdate::unchanged(view.doc()).with_selection(EditorSelection::cursor(1)));
    assert!(view.surface().selection().is_none());

    let text = view.surface().first_child(line_dom(&view, 1)).expect("line has text");
    view.surface_mut().collapse(LivePoint { node: text, offset: 0 });
    let writes = view.surface().stats().selection_writes;

    let update = ViewUpdate::unchanged(view.doc()).with_selection(EditorSelection::cursor(1));
    assert!(!view.update(update));
    assert_eq!(view.surface().stats().selection_writes, writes + 1);
    assert_eq!(view.read_selection(), Some(SelectionRange::range(1, 1)));
}

#[test]
fn composition_overlay_is_kept_until_an_update_carries_a_transaction() {
    let mut view = view_of("abc");
    let text = view.surface().first_child(line_dom(&view, 0)).expect("line has text");
    let surface = view.surface_mut();
    surface.set_composing(true);
    surface.set_text(text, "abXc");
    surface.collapse(LivePoint { node: text, offset: 3 });
    edit(&mut view, vec![ChangeSpec::insert(2, "X")]);
    let overlay = view.composition_deco.clone();
    assert!(!overlay.is_empty());

    // The host text no longer matches; only a recomputation would notice.
    view.surface_mut().set_text(text, "qqqq");
    view.update(ViewUpdate::unchanged(view.doc()));
    assert!(view.composition_deco.ptr_eq(&overlay));

    let update = ViewUpdate::unchanged(view.doc()).with_selection(EditorSelection::cursor(3));
    view.update(update);
    assert!(view.composition_deco.is_empty());
}

#[test]
fn wide_lines_raise_the_minimum_width() {
    let mut view = view_of("ab\ncdefghij");

    assert_eq!(view.measure_visible_line_heights(40.0), vec![16.0, 16.0]);
    assert_eq!(view.min_width(), 64.0);

    edit(&mut view, vec![ChangeSpec::insert(0, "z")]);
    assert_eq!(view.min_width(), 64.0);
    assert_eq!(
        view.surface().attr(view.content_dom(), "style"),
        Some("min-width: 64px")
    );

    edit(&mut view, vec![ChangeSpec::insert(6, "z")]);
    assert_eq!(view.min_width(), 0.0);
}

#[test]
fn text_size_comes_from_a_short_plain_line() {
    let mut view = view_of("abcd");
    assert_eq!(
        view.measure_text_size(),
        TextSize {
            line_height: 16.0,
            char_width: 8.0
        }
    );
}

#[test]
fn text_size_falls_back_to_a_sample_line() {
    let mut view = view_of("");
    view.set_measure(Box::new(MonospaceMeasure {
        char_width: 6.0,
        line_height: 20.0,
        ..Default::default()
    }));
    let before = content_markup(&view);

    assert_eq!(
        view.measure_text_size(),
        TextSize {
            line_height: 20.0,
            char_width: 6.0
        }
    );
    assert_eq!(content_markup(&view), before);
}

#[test]
fn reset_rewrites_nodes_the_host_changed() {
    let mut view = view_of("abc");
    let text = view.surface().first_child(line_dom(&view, 0)).expect("line has text");
    view.surface_mut().set_text(text, "abXc");

    assert!(view.mark_dom_changed(text));
    view.reset(false);

    assert_eq!(view.surface().text(text), Some("abc"));
    assert!(view.tree().dirty(view.tree().root()).is_empty());
    let stray = view.surface_mut().create_element("div");
    assert!(!view.mark_dom_changed(stray));
}

/// Deterministic generator for the randomized editing session.
struct Lcg(u64);

impl Lcg {
    fn below(&mut self, n: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.0 >> 33) % n as u64) as usize
    }
}

type Run = (Vec<String>, String);

/// Per line, the text runs with the set of classes styling them and any
/// `<br>` placeholders. Ignores how runs are split into nodes and in what
/// order marks nest.
fn rendering(view: &DocView) -> Vec<Vec<Run>> {
    fn collect(surface: &LiveSurface, node: NodeId, classes: &mut Vec<String>, runs: &mut Vec<Run>) {
        for child in surface.children(node) {
            if let Some(text) = surface.text(child) {
                if text.is_empty() {
                    continue;
                }
                let mut key = classes.clone();
                key.sort();
                match runs.last_mut() {
                    Some((last, run)) if *last == key => run.push_str(text),
                    _ => runs.push((key, text.to_string())),
                }
            } else if surface.tag(child) == Some("br") {
                runs.push((Vec::new(), "<br>".to_string()));
            } else {
                classes.push(surface.attr(child, "class").unwrap_or_default().to_string());
                collect(surface, child, classes, runs);
                classes.pop();
            }
        }
    }
    let surface = view.surface();
    surface
        .children(view.content_dom())
        .into_iter()
        .map(|line| {
            let mut runs = Vec::new();
            collect(surface, line, &mut Vec::new(), &mut runs);
            runs
        })
        .collect()
}

fn random_marks(rng: &mut Lcg, len: usize) -> Vec<DecorationSet> {
    let mut marks = Vec::new();
    for _ in 0..rng.below(4) {
        let from = rng.below(len + 1);
        let to = (from + 1 + rng.below(5)).min(len);
        if from < to {
            marks.push(mark(["x", "y"][rng.below(2)], from, to));
        }
    }
    vec![DecorationSet::new(marks)]
}

#[test]
fn random_edits_render_like_a_fresh_view() {
    init_logging();
    for seed in [1, 7, 42] {
        let mut rng = Lcg(seed);
        let doc = Document::new("ab\ncd ef\n\ngh");
        let sources = random_marks(&mut rng, doc.len());
        let mut view = DocView::with_surface(LiveSurface::new(), doc, ViewConfig::default(), sources);
        for step in 0..150 {
            let len = view.doc().len();
            let from = rng.below(len + 1);
            let to = (from + rng.below(4)).min(len);
            let insert: String = (0..rng.below(3)).map(|_| ['a', 'b', '\n'][rng.below(3)]).collect();
            let changes = ChangeSet::of(len, [ChangeSpec::new(from, to, &insert)])
                .expect("valid change set");
            let mut update = ViewUpdate::new(view.doc(), changes).expect("change set fits the document");
            if rng.below(3) == 0 {
                let new_len = update.doc().len();
                update = update.with_decorations(random_marks(&mut rng, new_len));
            }
            view.update(update);

            assert!(view.check_invariants().is_ok(), "seed {seed} step {step}");
            let fresh = DocView::with_surface(
                LiveSurface::new(),
                view.doc().clone(),
                ViewConfig::default(),
                view.sources.clone(),
            );
            assert_eq!(rendering(&view), rendering(&fresh), "seed {seed} step {step}");
        }
    }
}
