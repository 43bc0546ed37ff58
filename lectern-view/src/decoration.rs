//! Decorations, decoration sets and the span iteration that drives content
//! building.
//!
//! ## Usage
//!
//! A decoration snapshot is an ordered slice of [`DecorationSet`]s; sets
//! earlier in the slice take precedence. [`compare_snapshots`] yields the
//! ranges whose rendering differs between two snapshots and [`spans`] walks
//! a range of a snapshot as text segments and points.

use std::{collections::BTreeMap, rc::Rc};

use rustc_hash::FxHashMap as HashMap;

use crate::{
    text::{ChangeSet, ChangedRange},
    widget::{Widget, widgets_equal},
};

/// Attributes of a rendered element.
pub type Attrs = BTreeMap<String, String>;

/// Merges `source` into `target`, joining `class` and `style` values.
pub fn combine_attrs(source: &Attrs, target: &mut Attrs) {
    for (name, value) in source {
        match (name.as_str(), target.get_mut(name)) {
            ("class", Some(existing)) => {
                existing.push(' ');
                existing.push_str(value);
            }
            ("style", Some(existing)) => {
                existing.push(';');
                existing.push_str(value);
            }
            _ => {
                target.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Side values ordering decoration boundaries that share a position.
pub(crate) mod side {
    pub const NON_INC_END: i64 = -600_000_000;
    pub const BLOCK_BEFORE: i64 = -400_000_000;
    pub const BLOCK_INC_START: i64 = -300_000_000;
    pub const LINE: i64 = -200_000_000;
    pub const INLINE_BEFORE: i64 = -100_000_000;
    pub const INLINE_INC_START: i64 = -1;
    pub const INLINE_INC_END: i64 = 1;
    pub const INLINE_AFTER: i64 = 100_000_000;
    pub const BLOCK_INC_END: i64 = 200_000_000;
    pub const BLOCK_AFTER: i64 = 300_000_000;
    pub const NON_INC_START: i64 = 500_000_000;
}

const MAX_WIDGET_SIDE: i32 = 10_000;

/// Styling applied to a range of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkDecoration {
    /// Tag of the wrapping element.
    pub tag: String,
    pub class: Option<String>,
    pub attrs: Attrs,
    /// Whether text inserted at the start of the range is covered.
    pub inclusive_start: bool,
    /// Whether text inserted at the end of the range is covered.
    pub inclusive_end: bool,
}

impl Default for MarkDecoration {
    fn default() -> Self {
        Self {
            tag: "span".to_string(),
            class: None,
            attrs: Attrs::new(),
            inclusive_start: false,
            inclusive_end: false,
        }
    }
}

impl MarkDecoration {
    pub fn with_class(class: &str) -> Self {
        Self {
            class: Some(class.to_string()),
            ..Default::default()
        }
    }

    /// Whether two marks render identically and may share an element.
    pub fn same_style(&self, other: &MarkDecoration) -> bool {
        self.tag == other.tag && self.class == other.class && self.attrs == other.attrs
    }
}

/// Attributes added to the line element of the line a decoration starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDecoration {
    pub class: Option<String>,
    pub attrs: Attrs,
}

/// A widget inserted at a position.
#[derive(Debug, Clone)]
pub struct WidgetDecoration {
    pub widget: Widget,
    /// Placement relative to content at the same position: negative before,
    /// positive after.
    pub side: i32,
    /// Whether the widget is drawn as its own block.
    pub block: bool,
}

/// Content hidden, and optionally replaced by a widget.
#[derive(Debug, Clone)]
pub struct ReplaceDecoration {
    pub widget: Option<Widget>,
    pub block: bool,
    pub inclusive_start: bool,
    pub inclusive_end: bool,
}

/// Position of a block widget relative to the lines around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    WidgetBefore,
    WidgetAfter,
    WidgetRange,
}

#[derive(Debug, Clone)]
pub enum Decoration {
    Mark(Rc<MarkDecoration>),
    Widget(WidgetDecoration),
    Replace(ReplaceDecoration),
    Line(Rc<LineDecoration>),
}

impl Decoration {
    pub fn mark(mark: MarkDecoration) -> Self {
        Self::Mark(Rc::new(mark))
    }

    pub fn widget(widget: Widget, side: i32) -> Self {
        Self::Widget(WidgetDecoration {
            widget,
            side: side.clamp(-MAX_WIDGET_SIDE, MAX_WIDGET_SIDE),
            block: false,
        })
    }

    pub fn block_widget(widget: Widget, side: i32) -> Self {
        Self::Widget(WidgetDecoration {
            widget,
            side: side.clamp(-MAX_WIDGET_SIDE, MAX_WIDGET_SIDE),
            block: true,
        })
    }

    /// An inline replace decoration, exclusive at both ends.
    pub fn replace(widget: Option<Widget>) -> Self {
        Self::Replace(ReplaceDecoration {
            widget,
            block: false,
            inclusive_start: false,
            inclusive_end: false,
        })
    }

    /// A block replace decoration, inclusive at both ends.
    pub fn block_replace(widget: Option<Widget>) -> Self {
        Self::Replace(ReplaceDecoration {
            widget,
            block: true,
            inclusive_start: true,
            inclusive_end: true,
        })
    }

    pub fn line(line: LineDecoration) -> Self {
        Self::Line(Rc::new(line))
    }

    pub fn range(self, from: usize, to: usize) -> DecoRange {
        DecoRange {
            from,
            to,
            deco: self,
        }
    }

    pub fn point(self, at: usize) -> DecoRange {
        self.range(at, at)
    }

    pub fn start_side(&self) -> i64 {
        match self {
            Decoration::Mark(mark) => {
                if mark.inclusive_start {
                    side::INLINE_INC_START
                } else {
                    side::NON_INC_START
                }
            }
            Decoration::Widget(w) => widget_side(w),
            Decoration::Replace(r) => match (r.inclusive_start, r.block) {
                (true, true) => side::BLOCK_INC_START,
                (true, false) => side::INLINE_INC_START,
                (false, _) => side::NON_INC_START,
            },
            Decoration::Line(_) => side::LINE,
        }
    }

    pub fn end_side(&self) -> i64 {
        match self {
            Decoration::Mark(mark) => {
                if mark.inclusive_end {
                    side::INLINE_INC_END
                } else {
                    side::NON_INC_END
                }
            }
            Decoration::Widget(w) => widget_side(w),
            Decoration::Replace(r) => match (r.inclusive_end, r.block) {
                (true, true) => side::BLOCK_INC_END,
                (true, false) => side::INLINE_INC_END,
                (false, _) => side::NON_INC_END,
            },
            Decoration::Line(_) => side::LINE,
        }
    }

    /// Whether the decoration is block-level.
    pub fn is_block(&self) -> bool {
        match self {
            Decoration::Widget(w) => w.block,
            Decoration::Replace(r) => r.block,
            _ => false,
        }
    }

    pub(crate) fn block_type(&self) -> Option<BlockType> {
        match self {
            Decoration::Widget(w) if w.block => Some(if w.side > 0 {
                BlockType::WidgetAfter
            } else {
                BlockType::WidgetBefore
            }),
            Decoration::Replace(r) if r.block => Some(BlockType::WidgetRange),
            _ => None,
        }
    }

    pub(crate) fn widget_handle(&self) -> Option<&Widget> {
        match self {
            Decoration::Widget(w) => Some(&w.widget),
            Decoration::Replace(r) => r.widget.as_ref(),
            _ => None,
        }
    }

    /// Whether two decorations render the same way.
    pub fn same_rendering(&self, other: &Decoration) -> bool {
        match (self, other) {
            (Decoration::Mark(a), Decoration::Mark(b)) => Rc::ptr_eq(a, b) || a.same_style(b),
            (Decoration::Widget(a), Decoration::Widget(b)) => {
                a.side == b.side && a.block == b.block && widgets_equal(&a.widget, &b.widget)
            }
            (Decoration::Replace(a), Decoration::Replace(b)) => {
                a.block == b.block
                    && a.inclusive_start == b.inclusive_start
                    && a.inclusive_end == b.inclusive_end
                    && match (&a.widget, &b.widget) {
                        (Some(a), Some(b)) => widgets_equal(a, b),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (Decoration::Line(a), Decoration::Line(b)) => a == b,
            _ => false,
        }
    }
}

fn widget_side(w: &WidgetDecoration) -> i64 {
    let base = match (w.block, w.side > 0) {
        (true, true) => side::BLOCK_AFTER,
        (true, false) => side::BLOCK_BEFORE,
        (false, true) => side::INLINE_AFTER,
        (false, false) => side::INLINE_BEFORE,
    };
    base + i64::from(w.side)
}

/// A decoration applied to `from..to`.
#[derive(Debug, Clone)]
pub struct DecoRange {
    pub from: usize,
    pub to: usize,
    pub deco: Decoration,
}

impl DecoRange {
    fn is_point(&self) -> bool {
        !matches!(self.deco, Decoration::Mark(_))
    }
}

/// An immutable, sorted collection of decorated ranges.
#[derive(Debug, Clone)]
pub struct DecorationSet {
    ranges: Rc<[DecoRange]>,
}

impl Default for DecorationSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self {
            ranges: Rc::from(Vec::new()),
        }
    }

    /// Builds a set, sorting the ranges and dropping empty marks and
    /// inverted ranges.
    pub fn new(ranges: impl IntoIterator<Item = DecoRange>) -> Self {
        let mut ranges: Vec<DecoRange> = ranges
            .into_iter()
            .filter(|r| r.from <= r.to && (r.is_point() || r.from < r.to))
            .collect();
        ranges.sort_by_key(|r| (r.from, r.deco.start_side()));
        Self {
            ranges: Rc::from(ranges),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecoRange> {
        self.ranges.iter()
    }

    pub fn ptr_eq(&self, other: &DecorationSet) -> bool {
        Rc::ptr_eq(&self.ranges, &other.ranges)
    }

    /// Maps every range through `changes`, dropping ranges that collapse.
    pub fn map(&self, changes: &ChangeSet) -> Self {
        if changes.is_empty() {
            return self.clone();
        }
        let mapped = self.ranges.iter().filter_map(|r| {
            let start_side = r.deco.start_side();
            let end_side = r.deco.end_side();
            let from = changes.map_pos(r.from, start_side.signum() as i32);
            let to = changes.map_pos(r.to, end_side.signum() as i32);
            if from > to || (from == to && start_side > 0 && end_side <= 0) {
                return None;
            }
            Some(DecoRange {
                from,
                to,
                deco: r.deco.clone(),
            })
        });
        Self::new(mapped)
    }
}

/// Adds `from..to` to a sorted list of ranges, joining touching entries.
pub(crate) fn add_range(from: usize, to: usize, ranges: &mut Vec<(usize, usize)>) {
    match ranges.last_mut() {
        Some(last) if last.1 >= from => {
            last.0 = last.0.min(from);
            last.1 = last.1.max(to);
        }
        _ => ranges.push((from, to)),
    }
}

fn merge_ranges(mut ranges: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    ranges.sort_unstable();
    let mut out = Vec::with_capacity(ranges.len());
    for (from, to) in ranges {
        add_range(from, to, &mut out);
    }
    out
}

struct MarkSpan {
    from: usize,
    to: usize,
    start_side: i64,
    end_side: i64,
    mark: Rc<MarkDecoration>,
    rank: usize,
    id: usize,
}

/// Mark spans of a snapshot that touch `from..=to`.
fn collect_marks(sets: &[DecorationSet], from: usize, to: usize) -> Vec<MarkSpan> {
    let mut out = Vec::new();
    for (rank, set) in sets.iter().enumerate() {
        for range in set.iter() {
            if let Decoration::Mark(mark) = &range.deco {
                if range.from <= to && range.to >= from {
                    out.push(MarkSpan {
                        from: range.from,
                        to: range.to,
                        start_side: range.deco.start_side(),
                        end_side: range.deco.end_side(),
                        mark: mark.clone(),
                        rank,
                        id: out.len(),
                    });
                }
            }
        }
    }
    out
}

/// Sorts marks outermost first.
fn nest_order(active: &mut [&MarkSpan]) {
    active.sort_by(|a, b| {
        b.to.cmp(&a.to)
            .then(a.from.cmp(&b.from))
            .then(a.rank.cmp(&b.rank))
            .then(a.id.cmp(&b.id))
    });
}

fn covering<'a>(marks: &'a [MarkSpan], from: usize, to: usize) -> Vec<&'a MarkSpan> {
    let mut active: Vec<&MarkSpan> = marks
        .iter()
        .filter(|m| m.from <= from && m.to >= to)
        .collect();
    nest_order(&mut active);
    active
}

/// Stretches of the new document that `changes` leaves alone, as closed
/// intervals.
fn unchanged_gaps(changes: &ChangeSet) -> Vec<(usize, usize)> {
    if changes.is_empty() {
        return vec![(0, usize::MAX)];
    }
    let mut gaps = Vec::new();
    let mut pos = 0;
    for range in changes.changed_ranges() {
        if range.from_b > pos {
            gaps.push((pos, range.from_b));
        }
        pos = range.to_b;
    }
    if changes.new_len() > pos {
        gaps.push((pos, changes.new_len()));
    }
    gaps
}

/// Whether `from..to` lies entirely inside one changed region. Such ranges
/// are rebuilt with the change and need no comparison.
fn inside_change(changed: &[ChangedRange], from: usize, to: usize) -> bool {
    let i = changed.partition_point(|r| r.to_b < to);
    changed.get(i).is_some_and(|r| r.from_b <= from)
}

/// Cuts sorted ranges down to the parts that fall inside `gaps`.
fn clip_to_gaps(ranges: Vec<(usize, usize)>, gaps: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(ranges.len());
    for (from, to) in ranges {
        let first = gaps.partition_point(|g| g.1 < from);
        for &(gap_from, gap_to) in &gaps[first..] {
            if gap_from > to {
                break;
            }
            let (f, t) = (from.max(gap_from), to.min(gap_to));
            if f < t || from == to {
                add_range(f, t, &mut out);
            }
        }
    }
    out
}

/// Mark coverage of one snapshot, advanced boundary by boundary.
struct MarkSweep {
    marks: Vec<MarkSpan>,
    next: usize,
    active: Vec<usize>,
}

impl MarkSweep {
    fn new(mut marks: Vec<MarkSpan>) -> Self {
        marks.sort_by_key(|m| m.from);
        Self {
            marks,
            next: 0,
            active: Vec::new(),
        }
    }

    /// Moves to `pos`, which must not be below the previous position, and
    /// returns the styles of the marks covering the text right after it,
    /// outermost first.
    fn advance(&mut self, pos: usize) -> Vec<&MarkSpan> {
        let marks = &self.marks;
        self.active.retain(|&i| marks[i].to > pos);
        while let Some(mark) = marks.get(self.next).filter(|m| m.from <= pos) {
            if mark.to > pos {
                self.active.push(self.next);
            }
            self.next += 1;
        }
        let mut active: Vec<&MarkSpan> = self.active.iter().map(|&i| &marks[i]).collect();
        nest_order(&mut active);
        active
    }
}

/// Compares two snapshots after mapping `old` through `changes`. Returns the
/// sorted, joined ranges (in new document positions) whose rendering
/// differs. Only the parts of the document outside the changed regions are
/// compared.
pub fn compare_snapshots(
    old: &[DecorationSet],
    new: &[DecorationSet],
    changes: &ChangeSet,
) -> Vec<(usize, usize)> {
    if changes.is_empty()
        && old.len() == new.len()
        && old.iter().zip(new).all(|(a, b)| a.ptr_eq(b))
    {
        return Vec::new();
    }
    let changed = changes.changed_ranges();
    let gaps = unchanged_gaps(changes);
    let old: Vec<DecorationSet> = old.iter().map(|set| set.map(changes)).collect();
    let mut ranges = Vec::new();

    type PointGroup<'a> = (Vec<(i64, &'a Decoration)>, Vec<(i64, &'a Decoration)>);
    let mut points: HashMap<(usize, usize), PointGroup<'_>> = HashMap::default();
    let mut marks: [Vec<MarkSpan>; 2] = Default::default();
    for (sets, is_new) in [(&old[..], false), (new, true)] {
        for (rank, set) in sets.iter().enumerate() {
            for range in set.iter() {
                if inside_change(&changed, range.from, range.to) {
                    continue;
                }
                match &range.deco {
                    Decoration::Mark(mark) => {
                        let list = &mut marks[usize::from(is_new)];
                        list.push(MarkSpan {
                            from: range.from,
                            to: range.to,
                            start_side: range.deco.start_side(),
                            end_side: range.deco.end_side(),
                            mark: mark.clone(),
                            rank,
                            id: list.len(),
                        });
                    }
                    deco => {
                        let group = points.entry((range.from, range.to)).or_default();
                        let list = if is_new { &mut group.1 } else { &mut group.0 };
                        list.push((deco.start_side(), deco));
                    }
                }
            }
        }
    }
    for ((from, to), (mut a, mut b)) in points {
        a.sort_by_key(|(side, _)| *side);
        b.sort_by_key(|(side, _)| *side);
        let same = a.len() == b.len()
            && a.iter()
                .zip(&b)
                .all(|((_, x), (_, y))| x.same_rendering(y));
        if !same {
            ranges.push((from, to));
        }
    }

    let [old_marks, new_marks] = marks;
    let mut bounds: Vec<usize> = old_marks
        .iter()
        .chain(&new_marks)
        .flat_map(|m| [m.from, m.to])
        .collect();
    bounds.sort_unstable();
    bounds.dedup();
    let mut old_sweep = MarkSweep::new(old_marks);
    let mut new_sweep = MarkSweep::new(new_marks);
    for pair in bounds.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let a = old_sweep.advance(from);
        let b = new_sweep.advance(from);
        let same = a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.mark.same_style(&y.mark));
        if !same {
            ranges.push((from, to));
        }
    }
    clip_to_gaps(merge_ranges(ranges), &gaps)
}

/// Receiver of [`spans`] events.
pub trait SpanIterator {
    /// Text between `from` and `to` covered by `active` marks, outermost
    /// first. `open_start` counts the leading marks continuing from the
    /// previous event.
    fn span(&mut self, from: usize, to: usize, active: &[Rc<MarkDecoration>], open_start: usize);

    /// A point decoration, or a replaced range, clipped to the iterated
    /// range. `index` is the rank of the set the decoration came from.
    fn point(
        &mut self,
        from: usize,
        to: usize,
        deco: &Decoration,
        active: &[Rc<MarkDecoration>],
        open_start: usize,
        index: usize,
    );
}

struct PointSpan<'a> {
    from: usize,
    to: usize,
    start_side: i64,
    end_side: i64,
    deco: &'a Decoration,
    rank: usize,
}

fn shared_open(prev: &[&MarkSpan], next: &[&MarkSpan], at: usize) -> usize {
    prev.iter()
        .zip(next)
        .take_while(|(p, n)| {
            p.id == n.id || (p.to == at && n.from == at && p.mark.same_style(&n.mark))
        })
        .count()
}

fn styles(active: &[&MarkSpan]) -> Vec<Rc<MarkDecoration>> {
    active.iter().map(|m| m.mark.clone()).collect()
}

struct SpanWalk<'a, I> {
    marks: &'a [MarkSpan],
    iter: &'a mut I,
    prev: Vec<&'a MarkSpan>,
}

impl<'a, I: SpanIterator> SpanWalk<'a, I> {
    fn text(&mut self, from: usize, to: usize) {
        if from >= to {
            return;
        }
        let mut cuts: Vec<usize> = self
            .marks
            .iter()
            .flat_map(|m| [m.from, m.to])
            .filter(|p| *p > from && *p < to)
            .collect();
        cuts.push(to);
        cuts.sort_unstable();
        cuts.dedup();
        let mut pos = from;
        for cut in cuts {
            let active = covering(self.marks, pos, cut);
            let open = shared_open(&self.prev, &active, pos);
            self.iter.span(pos, cut, &styles(&active), open);
            self.prev = active;
            pos = cut;
        }
    }

    fn point_active(&self, point: &PointSpan<'_>) -> Vec<&'a MarkSpan> {
        let mut active: Vec<&MarkSpan> = self
            .marks
            .iter()
            .filter(|m| {
                (m.from, m.start_side) <= (point.from, point.start_side)
                    && (m.to, m.end_side) >= (point.to, point.end_side)
            })
            .collect();
        nest_order(&mut active);
        active
    }
}

fn point_in_range(range: &DecoRange, from: usize, to: usize) -> bool {
    if range.from == range.to {
        range.from >= from && range.from <= to
    } else {
        (range.from < to && range.to > from)
            || (from == to && range.from < from && range.to > from)
    }
}

/// Walks `from..to` of a decoration snapshot, reporting text segments with
/// constant mark coverage and the visible point decorations, in document
/// order. Returns the number of marks open at `to`, plus one when a point
/// decoration extends past it.
pub fn spans<I: SpanIterator>(sets: &[DecorationSet], from: usize, to: usize, iter: &mut I) -> usize {
    let marks = collect_marks(sets, from, to);
    let mut points: Vec<PointSpan<'_>> = Vec::new();
    for (rank, set) in sets.iter().enumerate() {
        for range in set.iter().filter(|r| r.is_point()) {
            if point_in_range(range, from, to) {
                points.push(PointSpan {
                    from: range.from,
                    to: range.to,
                    start_side: range.deco.start_side(),
                    end_side: range.deco.end_side(),
                    deco: &range.deco,
                    rank,
                });
            }
        }
    }
    points.sort_by_key(|p| (p.from, p.start_side, p.rank));

    // A replaced range hides every point that starts inside it.
    let mut visible = Vec::with_capacity(points.len());
    let mut covered_until: Option<(usize, i64)> = None;
    for point in points {
        if covered_until.is_some_and(|end| (point.from, point.start_side) < end) {
            continue;
        }
        if matches!(point.deco, Decoration::Replace(_)) {
            covered_until = Some((point.to, point.end_side));
        }
        visible.push(point);
    }

    let before: Vec<&MarkSpan> = {
        let mut active: Vec<&MarkSpan> = marks
            .iter()
            .filter(|m| m.from < from && m.to >= from)
            .collect();
        nest_order(&mut active);
        active
    };
    let mut walk = SpanWalk {
        marks: &marks,
        iter,
        prev: before,
    };
    let mut pos = from;
    let mut overflow = false;
    for point in &visible {
        let point_from = point.from.max(from);
        let point_to = point.to.min(to);
        walk.text(pos, point_from);
        let active = walk.point_active(point);
        let open = if point.from < from {
            active.len() + 1
        } else {
            shared_open(&walk.prev, &active, point_from)
        };
        walk.iter.point(point_from, point_to, point.deco, &styles(&active), open, point.rank);
        walk.prev = active;
        pos = pos.max(point_to);
        overflow = point.to > to;
    }
    if pos < to {
        walk.text(pos, to);
        overflow = false;
    }
    if overflow {
        return walk.prev.len() + 1;
    }
    let after: Vec<&MarkSpan> = {
        let mut active: Vec<&MarkSpan> = marks
            .iter()
            .filter(|m| m.from <= to && m.to > to)
            .collect();
        nest_order(&mut active);
        active
    };
    shared_open(&walk.prev, &after, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        text::ChangeSpec,
        widget::{NullWidget, WidgetType},
    };

    #[derive(Debug, Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl SpanIterator for Recorder {
        fn span(&mut self, from: usize, to: usize, active: &[Rc<MarkDecoration>], open: usize) {
            self.events
                .push(format!("span {from}-{to} marks={} open={open}", active.len()));
        }

        fn point(
            &mut self,
            from: usize,
            to: usize,
            _deco: &Decoration,
            active: &[Rc<MarkDecoration>],
            open: usize,
            _index: usize,
        ) {
            self.events
                .push(format!("point {from}-{to} marks={} open={open}", active.len()));
        }
    }

    fn mark(class: &str) -> Decoration {
        Decoration::mark(MarkDecoration::with_class(class))
    }

    fn widget() -> Widget {
        Rc::new(NullWidget::inline())
    }

    #[test]
    fn sides_order_widgets_around_inclusive_boundaries() {
        let before = Decoration::widget(widget(), -1);
        let after = Decoration::widget(widget(), 1);
        let inc_replace = Decoration::Replace(ReplaceDecoration {
            widget: None,
            block: false,
            inclusive_start: true,
            inclusive_end: true,
        });
        assert!(before.start_side() < inc_replace.start_side());
        assert!(after.start_side() > inc_replace.start_side());
        assert!(after.start_side() < Decoration::replace(None).start_side());
        assert_eq!(
            Decoration::block_widget(widget(), 1).block_type(),
            Some(BlockType::WidgetAfter)
        );
    }

    #[test]
    fn non_inclusive_marks_do_not_grow_and_drop_when_empty() {
        let set = DecorationSet::new([mark("a").range(2, 4), mark("b").range(5, 6)]);
        let changes = ChangeSet::of(
            8,
            vec![ChangeSpec::insert(2, "xx"), ChangeSpec::delete(5, 6)],
        )
        .expect("changes");
        let mapped = set.map(&changes);
        let ranges: Vec<(usize, usize)> = mapped.iter().map(|r| (r.from, r.to)).collect();
        assert_eq!(ranges, vec![(4, 6)]);
    }

    #[test]
    fn compare_reports_changed_marks_and_points() {
        let old = [DecorationSet::new([mark("a").range(0, 4)])];
        let new = [DecorationSet::new([
            mark("a").range(0, 2),
            Decoration::widget(widget(), 1).point(6),
        ])];
        let changes = ChangeSet::empty(8);
        assert_eq!(compare_snapshots(&old, &new, &changes), vec![(2, 4), (6, 6)]);
    }

    #[test]
    fn compare_ignores_equal_rendering() {
        let old = [DecorationSet::new([mark("a").range(0, 4)])];
        let new = [DecorationSet::new([mark("a").range(0, 4)])];
        assert!(compare_snapshots(&old, &new, &ChangeSet::empty(8)).is_empty());
    }

    #[test]
    fn compare_skips_what_the_change_rebuilds() {
        let old = [DecorationSet::new([mark("a").range(0, 2), mark("b").range(4, 6)])];
        let new = [DecorationSet::new([
            mark("a").range(0, 3),
            Decoration::widget(widget(), 1).point(1),
            mark("b").range(5, 8),
        ])];
        let changes = ChangeSet::of(8, vec![ChangeSpec::insert(1, "x")]).expect("changes");
        assert_eq!(compare_snapshots(&old, &new, &changes), vec![(7, 8)]);
    }

    #[test]
    fn compare_after_a_keystroke_in_a_large_highlight_set() {
        let highlights = |shift: usize| {
            DecorationSet::new((0..2000).map(|i| {
                let from = i * 4 + if i > 0 { shift } else { 0 };
                mark("hl").range(from, from + 2)
            }))
        };
        let old = [highlights(0)];
        let new = [highlights(1)];
        let changes = ChangeSet::of(8000, vec![ChangeSpec::insert(3, "x")]).expect("changes");
        assert!(compare_snapshots(&old, &new, &changes).is_empty());

        let stale = [highlights(0)];
        let diff = compare_snapshots(&old, &stale, &changes);
        assert_eq!(diff.first(), Some(&(4, 5)));
        assert_eq!(diff.len(), 3998);
    }

    #[test]
    fn spans_split_at_mark_boundaries() {
        let sets = [DecorationSet::new([
            mark("outer").range(0, 6),
            mark("inner").range(2, 4),
        ])];
        let mut rec = Recorder::default();
        let open_end = spans(&sets, 1, 5, &mut rec);
        assert_eq!(
            rec.events,
            vec![
                "span 1-2 marks=1 open=1",
                "span 2-4 marks=2 open=1",
                "span 4-5 marks=1 open=1",
            ]
        );
        assert_eq!(open_end, 1);
    }

    #[test]
    fn replaced_ranges_hide_points_inside_them() {
        let sets = [DecorationSet::new([
            Decoration::replace(Some(widget())).range(1, 5),
            Decoration::widget(widget(), 1).point(3),
        ])];
        let mut rec = Recorder::default();
        let open_end = spans(&sets, 0, 4, &mut rec);
        assert_eq!(rec.events, vec!["span 0-1 marks=0 open=0", "point 1-4 marks=0 open=0"]);
        assert_eq!(open_end, 1);
    }

    #[test]
    fn adjacent_equal_marks_are_open_at_an_empty_range() {
        let sets = [DecorationSet::new([mark("a").range(0, 2), mark("a").range(2, 4)])];
        let mut rec = Recorder::default();
        assert_eq!(spans(&sets, 2, 2, &mut rec), 1);
        assert!(rec.events.is_empty());
    }

    #[test]
    fn attrs_combine_classes() {
        let mut target = Attrs::from([("class".to_string(), "a".to_string())]);
        let source = Attrs::from([
            ("class".to_string(), "b".to_string()),
            ("title".to_string(), "t".to_string()),
        ]);
        combine_attrs(&source, &mut target);
        assert_eq!(target.get("class").map(String::as_str), Some("a b"));
        assert_eq!(target.get("title").map(String::as_str), Some("t"));
    }

    #[test]
    fn null_widgets_render_their_tag() {
        let mut surface = crate::surface::LiveSurface::new();
        let dom = NullWidget::block().to_dom(&mut surface);
        assert_eq!(surface.tag(dom), Some("div"));
    }
}
