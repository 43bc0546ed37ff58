//! Logical selection ranges consumed by selection sync.

use smallvec::{SmallVec, smallvec};

use crate::text::ChangeSet;

/// One selection range in document positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub anchor: usize,
    pub head: usize,
    /// Cursor association for empty ranges: negative sticks to the text
    /// before the cursor, positive to the text after it, zero has no
    /// preference.
    pub assoc: i8,
    /// Caret bidi level hint, when known.
    pub bidi_level: Option<u8>,
}

impl SelectionRange {
    pub fn cursor(pos: usize) -> Self {
        Self::range(pos, pos)
    }

    pub fn range(anchor: usize, head: usize) -> Self {
        Self {
            anchor,
            head,
            assoc: 0,
            bidi_level: None,
        }
    }

    pub fn with_assoc(mut self, assoc: i8) -> Self {
        self.assoc = assoc;
        self
    }

    pub fn with_bidi_level(mut self, level: u8) -> Self {
        self.bidi_level = Some(level);
        self
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Maps the range through `changes`. Empty ranges follow their
    /// association, non-empty ones keep their endpoints on the inside.
    pub fn map(&self, changes: &ChangeSet) -> Self {
        if self.is_empty() {
            let bias = if self.assoc < 0 { -1 } else { 1 };
            let pos = changes.map_pos(self.head, bias);
            return Self {
                anchor: pos,
                head: pos,
                ..*self
            };
        }
        let forward = self.anchor < self.head;
        let (anchor_bias, head_bias) = if forward { (1, -1) } else { (-1, 1) };
        Self {
            anchor: changes.map_pos(self.anchor, anchor_bias),
            head: changes.map_pos(self.head, head_bias),
            ..*self
        }
    }
}

/// A document selection: one or more ranges and the index of the main one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSelection {
    ranges: SmallVec<[SelectionRange; 1]>,
    main_index: usize,
}

impl EditorSelection {
    pub fn single(range: SelectionRange) -> Self {
        Self {
            ranges: smallvec![range],
            main_index: 0,
        }
    }

    pub fn cursor(pos: usize) -> Self {
        Self::single(SelectionRange::cursor(pos))
    }

    /// A selection with several ranges. Returns `None` for an empty list.
    pub fn create(ranges: impl IntoIterator<Item = SelectionRange>, main_index: usize) -> Option<Self> {
        let ranges: SmallVec<[SelectionRange; 1]> = ranges.into_iter().collect();
        if ranges.is_empty() {
            return None;
        }
        let main_index = main_index.min(ranges.len() - 1);
        Some(Self { ranges, main_index })
    }

    pub fn main(&self) -> SelectionRange {
        self.ranges[self.main_index]
    }

    pub fn ranges(&self) -> &[SelectionRange] {
        &self.ranges
    }

    pub fn map(&self, changes: &ChangeSet) -> Self {
        Self {
            ranges: self.ranges.iter().map(|r| r.map(changes)).collect(),
            main_index: self.main_index,
        }
    }

    /// Clamps every range to a document of length `len`.
    pub(crate) fn clamp(&self, len: usize) -> Self {
        Self {
            ranges: self
                .ranges
                .iter()
                .map(|r| SelectionRange {
                    anchor: r.anchor.min(len),
                    head: r.head.min(len),
                    ..*r
                })
                .collect(),
            main_index: self.main_index,
        }
    }
}

impl Default for EditorSelection {
    fn default() -> Self {
        Self::cursor(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::ChangeSpec;

    #[test]
    fn cursor_follows_association_at_insertion() {
        let changes = ChangeSet::of(4, vec![ChangeSpec::insert(2, "xx")]).expect("changes");
        assert_eq!(SelectionRange::cursor(2).map(&changes).head, 4);
        assert_eq!(SelectionRange::cursor(2).with_assoc(-1).map(&changes).head, 2);
    }

    #[test]
    fn ranges_do_not_grow_over_insertions_at_their_edges() {
        let changes = ChangeSet::of(
            6,
            vec![ChangeSpec::insert(1, "a"), ChangeSpec::insert(4, "b")],
        )
        .expect("changes");
        let mapped = SelectionRange::range(1, 4).map(&changes);
        assert_eq!((mapped.anchor, mapped.head), (2, 5));
        let inverted = SelectionRange::range(4, 1).map(&changes);
        assert_eq!((inverted.anchor, inverted.head), (5, 2));
    }

    #[test]
    fn create_clamps_main_index() {
        let sel = EditorSelection::create(
            [SelectionRange::cursor(1), SelectionRange::cursor(3)],
            7,
        )
        .expect("selection");
        assert_eq!(sel.main().head, 3);
        assert!(EditorSelection::create([], 0).is_none());
    }
}
