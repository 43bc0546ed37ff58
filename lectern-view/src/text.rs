//! Document text, change sets and changed ranges.
//!
//! Positions count Unicode scalar values; a line break counts as one unit.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::{Result, ViewError};

/// One line of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    /// Position of the first character of the line.
    pub from: usize,
    /// Position of the end of the line, before its line break.
    pub to: usize,
    /// One-based line number.
    pub number: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineStart {
    pos: usize,
    byte: usize,
}

/// Immutable document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: Rc<str>,
    len: usize,
    lines: Rc<[LineStart]>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new("")
    }
}

impl Document {
    pub fn new(text: &str) -> Self {
        let mut lines = vec![LineStart { pos: 0, byte: 0 }];
        let mut len = 0;
        for (byte, ch) in text.char_indices() {
            len += 1;
            if ch == '\n' {
                lines.push(LineStart {
                    pos: len,
                    byte: byte + 1,
                });
            }
        }
        Self {
            text: Rc::from(text),
            len,
            lines: Rc::from(lines),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of lines.
    pub fn lines(&self) -> usize {
        self.lines.len()
    }

    fn line_index(&self, pos: usize) -> usize {
        match self.lines.binary_search_by(|l| l.pos.cmp(&pos)) {
            Ok(i) => i,
            Err(i) => i - 1,
        }
    }

    /// The line containing `pos`, clamped to the document.
    pub fn line_at(&self, pos: usize) -> Line {
        self.line(self.line_index(pos.min(self.len)) + 1)
    }

    /// Line by one-based number, clamped to the last line.
    pub fn line(&self, number: usize) -> Line {
        let index = number.clamp(1, self.lines.len()) - 1;
        let from = self.lines[index].pos;
        let to = match self.lines.get(index + 1) {
            Some(next) => next.pos - 1,
            None => self.len,
        };
        Line {
            from,
            to,
            number: index + 1,
        }
    }

    fn byte_at(&self, pos: usize) -> usize {
        let pos = pos.min(self.len);
        let start = self.lines[self.line_index(pos)];
        let rest = &self.text[start.byte..];
        rest.char_indices()
            .nth(pos - start.pos)
            .map_or(self.text.len(), |(b, _)| start.byte + b)
    }

    /// Text between `from` and `to`, clamped to the document.
    pub fn slice_string(&self, from: usize, to: usize) -> String {
        let from = from.min(self.len);
        let to = to.clamp(from, self.len);
        self.text[self.byte_at(from)..self.byte_at(to)].to_string()
    }
}

/// Number of characters in `s`.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Replaces characters `from..to` of `s` with `insert`.
pub(crate) fn splice_chars(s: &str, from: usize, to: usize, insert: &str) -> String {
    let byte = |pos: usize| s.char_indices().nth(pos).map_or(s.len(), |(b, _)| b);
    let (from, to) = (byte(from), byte(to));
    let mut out = String::with_capacity(s.len() - (to - from) + insert.len());
    out.push_str(&s[..from]);
    out.push_str(insert);
    out.push_str(&s[to..]);
    out
}

/// A single replacement, in coordinates of the document it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSpec {
    pub from: usize,
    pub to: usize,
    pub insert: String,
}

impl ChangeSpec {
    pub fn new(from: usize, to: usize, insert: &str) -> Self {
        Self {
            from,
            to,
            insert: insert.to_string(),
        }
    }

    pub fn insert(at: usize, text: &str) -> Self {
        Self::new(at, at, text)
    }

    pub fn delete(from: usize, to: usize) -> Self {
        Self::new(from, to, "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    len: usize,
    /// Replacement text, `None` for kept sections.
    insert: Option<Rc<str>>,
    insert_len: usize,
}

/// A set of non-overlapping replacements over a document of known length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    sections: SmallVec<[Section; 4]>,
    len: usize,
    new_len: usize,
}

impl ChangeSet {
    /// A change set that keeps a document of length `len` as is.
    pub fn empty(len: usize) -> Self {
        Self::of(len, Vec::new()).unwrap_or_default()
    }

    /// Builds a change set from sorted, non-overlapping replacements.
    pub fn of(len: usize, changes: impl IntoIterator<Item = ChangeSpec>) -> Result<Self> {
        let mut sections = SmallVec::new();
        let mut pos = 0;
        let mut new_len = 0;
        for change in changes {
            if change.from < pos || change.to < change.from || change.to > len {
                return Err(ViewError::InvalidChange {
                    from: change.from,
                    to: change.to,
                    len,
                });
            }
            if change.from > pos {
                sections.push(Section {
                    len: change.from - pos,
                    insert: None,
                    insert_len: 0,
                });
                new_len += change.from - pos;
            }
            let insert_len = char_len(&change.insert);
            if change.to > change.from || insert_len > 0 {
                sections.push(Section {
                    len: change.to - change.from,
                    insert: Some(Rc::from(change.insert.as_str())),
                    insert_len,
                });
                new_len += insert_len;
            }
            pos = change.to;
        }
        if len > pos {
            sections.push(Section {
                len: len - pos,
                insert: None,
                insert_len: 0,
            });
            new_len += len - pos;
        }
        Ok(Self {
            sections,
            len,
            new_len,
        })
    }

    /// Length of the document before the changes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Length of the document after the changes.
    pub fn new_len(&self) -> usize {
        self.new_len
    }

    /// Whether the set contains no replacements.
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.insert.is_none())
    }

    /// Applies the changes to `doc`.
    pub fn apply(&self, doc: &Document) -> Result<Document> {
        if doc.len() != self.len {
            return Err(ViewError::LengthMismatch {
                expected: self.len,
                found: doc.len(),
            });
        }
        let mut out = String::with_capacity(doc.as_str().len());
        let mut pos = 0;
        for section in &self.sections {
            match &section.insert {
                None => out.push_str(&doc.slice_string(pos, pos + section.len)),
                Some(text) => out.push_str(text),
            }
            pos += section.len;
        }
        Ok(Document::new(&out))
    }

    /// Maps a position in the old document to the new one. `assoc` picks the
    /// side of an insertion at exactly `pos`: negative stays before it.
    pub fn map_pos(&self, pos: usize, assoc: i32) -> usize {
        let (mut pos_a, mut pos_b) = (0, 0);
        for section in &self.sections {
            let end_a = pos_a + section.len;
            if section.insert.is_none() {
                if end_a > pos {
                    return pos_b + (pos - pos_a);
                }
                pos_b += section.len;
            } else {
                if end_a > pos || (end_a == pos && assoc < 0 && section.len == 0) {
                    return if pos == pos_a || assoc < 0 {
                        pos_b
                    } else {
                        pos_b + section.insert_len
                    };
                }
                pos_b += section.insert_len;
            }
            pos_a = end_a;
        }
        pos_b + pos.saturating_sub(pos_a)
    }

    /// Whether any replacement touches `from..=to`.
    pub fn touches_range(&self, from: usize, to: usize) -> bool {
        let mut pos = 0;
        for section in &self.sections {
            let end = pos + section.len;
            if section.insert.is_some() && pos <= to && end >= from {
                return true;
            }
            pos = end;
        }
        false
    }

    /// The replaced regions, in old and new coordinates, with touching
    /// replacements joined.
    pub fn changed_ranges(&self) -> Vec<ChangedRange> {
        let mut out: Vec<ChangedRange> = Vec::new();
        let (mut pos_a, mut pos_b) = (0, 0);
        for section in &self.sections {
            let end_a = pos_a + section.len;
            let end_b = match section.insert {
                Some(_) => pos_b + section.insert_len,
                None => pos_b + section.len,
            };
            if section.insert.is_some() {
                match out.last_mut() {
                    Some(last) if last.to_a == pos_a && last.to_b == pos_b => {
                        last.to_a = end_a;
                        last.to_b = end_b;
                    }
                    _ => out.push(ChangedRange::new(pos_a, end_a, pos_b, end_b)),
                }
            }
            pos_a = end_a;
            pos_b = end_b;
        }
        out
    }
}

/// A changed region: `from_a..to_a` in the old document became
/// `from_b..to_b` in the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRange {
    pub from_a: usize,
    pub to_a: usize,
    pub from_b: usize,
    pub to_b: usize,
}

impl ChangedRange {
    pub fn new(from_a: usize, to_a: usize, from_b: usize, to_b: usize) -> Self {
        Self {
            from_a,
            to_a,
            from_b,
            to_b,
        }
    }

    pub fn join(&self, other: &ChangedRange) -> ChangedRange {
        ChangedRange {
            from_a: self.from_a.min(other.from_a),
            to_a: self.to_a.max(other.to_a),
            from_b: self.from_b.min(other.from_b),
            to_b: self.to_b.max(other.to_b),
        }
    }

    /// Adds `self` to a sorted set, joining every range it overlaps or
    /// touches.
    pub fn add_to_set(self, set: &mut Vec<ChangedRange>) {
        let mut me = self;
        let mut i = set.len();
        while i > 0 {
            let range = set[i - 1];
            if range.from_a > me.to_a {
                i -= 1;
                continue;
            }
            if range.to_a < me.from_a {
                break;
            }
            me = me.join(&range);
            set.remove(i - 1);
            i -= 1;
        }
        set.insert(i, me);
    }

    /// Unions `diff` with extra ranges given as `(from, to)` pairs in new
    /// document coordinates, sorted by position.
    pub fn extend_with_ranges(diff: Vec<ChangedRange>, ranges: &[(usize, usize)]) -> Vec<ChangedRange> {
        if ranges.is_empty() {
            return diff;
        }
        let mut result = Vec::new();
        let (mut pos_a, mut pos_b) = (0usize, 0usize);
        let mut r = 0;
        let mut d = 0;
        loop {
            let next = diff.get(d).copied();
            let end = next.map_or(usize::MAX, |n| n.from_b);
            while r < ranges.len() && ranges[r].0 < end {
                let (from, to) = ranges[r];
                let from_b = pos_b.max(from);
                let to_b = end.min(to);
                if from_b <= to_b {
                    // Outside changed regions old and new positions differ by a constant.
                    let a = |b: usize| b + pos_a - pos_b;
                    ChangedRange::new(a(from_b), a(to_b), from_b, to_b).add_to_set(&mut result);
                }
                if to > end {
                    break;
                }
                r += 1;
            }
            let Some(next) = next else {
                return result;
            };
            next.add_to_set(&mut result);
            pos_a = next.to_a;
            pos_b = next.to_b;
            d += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(len: usize, specs: Vec<ChangeSpec>) -> ChangeSet {
        match ChangeSet::of(len, specs) {
            Ok(c) => c,
            Err(err) => panic!("invalid change set: {err}"),
        }
    }

    #[test]
    fn lines_and_slices_count_characters() {
        let doc = Document::new("añb\nc\n");
        assert_eq!(doc.len(), 6);
        assert_eq!(doc.lines(), 3);
        assert_eq!(doc.line_at(2), Line { from: 0, to: 3, number: 1 });
        assert_eq!(doc.line_at(3), Line { from: 0, to: 3, number: 1 });
        assert_eq!(doc.line_at(4), Line { from: 4, to: 5, number: 2 });
        assert_eq!(doc.line_at(6), Line { from: 6, to: 6, number: 3 });
        assert_eq!(doc.slice_string(1, 5), "ñb\nc");
    }

    #[test]
    fn map_pos_respects_association_at_insertions() {
        let set = changes(10, vec![ChangeSpec::insert(5, "xyz")]);
        assert_eq!(set.map_pos(5, -1), 5);
        assert_eq!(set.map_pos(5, 1), 8);
        assert_eq!(set.map_pos(4, 1), 4);
        assert_eq!(set.map_pos(10, 1), 13);
    }

    #[test]
    fn map_pos_collapses_deleted_ranges() {
        let set = changes(10, vec![ChangeSpec::delete(2, 6)]);
        assert_eq!(set.map_pos(2, 1), 2);
        assert_eq!(set.map_pos(4, -1), 2);
        assert_eq!(set.map_pos(4, 1), 2);
        assert_eq!(set.map_pos(7, 1), 3);
    }

    #[test]
    fn rejects_overlapping_changes() {
        let result = ChangeSet::of(
            10,
            vec![ChangeSpec::delete(2, 6), ChangeSpec::delete(4, 8)],
        );
        assert!(matches!(result, Err(ViewError::InvalidChange { .. })));
    }

    #[test]
    fn apply_rejects_wrong_length() {
        let set = changes(3, vec![]);
        assert!(matches!(
            set.apply(&Document::new("ab")),
            Err(ViewError::LengthMismatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn changed_ranges_join_touching_replacements() {
        let set = changes(
            10,
            vec![ChangeSpec::new(1, 2, "ab"), ChangeSpec::new(2, 3, ""), ChangeSpec::insert(6, "q")],
        );
        assert_eq!(
            set.changed_ranges(),
            vec![ChangedRange::new(1, 3, 1, 3), ChangedRange::new(6, 6, 6, 7)]
        );
        let doc = set.apply(&Document::new("0123456789")).expect("apply");
        assert_eq!(doc.as_str(), "0ab345q6789");
    }

    #[test]
    fn extend_with_ranges_translates_outside_changes() {
        let diff = vec![ChangedRange::new(2, 4, 2, 7)];
        let out = ChangedRange::extend_with_ranges(diff, &[(0, 1), (9, 10)]);
        assert_eq!(
            out,
            vec![
                ChangedRange::new(0, 1, 0, 1),
                ChangedRange::new(2, 4, 2, 7),
                ChangedRange::new(6, 7, 9, 10),
            ]
        );
    }

    #[test]
    fn extend_with_ranges_joins_overlaps() {
        let diff = vec![ChangedRange::new(2, 4, 2, 4)];
        let out = ChangedRange::extend_with_ranges(diff, &[(3, 6)]);
        assert_eq!(out, vec![ChangedRange::new(2, 6, 2, 6)]);
    }
}
