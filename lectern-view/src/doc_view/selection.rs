//! Keeping the native selection aligned with the logical one.

use tracing::{debug, trace, warn};

use super::DocView;
use crate::{
    selection::SelectionRange,
    surface::{LivePoint, LivePos, LiveSurface, NudgeDirection, is_equivalent_position},
};

/// Whether `pos` sits in an element between two non-editable children, or
/// between one and the element's edge.
fn between_uneditable(surface: &LiveSurface, pos: &LivePos) -> bool {
    let node = pos.node;
    if surface.is_text(node) || surface.first_child(node).is_none() {
        return false;
    }
    let before_ok = pos.offset == 0
        || surface
            .child_at(node, pos.offset - 1)
            .is_some_and(|c| surface.is_uneditable(c));
    let after_ok = pos.offset == surface.child_count(node)
        || surface
            .child_at(node, pos.offset)
            .is_some_and(|c| surface.is_uneditable(c));
    before_ok && after_ok
}

impl DocView {
    /// An editable view owns the selection while it has focus. A read-only
    /// one owns it while the native selection starts inside its content.
    fn may_control_selection(&self) -> bool {
        if self.config.editable {
            self.surface.has_focus()
        } else {
            self.surface
                .selection()
                .is_some_and(|sel| self.surface.contains(self.content, sel.anchor.node))
        }
    }

    /// Writes the main selection range to the native selection when the
    /// host does not already show an equivalent one.
    ///
    /// Runs only when the view may control the selection, unless
    /// `from_pointer` is set.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn update_selection(&mut self, from_pointer: bool) {
        if !(from_pointer || self.may_control_selection()) {
            return;
        }
        let mut force = std::mem::take(&mut self.force_selection);
        let main = self.selection.main();
        let anchor = match self.dom_at_pos(main.anchor) {
            Ok(pos) => pos,
            Err(err) => {
                warn!(%err, "cannot place the selection anchor");
                return;
            }
        };
        let mut head = if main.is_empty() {
            anchor
        } else {
            match self.dom_at_pos(main.head) {
                Ok(pos) => pos,
                Err(err) => {
                    warn!(%err, "cannot place the selection head");
                    return;
                }
            }
        };
        let mut anchor = anchor;

        if self.config.capabilities.reset_next_to_uneditable
            && main.is_empty()
            && between_uneditable(&self.surface, &anchor)
        {
            let mut surface = self.surface.ignore_mutations();
            let dummy = surface.create_text("");
            let before = surface.child_at(anchor.node, anchor.offset);
            surface.insert_before(anchor.node, dummy, before);
            trace!("inserted a caret anchor between non-editable nodes");
            anchor = LivePos::new(dummy, 0);
            head = anchor;
            force = true;
        }

        let native = self.surface.selection().copied();
        let in_place = native.is_some_and(|sel| {
            is_equivalent_position(&self.surface, anchor.node, anchor.offset, sel.anchor.node, sel.anchor.offset)
                && is_equivalent_position(&self.surface, head.node, head.offset, sel.focus.node, sel.focus.offset)
        });
        if force || !in_place {
            debug!(anchor = main.anchor, head = main.head, force, "writing native selection");
            let capabilities = self.config.capabilities;
            let mut surface = self.surface.ignore_mutations();
            if main.is_empty() {
                surface.collapse(anchor.point());
                if capabilities.caret_bidi_level {
                    if let Some(level) = main.bidi_level {
                        surface.set_bidi_level(level);
                    }
                }
            } else if capabilities.selection_extend {
                surface.collapse(anchor.point());
                surface.extend(head.point());
            } else {
                let (start, end) = if main.anchor > main.head {
                    (head, anchor)
                } else {
                    (anchor, head)
                };
                surface.set_range(start.point(), end.point());
            }
        }

        let native = self.surface.selection().copied();
        self.imprecise_anchor = if anchor.precise {
            None
        } else {
            native.map(|sel| sel.anchor)
        };
        self.imprecise_head = if head.precise {
            None
        } else {
            native.map(|sel| sel.focus)
        };
    }

    /// Maps the native selection back to document positions. Endpoints the
    /// view placed approximately and the host left alone map to the logical
    /// endpoints they stand for.
    pub fn read_selection(&self) -> Option<SelectionRange> {
        let native = self.surface.selection()?;
        let main = self.selection.main();
        let resolve = |point: LivePoint, cached: Option<LivePoint>, logical: usize| {
            if cached == Some(point) {
                Some(logical)
            } else {
                self.pos_from_dom(point.node, point.offset).ok()
            }
        };
        let anchor = resolve(native.anchor, self.imprecise_anchor, main.anchor)?;
        let head = resolve(native.focus, self.imprecise_head, main.head)?;
        Some(SelectionRange::range(anchor, head))
    }

    /// Makes the host honor the association of a cursor sitting at a soft
    /// line wrap, where both sides of the position are on different rows.
    pub(super) fn enforce_cursor_assoc(&mut self) {
        if !self.composition_deco.is_empty() || !self.config.capabilities.selection_modify {
            return;
        }
        let cursor = self.selection.main();
        if !cursor.is_empty() || cursor.assoc == 0 {
            return;
        }
        let Some(line) = self.tree.find_line(cursor.head) else {
            return;
        };
        let line_start = self.tree.pos_at_start(line);
        if cursor.head == line_start || cursor.head == line_start + self.tree.len(line) {
            return;
        }
        let (Some(before), Some(after)) = (self.raw_coords(cursor.head, -1), self.raw_coords(cursor.head, 1))
        else {
            return;
        };
        if before.bottom > after.top {
            return;
        }
        let target = if cursor.assoc < 0 {
            cursor.head - 1
        } else {
            cursor.head + 1
        };
        let Ok(dom) = self.dom_at_pos(target) else {
            return;
        };
        trace!(head = cursor.head, assoc = cursor.assoc, "enforcing cursor association");
        self.surface.collapse(dom.point());
        self.surface.modify_line_boundary(if cursor.assoc < 0 {
            NudgeDirection::Forward
        } else {
            NudgeDirection::Backward
        });
    }
}
