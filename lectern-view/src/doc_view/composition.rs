//! Locating an in-progress host composition in the document.

use std::rc::Rc;

use tracing::debug;

use super::DocView;
use crate::{
    decoration::{Decoration, DecorationSet},
    surface::nearby_text_node,
    text::{ChangeSet, Document, char_len},
    view_tree::ViewKind,
    widget::{CompositionWidget, Widget},
};

impl DocView {
    /// A decoration replacing the composed text with a [`CompositionWidget`]
    /// so reconciliation leaves the host's nodes alone. Empty when the
    /// composition cannot be matched to the new document.
    pub(super) fn compute_composition_deco(&self, changes: &ChangeSet, doc: &Document) -> DecorationSet {
        let Some(sel) = self.surface.selection() else {
            return DecorationSet::empty();
        };
        let Some(text_node) = nearby_text_node(&self.surface, sel.focus.node, sel.focus.offset, 0) else {
            return DecorationSet::empty();
        };
        let Some(mut view) = self.tree.nearest(&self.surface, text_node) else {
            return DecorationSet::empty();
        };
        let (from, to, top) = match self.tree.kind(view) {
            Some(ViewKind::Line(_)) => {
                let Some(line_dom) = self.tree.dom(view) else {
                    return DecorationSet::empty();
                };
                let mut top = text_node;
                while let Some(parent) = self.surface.parent(top) {
                    if parent == line_dom {
                        break;
                    }
                    top = parent;
                }
                let mut prev = self.surface.previous_sibling(top);
                while let Some(node) = prev {
                    if self.tree.live_view(&self.surface, node).is_some() {
                        break;
                    }
                    prev = self.surface.previous_sibling(node);
                }
                let pos = match prev.and_then(|node| self.tree.live_view(&self.surface, node)) {
                    Some(prev_view) => self.tree.pos_at_end(prev_view),
                    None => self.tree.pos_at_start(view),
                };
                (pos, pos, top)
            }
            Some(ViewKind::Doc | ViewKind::BlockWidget(_)) | None => {
                return DecorationSet::empty();
            }
            Some(_) => {
                while let Some(parent) = self.tree.parent(view) {
                    if self.tree.is_line(parent) || parent == self.tree.root() {
                        break;
                    }
                    view = parent;
                }
                let Some(top) = self.tree.dom(view) else {
                    return DecorationSet::empty();
                };
                let from = self.tree.pos_at_start(view);
                (from, from + self.tree.len(view), top)
            }
        };

        let mut new_from = changes.map_pos(from, 1);
        let mut new_to = new_from.max(changes.map_pos(to, -1));
        let text = self.surface.text(text_node).unwrap_or_default();
        let text_len = char_len(text);
        if new_to - new_from < text_len {
            if doc.slice_string(new_from, (new_from + text_len).min(doc.len())) == text {
                new_to = new_from + text_len;
            } else if doc.slice_string(new_to.saturating_sub(text_len), new_to) == text {
                new_from = new_to - text_len;
            } else {
                debug!("composition text does not match the document");
                return DecorationSet::empty();
            }
        } else if doc.slice_string(new_from, new_to) != text {
            debug!("composition text does not match the document");
            return DecorationSet::empty();
        }
        let widget: Widget = Rc::new(CompositionWidget {
            top,
            text: text_node,
        });
        DecorationSet::new([Decoration::replace(Some(widget)).range(new_from, new_to)])
    }
}
