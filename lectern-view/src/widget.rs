//! Opaque widgets embedded in the document view.
//!
//! ## Usage
//!
//! Implement [`WidgetType`] for any `PartialEq + Debug` type that can render
//! itself into the live surface, wrap it in an [`Rc`] and attach it to a
//! widget or replace decoration.

use std::{fmt, rc::Rc};

use downcast_rs::impl_downcast;
use indextree::NodeId;

use crate::{dyn_traits::DynPartialEqWidget, surface::LiveSurface};

/// An externally rendered unit of content.
pub trait WidgetType: DynPartialEqWidget + fmt::Debug {
    /// Builds the live node for this widget.
    fn to_dom(&self, surface: &mut LiveSurface) -> NodeId;

    /// Updates a live node previously produced by a widget of the same type
    /// to show this widget instead. Returns `false` when the node has to be
    /// rebuilt.
    fn update_dom(&self, _surface: &mut LiveSurface, _dom: NodeId) -> bool {
        false
    }

    /// Whether two widgets of the same type may stand in for each other in
    /// the view tree. May be looser than equality; defaults to equality.
    fn compare(&self, other: &dyn WidgetType) -> bool {
        self.dyn_eq(other)
    }

    /// Whether the widget's content is editable by the host.
    fn editable(&self) -> bool {
        false
    }

    /// Whether events inside the widget should be ignored by the editor.
    fn ignore_event(&self, _event: &str) -> bool {
        true
    }

    /// Height estimate for the widget before it is measured.
    fn estimated_height(&self) -> Option<f32> {
        None
    }

    /// Called when a live node created by this widget leaves the surface.
    fn destroy(&self, _surface: &mut LiveSurface, _dom: NodeId) {}
}

impl_downcast!(WidgetType);

/// Shared widget handle.
pub type Widget = Rc<dyn WidgetType>;

/// Whether `a` and `b` have the same concrete widget type.
pub fn same_type(a: &dyn WidgetType, b: &dyn WidgetType) -> bool {
    a.as_any().type_id() == b.as_any().type_id()
}

/// Identity-or-compare check used by merges.
pub(crate) fn widgets_compatible(a: &Widget, b: &Widget) -> bool {
    Rc::ptr_eq(a, b) || (same_type(a.as_ref(), b.as_ref()) && a.compare(b.as_ref()))
}

pub(crate) fn widgets_equal(a: &Widget, b: &Widget) -> bool {
    Rc::ptr_eq(a, b) || a.dyn_eq(b.as_ref())
}

/// Empty element used for replace decorations without a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullWidget {
    pub tag: &'static str,
}

impl NullWidget {
    pub fn inline() -> Self {
        Self { tag: "span" }
    }

    pub fn block() -> Self {
        Self { tag: "div" }
    }
}

impl WidgetType for NullWidget {
    fn to_dom(&self, surface: &mut LiveSurface) -> NodeId {
        surface.create_element(self.tag)
    }

    fn update_dom(&self, surface: &mut LiveSurface, dom: NodeId) -> bool {
        surface.tag(dom) == Some(self.tag)
    }
}

/// Placeholder for a run of lines outside the rendered viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockGapWidget {
    pub height: f32,
}

impl BlockGapWidget {
    fn style(&self) -> String {
        format!("height: {}px", self.height)
    }
}

impl WidgetType for BlockGapWidget {
    fn to_dom(&self, surface: &mut LiveSurface) -> NodeId {
        let dom = surface.create_element("div");
        surface.set_attr(dom, "class", "cm-gap");
        surface.set_attr(dom, "style", &self.style());
        dom
    }

    fn update_dom(&self, surface: &mut LiveSurface, dom: NodeId) -> bool {
        surface.set_attr(dom, "style", &self.style());
        true
    }

    fn compare(&self, other: &dyn WidgetType) -> bool {
        other.downcast_ref::<BlockGapWidget>().is_some()
    }

    fn estimated_height(&self) -> Option<f32> {
        Some(self.height)
    }
}

/// Stand-in for host-owned composition content. Renders by adopting the
/// existing live node instead of creating one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionWidget {
    /// Top live node of the composed region, a child of a line element.
    pub top: NodeId,
    /// Text node receiving the composed input.
    pub text: NodeId,
}

impl WidgetType for CompositionWidget {
    fn to_dom(&self, _surface: &mut LiveSurface) -> NodeId {
        self.top
    }

    fn update_dom(&self, _surface: &mut LiveSurface, dom: NodeId) -> bool {
        dom == self.top
    }

    fn editable(&self) -> bool {
        true
    }

    fn ignore_event(&self, _event: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Chip(&'static str);

    impl WidgetType for Chip {
        fn to_dom(&self, surface: &mut LiveSurface) -> NodeId {
            let dom = surface.create_element("span");
            surface.set_attr(dom, "data-chip", self.0);
            dom
        }
    }

    #[test]
    fn equality_requires_same_concrete_type() {
        let a: Widget = Rc::new(Chip("a"));
        let a2: Widget = Rc::new(Chip("a"));
        let b: Widget = Rc::new(Chip("b"));
        let null: Widget = Rc::new(NullWidget::inline());
        assert!(widgets_equal(&a, &a2));
        assert!(!widgets_equal(&a, &b));
        assert!(!widgets_equal(&a, &null));
        assert!(same_type(a.as_ref(), b.as_ref()));
        assert!(!same_type(a.as_ref(), null.as_ref()));
    }

    #[test]
    fn block_gaps_are_interchangeable() {
        let a: Widget = Rc::new(BlockGapWidget { height: 16.0 });
        let b: Widget = Rc::new(BlockGapWidget { height: 64.0 });
        assert!(widgets_compatible(&a, &b));
        assert!(!widgets_equal(&a, &b));

        let mut surface = LiveSurface::new();
        let dom = a.to_dom(&mut surface);
        assert!(b.update_dom(&mut surface, dom));
        assert_eq!(surface.attr(dom, "style"), Some("height: 64px"));
    }
}
