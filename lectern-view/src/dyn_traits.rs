//! Equality across widget trait objects.
//!
//! Widgets reach the view tree as `Rc<dyn WidgetType>`, so comparing two of
//! them means downcasting one to the concrete type of the other first. Any
//! `PartialEq` widget gets [`DynPartialEqWidget`] for free.

use downcast_rs::Downcast;

use crate::widget::WidgetType;

/// Value equality between widgets of possibly different concrete types.
pub trait DynPartialEqWidget: Downcast {
    /// `false` when `other` is a different concrete type, otherwise the
    /// type's own `PartialEq`.
    fn dyn_eq(&self, other: &dyn WidgetType) -> bool;
}

impl<W> DynPartialEqWidget for W
where
    W: WidgetType + PartialEq + 'static,
{
    fn dyn_eq(&self, other: &dyn WidgetType) -> bool {
        match other.downcast_ref::<W>() {
            Some(other) => self == other,
            None => false,
        }
    }
}
