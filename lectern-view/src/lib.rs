//! lectern-view keeps a live, editable rendering tree in sync with a
//! decorated text document.
//!
//! # Overview
//!
//! The crate maintains a view tree mirroring the document: lines and block
//! widgets at the top level, text runs, marks, widgets and widget buffers
//! inside lines. Each update reconciles only the ranges touched by the edit
//! or by a decoration change, reusing existing views and live nodes wherever
//! their content survived, and then writes the dirty part of the tree to a
//! [`LiveSurface`]. Afterwards the native selection is brought in line with
//! the logical one, with workarounds for host quirks selected through
//! [`HostCapabilities`].
//!
//! # Usage
//!
//! ```
//! use lectern_view::{ChangeSet, ChangeSpec, DocView, Document, ViewConfig, ViewUpdate};
//!
//! let mut view = DocView::new(Document::new("hello\nworld"), ViewConfig::default());
//! let changes = ChangeSet::of(11, [ChangeSpec::insert(5, "!")]).expect("valid change");
//! let update = ViewUpdate::new(view.doc(), changes).expect("matching document");
//! view.update(update);
//! assert_eq!(view.doc().as_str(), "hello!\nworld");
//! assert!(view.check_invariants().is_ok());
//! ```
//!
//! # Decorations
//!
//! Decorations come as a slice of [`DecorationSet`]s, earlier sets taking
//! precedence. Marks style text, widgets are inserted at points, replace
//! decorations hide ranges (optionally drawing a widget instead) and line
//! decorations add attributes to line elements.
#![deny(clippy::unwrap_used)]

mod block;
pub mod builder;
pub mod config;
pub mod decoration;
pub mod doc_view;
pub mod dyn_traits;
pub mod error;
pub mod geometry;
mod inline;
mod reconcile;
pub mod selection;
pub mod surface;
pub mod text;
pub mod view_tree;
pub mod widget;

pub use indextree::NodeId;

pub use crate::{
    builder::{BuiltContent, ContentBuilder, DecoratedContentBuilder},
    config::{HostCapabilities, MAX_JOIN_LEN, ViewConfig},
    decoration::{
        Attrs, BlockType, DecoRange, Decoration, DecorationSet, LineDecoration, MarkDecoration,
        ReplaceDecoration, SpanIterator, WidgetDecoration, compare_snapshots, spans,
    },
    doc_view::{DocView, ViewUpdate, Viewport},
    error::{Result, ViewError},
    geometry::{
        Measure, MonospaceMeasure, Rect, ScrollMargins, ScrollRequest, TextSize, bounding_rect,
        flatten_rect,
    },
    selection::{EditorSelection, SelectionRange},
    surface::{
        FocusState, IgnoreMutations, LiveKind, LivePoint, LivePos, LiveSurface, Mutation,
        NativeSelection, NudgeDirection, SurfaceStats, is_equivalent_position,
    },
    text::{ChangeSet, ChangeSpec, ChangedRange, Document, Line},
    view_tree::{Dirty, ViewId, ViewKind, ViewNode, ViewTree},
    widget::{BlockGapWidget, CompositionWidget, NullWidget, Widget, WidgetType},
};
