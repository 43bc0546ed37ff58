//! Error types surfaced by the query and construction APIs.
//!
//! The update cycle itself never fails: merge refusals are ordinary `false`
//! results and host races are recovered by forcing a selection write. Only
//! calls that receive a bad argument from outside report an error.

use thiserror::Error;

/// Errors reported by view queries and change construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// A host-to-logical position mapping was requested for a live node that
    /// is not part of this view's surface.
    #[error("trying to find a position for a live node outside the document view")]
    PositionOutsideView,
    /// A logical position beyond the end of the document.
    #[error("position {pos} is out of range for a document of length {len}")]
    PositionOutOfRange { pos: usize, len: usize },
    /// A change whose range is reversed, overlaps a previous change, or runs
    /// past the end of the document.
    #[error("change {from}..{to} does not fit a document of length {len}")]
    InvalidChange { from: usize, to: usize, len: usize },
    /// A change set applied to a document of the wrong length.
    #[error("change set expects a document of length {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    /// The view tree failed a structural consistency check.
    #[error("view tree is inconsistent: {0}")]
    Inconsistent(String),
}

pub type Result<T, E = ViewError> = std::result::Result<T, E>;
