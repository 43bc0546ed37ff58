//! Static configuration for a [`DocView`](crate::DocView).

/// Maximum combined length two adjacent text runs may have before the view
/// refuses to fuse them.
pub const MAX_JOIN_LEN: usize = 256;

/// Host quirks the view has to work around.
///
/// Detection of these is the host's business; the view only consumes the
/// flags. All of them default to `false`, which describes a host with no
/// known selection bugs and no optional selection APIs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCapabilities {
    /// The native selection can be extended directionally, so a selection
    /// whose head lies before its anchor can be represented as is.
    pub selection_extend: bool,
    /// The native selection supports a "move to line boundary" nudge, which
    /// cursor association enforcement depends on.
    pub selection_modify: bool,
    /// The host renders an invisible caret when an empty selection sits
    /// between two non-editable nodes. The view inserts an empty text anchor
    /// there and forces a selection write.
    pub reset_next_to_uneditable: bool,
    /// The host may silently move its selection focus while the view mutates
    /// the surface. The focus node is tracked through the sync pass and the
    /// selection is rewritten when it was touched.
    pub track_focus_writes: bool,
    /// The host loses its selection when the number of lines changes outside
    /// of a composition.
    pub force_on_line_count_change: bool,
    /// The host selection accepts a caret bidi level hint.
    pub caret_bidi_level: bool,
}

/// Configuration of a document view.
///
/// # Example
///
/// ```
/// use lectern_view::{HostCapabilities, ViewConfig};
///
/// let config = ViewConfig {
///     capabilities: HostCapabilities {
///         selection_extend: true,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// assert!(config.editable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Whether the content element is marked editable on the host.
    pub editable: bool,
    /// Host quirk flags.
    pub capabilities: HostCapabilities,
    /// Text runs longer than this are never fused by a merge.
    /// Defaults to [`MAX_JOIN_LEN`].
    pub max_text_join: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            editable: true,
            capabilities: HostCapabilities::default(),
            max_text_join: MAX_JOIN_LEN,
        }
    }
}

impl ViewConfig {
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the text fuse limit. Zero is raised to one.
    pub fn with_max_text_join(mut self, max_text_join: usize) -> Self {
        self.max_text_join = max_text_join.max(1);
        self
    }
}
