//! The boundary between the bridge and the editing host
//!
//! The bridge never owns views. It reads a snapshot of the active view,
//! looks up visible views by URI, and pushes selections, decorations and
//! virtual document content back through this trait.
//!
//! All methods take `&self`: hosts are expected to use interior mutability
//! the same way the editor's own view objects do. The bridge never holds a
//! host borrow across an `.await`, so two commands can interleave on one
//! thread.

use crate::model::{HostRange, Selection};
use crate::view::decorations::DecorationTag;
use lsp_types::Uri;
use std::fmt;

/// Identifies an open view in the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(pub u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Where to place a newly shown document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewColumn {
    #[default]
    Active,
    One,
    Two,
    Beside,
}

/// Point-in-time copy of the active view's state
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub id: ViewId,
    pub uri: Uri,
    pub language_id: String,
    /// Selections in host order; the first one is the primary selection
    pub selections: Vec<Selection>,
}

impl ViewSnapshot {
    pub fn primary_selection(&self) -> Option<&Selection> {
        self.selections.first()
    }
}

/// Operations the bridge needs from the editing host
pub trait Host {
    /// The view that has keyboard focus, if any
    fn active_view(&self) -> Option<ViewSnapshot>;

    /// A currently visible view showing `uri`, if any
    fn visible_view_for(&self, uri: &Uri) -> Option<ViewId>;

    /// Replace the selections of a view
    fn set_selections(&self, view: ViewId, selections: Vec<Selection>);

    /// Replace the decoration overlays of one tag in a view
    fn set_decorations(&self, view: ViewId, tag: DecorationTag, ranges: Vec<HostRange>);

    /// Open (or reuse) a view of a read-only virtual document
    fn open_virtual_document(&self, uri: &Uri, column: ViewColumn, preserve_focus: bool);

    /// Replace the displayed content of a virtual document
    fn set_virtual_document_content(&self, uri: &Uri, content: String);
}
