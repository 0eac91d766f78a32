//! In-memory editing host
//!
//! [`Workspace`] keeps a list of views with their selections, decoration
//! overlays and focus/visibility flags, plus the content of any virtual
//! documents the bridge has published. It implements [`Host`] and is what
//! the bridge runs against in tests and headless embeddings.

use crate::host::{Host, ViewColumn, ViewId, ViewSnapshot};
use crate::model::{HostPosition, HostRange, Selection};
use crate::view::decorations::DecorationTag;
use crate::view::overlay::{Overlay, OverlayManager};
use lsp_types::Uri;
use std::cell::RefCell;
use std::collections::HashMap;

/// One open view of a document
#[derive(Debug, Clone)]
pub struct EditorView {
    pub id: ViewId,
    pub uri: Uri,
    pub language_id: String,
    pub selections: Vec<Selection>,
    pub visible: bool,
    pub column: ViewColumn,
    pub overlays: OverlayManager,
}

impl EditorView {
    fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            id: self.id,
            uri: self.uri.clone(),
            language_id: self.language_id.clone(),
            selections: self.selections.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct WorkspaceState {
    views: Vec<EditorView>,
    active: Option<ViewId>,
    next_id: u64,
    virtual_content: HashMap<Uri, String>,
    decoration_updates: usize,
}

impl WorkspaceState {
    fn view_mut(&mut self, id: ViewId) -> Option<&mut EditorView> {
        self.views.iter_mut().find(|v| v.id == id)
    }

    fn view(&self, id: ViewId) -> Option<&EditorView> {
        self.views.iter().find(|v| v.id == id)
    }

    fn push_view(&mut self, uri: Uri, language_id: &str, column: ViewColumn) -> ViewId {
        self.next_id += 1;
        let id = ViewId(self.next_id);
        self.views.push(EditorView {
            id,
            uri,
            language_id: language_id.to_string(),
            selections: vec![Selection::collapsed(HostPosition::default())],
            visible: true,
            column,
            overlays: OverlayManager::new(),
        });
        id
    }
}

#[derive(Debug, Default)]
pub struct Workspace {
    state: RefCell<WorkspaceState>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a visible view of `uri` and give it focus
    pub fn open(&self, uri: Uri, language_id: &str) -> ViewId {
        let mut state = self.state.borrow_mut();
        let id = state.push_view(uri, language_id, ViewColumn::One);
        state.active = Some(id);
        id
    }

    pub fn focus(&self, view: ViewId) {
        let mut state = self.state.borrow_mut();
        if state.view(view).is_some() {
            state.active = Some(view);
        }
    }

    /// Drop keyboard focus from every view
    pub fn blur(&self) {
        self.state.borrow_mut().active = None;
    }

    /// Hide a view (e.g. its tab was switched away). Hidden views lose focus.
    pub fn hide(&self, view: ViewId) {
        let mut state = self.state.borrow_mut();
        if let Some(v) = state.view_mut(view) {
            v.visible = false;
        }
        if state.active == Some(view) {
            state.active = None;
        }
    }

    pub fn show(&self, view: ViewId) {
        if let Some(v) = self.state.borrow_mut().view_mut(view) {
            v.visible = true;
        }
    }

    pub fn set_language(&self, view: ViewId, language_id: &str) {
        if let Some(v) = self.state.borrow_mut().view_mut(view) {
            v.language_id = language_id.to_string();
        }
    }

    pub fn selections(&self, view: ViewId) -> Vec<Selection> {
        self.state
            .borrow()
            .view(view)
            .map(|v| v.selections.clone())
            .unwrap_or_default()
    }

    /// Decoration ranges currently shown for `tag` in `view`
    pub fn overlay_ranges(&self, view: ViewId, tag: DecorationTag) -> Vec<HostRange> {
        let state = self.state.borrow();
        let Some(v) = state.view(view) else {
            return Vec::new();
        };
        let namespace = tag.namespace();
        let ranges = v.overlays.in_namespace(&namespace).map(|o| o.range).collect();
        ranges
    }

    pub fn overlays(&self, view: ViewId) -> Vec<Overlay> {
        self.state
            .borrow()
            .view(view)
            .map(|v| v.overlays.all().to_vec())
            .unwrap_or_default()
    }

    /// Total number of `set_decorations` calls received
    pub fn decoration_updates(&self) -> usize {
        self.state.borrow().decoration_updates
    }

    /// First view of `uri`, visible or not
    pub fn view_for(&self, uri: &Uri) -> Option<ViewId> {
        self.state
            .borrow()
            .views
            .iter()
            .find(|v| &v.uri == uri)
            .map(|v| v.id)
    }

    pub fn active_id(&self) -> Option<ViewId> {
        self.state.borrow().active
    }

    pub fn column(&self, view: ViewId) -> Option<ViewColumn> {
        self.state.borrow().view(view).map(|v| v.column)
    }

    /// Last content published for a virtual document
    pub fn virtual_content(&self, uri: &Uri) -> Option<String> {
        self.state.borrow().virtual_content.get(uri).cloned()
    }
}

impl Host for Workspace {
    fn active_view(&self) -> Option<ViewSnapshot> {
        let state = self.state.borrow();
        let id = state.active?;
        let snapshot = state
            .view(id)
            .filter(|v| v.visible)
            .map(EditorView::snapshot);
        snapshot
    }

    fn visible_view_for(&self, uri: &Uri) -> Option<ViewId> {
        let state = self.state.borrow();
        let mut visible = state.views.iter().filter(|v| v.visible && &v.uri == uri);
        // Prefer the focused view when several show the same document
        let first = visible.next()?;
        if Some(first.id) == state.active {
            return Some(first.id);
        }
        Some(
            visible
                .find(|v| Some(v.id) == state.active)
                .map_or(first.id, |v| v.id),
        )
    }

    fn set_selections(&self, view: ViewId, selections: Vec<Selection>) {
        match self.state.borrow_mut().view_mut(view) {
            Some(v) => v.selections = selections,
            None => tracing::debug!("set_selections on closed {view}"),
        }
    }

    fn set_decorations(&self, view: ViewId, tag: DecorationTag, ranges: Vec<HostRange>) {
        let mut state = self.state.borrow_mut();
        state.decoration_updates += 1;
        if let Some(v) = state.view_mut(view) {
            v.overlays
                .replace_namespace(&tag.namespace(), tag.overlays(&ranges));
        }
    }

    fn open_virtual_document(&self, uri: &Uri, column: ViewColumn, preserve_focus: bool) {
        let mut state = self.state.borrow_mut();
        let existing = state.views.iter().position(|v| &v.uri == uri);
        let id = match existing {
            Some(index) => {
                let view = &mut state.views[index];
                view.visible = true;
                view.column = column;
                view.id
            }
            None => state.push_view(uri.clone(), "", column),
        };
        if !preserve_focus {
            state.active = Some(id);
        }
    }

    fn set_virtual_document_content(&self, uri: &Uri, content: String) {
        self.state
            .borrow_mut()
            .virtual_content
            .insert(uri.clone(), content);
    }
}
