//! Read-only virtual document showing the backend's syntax tree
//!
//! There is exactly one such document per bridge. Its content always
//! reflects whichever editor is active at the moment it is read, not the
//! one that was active when it was opened.

use crate::host::Host;
use crate::model::document::uri_scheme;
use crate::services::lsp::ExtensionClient;
use lsp_types::Uri;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Content served when there is nothing to show
pub const PLACEHOLDER: &str = "Not available";

/// `<scheme>://syntaxtree`, or None if `scheme` does not form a valid URI
pub fn syntax_tree_uri(scheme: &str) -> Option<Uri> {
    if scheme.is_empty() {
        return None;
    }
    format!("{scheme}://syntaxtree").parse().ok()
}

pub struct VirtualDocumentProvider {
    uri: Uri,
    client: Option<Arc<ExtensionClient>>,
    invalidations: mpsc::UnboundedSender<Uri>,
}

impl VirtualDocumentProvider {
    pub fn new(
        uri: Uri,
        client: Option<Arc<ExtensionClient>>,
        invalidations: mpsc::UnboundedSender<Uri>,
    ) -> Self {
        Self {
            uri,
            client,
            invalidations,
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// True if `uri` belongs to this provider's scheme
    pub fn provides(&self, uri: &Uri) -> bool {
        uri_scheme(uri).is_some() && uri_scheme(uri) == uri_scheme(&self.uri)
    }

    /// Forget the connection; later reads serve the placeholder
    pub fn detach(&mut self) {
        self.client = None;
    }

    /// Current content: the syntax tree of the active editor's document.
    ///
    /// Falls back to [`PLACEHOLDER`] when no real editor is active (the tree
    /// view itself does not count) or there is no connection. Backend errors
    /// propagate.
    pub async fn read(&self, host: &dyn Host) -> Result<String, crate::services::lsp::ClientError> {
        let Some(view) = host.active_view().filter(|v| !self.provides(&v.uri)) else {
            return Ok(PLACEHOLDER.to_string());
        };
        let Some(client) = &self.client else {
            return Ok(PLACEHOLDER.to_string());
        };
        client.syntax_tree(view.uri).await
    }

    /// Signal that the document content changed. The host should re-read.
    pub fn invalidate(&self) {
        if self.invalidations.send(self.uri.clone()).is_err() {
            tracing::debug!("invalidation for {} dropped: receiver gone", self.uri.as_str());
        }
    }
}
