//! Handlers for server-initiated messages
//!
//! These are the only places where the backend reaches into the host
//! unprompted.

use super::client::HandlerTable;
use super::convert::to_host_position;
use super::ext::{MoveCursor, PublishDecorations, PublishDecorationsParams};
use crate::host::Host;
use crate::model::Selection;
use crate::view::decorations::apply_decorations;
use lsp_types::Position;

/// Install the push handlers every connection needs
pub fn register_default_handlers(table: &mut HandlerTable) {
    table.on_notification::<PublishDecorations>(publish_decorations);
    table.on_request::<MoveCursor>(move_cursor);
}

/// `m/publishDecorations`: replace the decorations of the visible view
/// showing the document
pub fn publish_decorations(params: PublishDecorationsParams, host: &dyn Host) {
    if let Some(report) = apply_decorations(host, &params.uri, &params.decorations) {
        if !report.dropped_tags.is_empty() {
            tracing::debug!(
                "{} decorations with unknown tags dropped for {}",
                report.dropped_tags.len(),
                params.uri.as_str()
            );
        }
    }
}

/// `m/moveCursor`: collapse the active view's selection to `position`.
///
/// Only acts when the primary selection is empty, so a cursor jump never
/// destroys a selection the user made. Secondary selections are dropped.
/// The request is always acknowledged.
pub fn move_cursor(position: Position, host: &dyn Host) {
    let Some(view) = host.active_view() else {
        tracing::debug!("moveCursor with no active view");
        return;
    };
    if view.primary_selection().is_some_and(|s| !s.is_empty()) {
        tracing::debug!("moveCursor ignored: {} has a selection", view.id);
        return;
    }
    let target = to_host_position(position);
    host.set_selections(view.id, vec![Selection::collapsed(target)]);
}
