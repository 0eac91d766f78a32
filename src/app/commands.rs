//! Host-invokable commands
//!
//! Each command snapshots the active view, sends at most one batched
//! request, and writes the translated result back to the view it started
//! from. Nothing is held across the round trip except that snapshot.

use crate::host::{Host, ViewColumn, ViewId, ViewSnapshot};
use crate::model::Selection;
use crate::services::lsp::convert::{
    protocol_range_to_selection, selection_to_protocol_range, to_host_position,
    to_protocol_position,
};
use crate::services::lsp::{ClientError, ExtensionClient};
use lsp_types::{Position, Uri};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// Commands the bridge registers with the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeCommand {
    ShowSyntaxTree,
    ExtendSelection,
    MatchingBrace,
}

impl BridgeCommand {
    pub const ALL: [BridgeCommand; 3] = [
        BridgeCommand::ShowSyntaxTree,
        BridgeCommand::ExtendSelection,
        BridgeCommand::MatchingBrace,
    ];

    /// Identifier the host binds keys and menu entries to
    pub fn id(self) -> &'static str {
        match self {
            BridgeCommand::ShowSyntaxTree => "libsyntax-rust.syntaxTree",
            BridgeCommand::ExtendSelection => "libsyntax-rust.extendSelection",
            BridgeCommand::MatchingBrace => "libsyntax-rust.matchingBrace",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }
}

impl fmt::Display for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Result of running a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The view was updated
    Applied,
    /// Nothing to do: no connection, no active view, or wrong language
    Skipped,
    /// A newer invocation on the same view was issued while this one was in
    /// flight, so its response was discarded
    Stale,
}

/// Per-view invocation counter for discarding overtaken responses
#[derive(Debug, Default)]
pub struct RequestSequencer {
    enabled: bool,
    latest: RefCell<HashMap<ViewId, u64>>,
}

/// Issued when a command sends its request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    view: ViewId,
    seq: u64,
}

impl RequestSequencer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            latest: RefCell::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn issue(&self, view: ViewId) -> Ticket {
        let mut latest = self.latest.borrow_mut();
        let seq = latest.entry(view).or_insert(0);
        *seq += 1;
        Ticket { view, seq: *seq }
    }

    /// Whether a response for `ticket` may still be applied
    pub fn is_current(&self, ticket: Ticket) -> bool {
        !self.enabled || self.latest.borrow().get(&ticket.view) == Some(&ticket.seq)
    }
}

/// Filter applied before any command touches the backend
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    pub language_id: String,
    pub scheme: String,
}

impl DocumentFilter {
    pub fn matches(&self, view: &ViewSnapshot) -> bool {
        view.language_id == self.language_id
            && crate::model::document::uri_scheme(&view.uri) == Some(self.scheme.as_str())
    }

    fn active_view(&self, host: &dyn Host) -> Option<ViewSnapshot> {
        let view = host.active_view()?;
        if self.matches(&view) {
            Some(view)
        } else {
            tracing::trace!("{} ({}) is not a supported document", view.id, view.language_id);
            None
        }
    }
}

/// Grow every selection of the active view to its enclosing syntax node
pub async fn extend_selection(
    client: &ExtensionClient,
    host: &dyn Host,
    filter: &DocumentFilter,
    sequencer: &RequestSequencer,
) -> Result<CommandOutcome, ClientError> {
    let Some(view) = filter.active_view(host) else {
        return Ok(CommandOutcome::Skipped);
    };
    let ranges = view
        .selections
        .iter()
        .map(selection_to_protocol_range)
        .collect();

    let ticket = sequencer.issue(view.id);
    let extended = client.extend_selection(view.uri.clone(), ranges).await?;
    if !sequencer.is_current(ticket) {
        tracing::debug!("discarding stale extendSelection response for {}", view.id);
        return Ok(CommandOutcome::Stale);
    }

    let selections = extended
        .into_iter()
        .map(protocol_range_to_selection)
        .collect();
    host.set_selections(view.id, selections);
    Ok(CommandOutcome::Applied)
}

/// Jump every cursor of the active view to its matching delimiter
pub async fn find_matching_brace(
    client: &ExtensionClient,
    host: &dyn Host,
    filter: &DocumentFilter,
    sequencer: &RequestSequencer,
) -> Result<CommandOutcome, ClientError> {
    let Some(view) = filter.active_view(host) else {
        return Ok(CommandOutcome::Skipped);
    };
    let offsets = view
        .selections
        .iter()
        .map(|s| to_protocol_position(s.active))
        .collect();

    let ticket = sequencer.issue(view.id);
    let matched = client.find_matching_brace(view.uri.clone(), offsets).await?;
    if !sequencer.is_current(ticket) {
        tracing::debug!("discarding stale findMatchingBrace response for {}", view.id);
        return Ok(CommandOutcome::Stale);
    }

    host.set_selections(view.id, matched_selections(&view.selections, matched));
    Ok(CommandOutcome::Applied)
}

/// Move each cursor to its matched position.
///
/// An empty selection collapses onto the match; a non-empty one keeps its
/// anchor so the jump extends it.
pub fn matched_selections(original: &[Selection], matched: Vec<Position>) -> Vec<Selection> {
    original
        .iter()
        .zip(matched)
        .map(|(selection, position)| {
            let active = to_host_position(position);
            let anchor = if selection.is_empty() {
                active
            } else {
                selection.anchor
            };
            Selection::new(anchor, active)
        })
        .collect()
}

/// Open (or reveal) the syntax tree beside the current editor without
/// taking focus
pub fn show_syntax_tree(host: &dyn Host, uri: &Uri) {
    host.open_virtual_document(uri, ViewColumn::Two, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HostPosition;

    fn pos(line: usize, column: usize) -> HostPosition {
        HostPosition::new(line, column)
    }

    #[test]
    fn test_command_ids_round_trip() {
        for command in BridgeCommand::ALL {
            assert_eq!(BridgeCommand::from_id(command.id()), Some(command));
        }
        assert_eq!(BridgeCommand::from_id("libsyntax-rust.unknown"), None);
    }

    #[test]
    fn test_matched_selections_collapse_empty_and_keep_anchor() {
        let original = [
            Selection::collapsed(pos(0, 4)),
            Selection::new(pos(2, 0), pos(2, 6)),
        ];
        let matched = vec![Position::new(5, 0), Position::new(9, 1)];

        let result = matched_selections(&original, matched);

        assert_eq!(
            result,
            vec![
                Selection::collapsed(pos(5, 0)),
                Selection::new(pos(2, 0), pos(9, 1)),
            ]
        );
    }

    #[test]
    fn test_sequencer_disabled_accepts_everything() {
        let sequencer = RequestSequencer::new(false);
        let first = sequencer.issue(ViewId(1));
        let _second = sequencer.issue(ViewId(1));
        assert!(sequencer.is_current(first));
    }

    #[test]
    fn test_sequencer_tracks_views_independently() {
        let sequencer = RequestSequencer::new(true);
        let a1 = sequencer.issue(ViewId(1));
        let b1 = sequencer.issue(ViewId(2));
        let a2 = sequencer.issue(ViewId(1));

        assert!(!sequencer.is_current(a1));
        assert!(sequencer.is_current(a2));
        assert!(sequencer.is_current(b1));
    }
}
