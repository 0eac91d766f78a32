// Integration tests - the bridge driven end to end against a scripted backend

mod common;

use common::{harness, harness_with_delays, uri, Harness};
use lsp_types::NumberOrString;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use syntax_bridge::app::commands::{BridgeCommand, CommandOutcome};
use syntax_bridge::model::workspace::Workspace;
use syntax_bridge::model::{HostPosition, HostRange, Selection};
use syntax_bridge::services::lsp::transport::IncomingMessage;
use syntax_bridge::services::lsp::ClientError;
use syntax_bridge::services::virtual_document::PLACEHOLDER;
use syntax_bridge::view::decorations::DecorationTag;
use syntax_bridge::{Bridge, Config, Host, ViewColumn};

fn pos(line: usize, column: usize) -> HostPosition {
    HostPosition::new(line, column)
}

fn no_backend_calls(_: &str, _: &Value) -> Result<Value, ClientError> {
    panic!("backend should not be called");
}

/// Widens every range to `(line, 0)..(line, character + 10)` on its end line
fn widen(_: &str, params: &Value) -> Result<Value, ClientError> {
    let selections: Vec<Value> = params["selections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            let line = r["end"]["line"].as_u64().unwrap();
            let character = r["end"]["character"].as_u64().unwrap();
            json!({
                "start": { "line": line, "character": 0 },
                "end": { "line": line, "character": character + 10 }
            })
        })
        .collect();
    Ok(json!({ "selections": selections }))
}

fn widened(selection: &Selection) -> Selection {
    let end = selection.end();
    Selection::new(pos(end.line, 0), pos(end.line, end.column + 10))
}

fn decorations(items: &[(u32, u32, u32, &str)]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|(line, from, to, tag)| {
            json!({
                "range": {
                    "start": { "line": line, "character": from },
                    "end": { "line": line, "character": to }
                },
                "tag": tag
            })
        })
        .collect();
    json!(items)
}

fn push_decorations(h: &Harness, target: &str, items: &[(u32, u32, u32, &str)]) {
    h.server
        .send(IncomingMessage::Notification {
            method: "m/publishDecorations".to_string(),
            params: json!({ "uri": target, "decorations": decorations(items) }),
        })
        .unwrap();
}

fn range(line: usize, from: usize, to: usize) -> HostRange {
    HostRange::new(pos(line, from), pos(line, to))
}

// =============================================================================
// Extend selection
// =============================================================================

#[tokio::test]
async fn test_extend_selection_replaces_each_selection() {
    let h = harness(Config::default(), widen);
    let ws = Workspace::new();
    let view = ws.open(uri("file:///src/lib.rs"), "rust");
    let original = vec![
        Selection::collapsed(pos(4, 2)),
        Selection::new(pos(1, 8), pos(1, 3)),
    ];
    ws.set_selections(view, original.clone());

    let outcome = h.bridge.extend_selection(&ws).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Applied);
    let result = ws.selections(view);
    assert_eq!(result, original.iter().map(widened).collect::<Vec<_>>());
    // Results come back forward: anchor at start
    assert!(result.iter().all(|s| !s.is_reversed()));
    assert_eq!(h.backend.requests().len(), 1);
}

#[tokio::test]
async fn test_commands_skip_other_languages() {
    let h = harness(Config::default(), no_backend_calls);
    let ws = Workspace::new();
    let view = ws.open(uri("file:///README.md"), "markdown");
    let before = ws.selections(view);

    for command in [BridgeCommand::ExtendSelection, BridgeCommand::MatchingBrace] {
        assert_eq!(
            h.bridge.execute(command, &ws).await.unwrap(),
            CommandOutcome::Skipped
        );
    }
    assert_eq!(ws.selections(view), before);
    assert!(h.backend.requests().is_empty());
}

#[tokio::test]
async fn test_commands_skip_without_active_view() {
    let h = harness(Config::default(), no_backend_calls);
    let ws = Workspace::new();
    ws.open(uri("file:///src/lib.rs"), "rust");
    ws.blur();

    assert_eq!(
        h.bridge.execute_id("libsyntax-rust.extendSelection", &ws).await.unwrap(),
        CommandOutcome::Skipped
    );
}

#[tokio::test]
async fn test_length_mismatch_leaves_selections_untouched() {
    let h = harness(Config::default(), |_, _| Ok(json!({ "selections": [] })));
    let ws = Workspace::new();
    let view = ws.open(uri("file:///src/lib.rs"), "rust");
    let before = ws.selections(view);

    assert!(h.bridge.extend_selection(&ws).await.is_err());
    assert_eq!(ws.selections(view), before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Reordering the input selections reorders the applied result the same way
    #[test]
    fn prop_extend_selection_is_permutation_equivariant(
        points in prop::collection::vec((0usize..500, 0usize..200, 0usize..200), 1..8),
        seed in any::<u64>(),
    ) {
        let selections: Vec<Selection> = points
            .iter()
            .map(|&(line, a, b)| Selection::new(pos(line, a), pos(line, b)))
            .collect();
        let mut permuted = selections.clone();
        // Deterministic shuffle driven by the seed
        let len = permuted.len();
        for i in (1..len).rev() {
            let j = (seed.wrapping_mul(i as u64 + 7) % (i as u64 + 1)) as usize;
            permuted.swap(i, j);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let applied = runtime.block_on(async {
            let h = harness(Config::default(), widen);
            let ws = Workspace::new();
            let view = ws.open(uri("file:///src/lib.rs"), "rust");
            ws.set_selections(view, permuted.clone());
            h.bridge.extend_selection(&ws).await.unwrap();
            ws.selections(view)
        });

        let expected: Vec<Selection> = permuted.iter().map(widened).collect();
        prop_assert_eq!(applied, expected);
    }
}

// =============================================================================
// Matching brace
// =============================================================================

/// Matches every offset to the same column four lines down
fn brace_four_down(_: &str, params: &Value) -> Result<Value, ClientError> {
    let matched: Vec<Value> = params["offsets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| {
            json!({
                "line": p["line"].as_u64().unwrap() + 4,
                "character": p["character"]
            })
        })
        .collect();
    Ok(json!(matched))
}

/// What a matching brace answer from [`brace_four_down`] does to one selection
fn braced(selection: &Selection) -> Selection {
    let matched = pos(selection.active.line + 4, selection.active.column);
    if selection.is_empty() {
        Selection::collapsed(matched)
    } else {
        Selection::new(selection.anchor, matched)
    }
}

#[tokio::test]
async fn test_matching_brace_collapses_or_extends() {
    let h = harness(Config::default(), brace_four_down);
    let ws = Workspace::new();
    let view = ws.open(uri("file:///src/main.rs"), "rust");
    ws.set_selections(
        view,
        vec![
            Selection::collapsed(pos(0, 10)),
            Selection::new(pos(2, 0), pos(3, 1)),
        ],
    );

    let outcome = h
        .bridge
        .execute(BridgeCommand::MatchingBrace, &ws)
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::Applied);
    assert_eq!(
        ws.selections(view),
        vec![
            Selection::collapsed(pos(4, 10)),
            Selection::new(pos(2, 0), pos(7, 1)),
        ]
    );
    // Active endpoints were sent, in order
    let params = &h.backend.requests()[0].1;
    assert_eq!(params["offsets"], json!([
        { "line": 0, "character": 10 },
        { "line": 3, "character": 1 }
    ]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Mixed empty and non-empty selections: each result follows its own
    /// input wherever the input sits in the list
    #[test]
    fn prop_matching_brace_is_permutation_equivariant(
        points in prop::collection::vec(
            (0usize..500, 0usize..200, 0usize..200, any::<bool>()),
            1..8,
        ),
        seed in any::<u64>(),
    ) {
        let selections: Vec<Selection> = points
            .iter()
            .map(|&(line, a, b, empty)| {
                if empty {
                    Selection::collapsed(pos(line, a))
                } else {
                    Selection::new(pos(line, a), pos(line + 1, b))
                }
            })
            .collect();
        let mut permuted = selections.clone();
        let len = permuted.len();
        for i in (1..len).rev() {
            let j = (seed.wrapping_mul(i as u64 + 7) % (i as u64 + 1)) as usize;
            permuted.swap(i, j);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let applied = runtime.block_on(async {
            let h = harness(Config::default(), brace_four_down);
            let ws = Workspace::new();
            let view = ws.open(uri("file:///src/main.rs"), "rust");
            ws.set_selections(view, permuted.clone());
            h.bridge.find_matching_brace(&ws).await.unwrap();
            ws.selections(view)
        });

        let expected: Vec<Selection> = permuted.iter().map(braced).collect();
        prop_assert_eq!(applied, expected);
    }
}

// =============================================================================
// Decorations
// =============================================================================

#[tokio::test]
async fn test_decorations_replace_per_tag_and_are_idempotent() {
    let h = harness(Config::default(), no_backend_calls);
    let ws = Workspace::new();
    let view = ws.open(uri("file:///src/lib.rs"), "rust");
    let batch = [(0, 0, 2, "keyword"), (1, 4, 9, "function"), (2, 0, 3, "keyword")];

    push_decorations(&h, "file:///src/lib.rs", &batch);
    push_decorations(&h, "file:///src/lib.rs", &batch);
    assert_eq!(h.bridge.process_incoming(&ws).await.unwrap(), 2);

    assert_eq!(
        ws.overlay_ranges(view, DecorationTag::Keyword),
        vec![range(0, 0, 2), range(2, 0, 3)]
    );
    assert_eq!(
        ws.overlay_ranges(view, DecorationTag::Function),
        vec![range(1, 4, 9)]
    );

    // A later batch without keywords clears them
    push_decorations(&h, "file:///src/lib.rs", &[(5, 0, 8, "comment")]);
    h.bridge.process_incoming(&ws).await.unwrap();

    assert!(ws.overlay_ranges(view, DecorationTag::Keyword).is_empty());
    assert!(ws.overlay_ranges(view, DecorationTag::Function).is_empty());
    assert_eq!(
        ws.overlay_ranges(view, DecorationTag::Comment),
        vec![range(5, 0, 8)]
    );
}

#[tokio::test]
async fn test_unknown_tag_is_dropped_rest_applied() {
    let h = harness(Config::default(), no_backend_calls);
    let ws = Workspace::new();
    let view = ws.open(uri("file:///src/lib.rs"), "rust");

    push_decorations(
        &h,
        "file:///src/lib.rs",
        &[(0, 0, 2, "keyword"), (1, 0, 1, "xyz")],
    );
    h.bridge.process_incoming(&ws).await.unwrap();

    assert_eq!(ws.overlay_ranges(view, DecorationTag::Keyword), vec![range(0, 0, 2)]);
    assert_eq!(ws.overlays(view).len(), 1);
}

#[tokio::test]
async fn test_decorations_for_invisible_document_change_nothing() {
    let h = harness(Config::default(), no_backend_calls);
    let ws = Workspace::new();
    let hidden = ws.open(uri("file:///src/hidden.rs"), "rust");
    ws.hide(hidden);
    ws.open(uri("file:///src/lib.rs"), "rust");

    push_decorations(&h, "file:///src/hidden.rs", &[(0, 0, 2, "keyword")]);
    push_decorations(&h, "file:///src/never_opened.rs", &[(0, 0, 2, "keyword")]);
    h.bridge.process_incoming(&ws).await.unwrap();

    assert_eq!(ws.decoration_updates(), 0);
    assert!(ws.overlays(hidden).is_empty());
}

// =============================================================================
// Server requests
// =============================================================================

#[tokio::test]
async fn test_move_cursor_request_is_applied_and_acknowledged() {
    let h = harness(Config::default(), no_backend_calls);
    let ws = Workspace::new();
    let view = ws.open(uri("file:///src/lib.rs"), "rust");

    h.server
        .send(IncomingMessage::Request {
            id: NumberOrString::Number(3),
            method: "m/moveCursor".to_string(),
            params: json!({ "line": 12, "character": 4 }),
        })
        .unwrap();
    assert!(h.bridge.handle_next_incoming(&ws).await.unwrap());

    assert_eq!(ws.selections(view), vec![Selection::collapsed(pos(12, 4))]);
    let responses = h.backend.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].0, NumberOrString::Number(3));
    assert_eq!(responses[0].1, Ok(Value::Null));
}

// =============================================================================
// Syntax tree document
// =============================================================================

#[tokio::test]
async fn test_show_syntax_tree_opens_beside_and_keeps_focus() {
    let h = harness(Config::default(), |_, _| Ok(json!("SOURCE_FILE@[0; 42)")));
    let ws = Workspace::new();
    let editor = ws.open(uri("file:///src/lib.rs"), "rust");

    let outcome = h.bridge.execute(BridgeCommand::ShowSyntaxTree, &ws).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Applied);
    let tree_uri = h.bridge.syntax_tree_uri().clone();
    assert_eq!(tree_uri.as_str(), "libsyntax-rust://syntaxtree");
    let tree_view = ws.view_for(&tree_uri).unwrap();
    assert_eq!(ws.column(tree_view), Some(ViewColumn::Two));
    assert_eq!(ws.active_id(), Some(editor));
    assert_eq!(
        ws.virtual_content(&tree_uri).as_deref(),
        Some("SOURCE_FILE@[0; 42)")
    );
}

#[tokio::test]
async fn test_virtual_read_is_verbatim_including_empty() {
    let h = harness(Config::default(), |_, _| Ok(json!("")));
    let ws = Workspace::new();

    assert_eq!(h.bridge.virtual_document().read(&ws).await.unwrap(), PLACEHOLDER);

    ws.open(uri("file:///src/lib.rs"), "rust");
    assert_eq!(h.bridge.virtual_document().read(&ws).await.unwrap(), "");
}

#[tokio::test(start_paused = true)]
async fn test_one_invalidation_per_edit() {
    let mut h = harness(Config::default(), no_backend_calls);
    let doc = uri("file:///src/lib.rs");

    assert!(h.bridge.on_document_changed(&doc, "rust"));
    assert!(h.bridge.on_document_changed(&doc, "rust"));
    assert!(h.bridge.on_document_changed(&doc, "rust"));
    assert!(!h.bridge.on_document_changed(&uri("file:///notes.txt"), "plaintext"));
    let tree_uri = h.bridge.syntax_tree_uri().clone();
    assert!(!h.bridge.on_document_changed(&tree_uri, "rust"));

    // Nothing before the delay
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(h.bridge.try_next_invalidation().is_none());

    tokio::time::sleep(Duration::from_millis(10)).await;
    for _ in 0..3 {
        assert_eq!(h.bridge.next_invalidation().await, Some(tree_uri.clone()));
    }
    assert!(h.bridge.try_next_invalidation().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_coalesced_burst_fires_once() {
    let config = Config {
        coalesce_invalidations: true,
        ..Config::default()
    };
    let mut h = harness(config, no_backend_calls);
    let doc = uri("file:///src/lib.rs");

    for _ in 0..5 {
        h.bridge.on_document_changed(&doc, "rust");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(h.bridge.next_invalidation().await.is_some());
    assert!(h.bridge.try_next_invalidation().is_none());
}

// =============================================================================
// Overlapping invocations
// =============================================================================

/// First request answers with end column 10, second with 20, and so on
fn numbered_widen(
) -> impl Fn(&str, &Value) -> Result<Value, ClientError> + Send + Sync + 'static {
    let calls = Arc::new(AtomicUsize::new(0));
    move |_, _| {
        let n = calls.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(json!({ "selections": [{
            "start": { "line": 0, "character": 0 },
            "end": { "line": 0, "character": 10 * (n + 1) }
        }]}))
    }
}

async fn overlapping_extends(config: Config) -> (Vec<Selection>, CommandOutcome, CommandOutcome) {
    let h = harness_with_delays(
        config,
        numbered_widen(),
        [Duration::from_millis(50), Duration::from_millis(10)],
    );
    let ws = Workspace::new();
    let view = ws.open(uri("file:///src/lib.rs"), "rust");

    let (first, second) = tokio::join!(
        h.bridge.extend_selection(&ws),
        h.bridge.extend_selection(&ws)
    );
    (ws.selections(view), first.unwrap(), second.unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_invocations_last_arrival_wins_by_default() {
    let (selections, first, second) = overlapping_extends(Config::default()).await;

    assert_eq!(first, CommandOutcome::Applied);
    assert_eq!(second, CommandOutcome::Applied);
    // The older, slower response landed last
    assert_eq!(selections, vec![Selection::new(pos(0, 0), pos(0, 10))]);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_invocations_stale_dropped_when_sequenced() {
    let config = Config {
        drop_stale_responses: true,
        ..Config::default()
    };
    let (selections, first, second) = overlapping_extends(config).await;

    assert_eq!(first, CommandOutcome::Stale);
    assert_eq!(second, CommandOutcome::Applied);
    assert_eq!(selections, vec![Selection::new(pos(0, 0), pos(0, 20))]);
}

#[tokio::test(start_paused = true)]
async fn test_decorations_apply_while_a_command_awaits_the_backend() {
    let h = harness_with_delays(Config::default(), widen, [Duration::from_millis(50)]);
    let ws = Workspace::new();
    let view = ws.open(uri("file:///src/lib.rs"), "rust");
    let original = ws.selections(view);
    push_decorations(&h, "file:///src/lib.rs", &[(0, 0, 2, "keyword")]);

    let (extended, pumped) = tokio::join!(h.bridge.extend_selection(&ws), async {
        let handled = h.bridge.process_incoming(&ws).await.unwrap();
        // The extend request is still in flight
        assert_eq!(ws.selections(view), original);
        assert_eq!(ws.overlay_ranges(view, DecorationTag::Keyword), vec![range(0, 0, 2)]);
        handled
    });

    assert_eq!(pumped, 1);
    assert_eq!(extended.unwrap(), CommandOutcome::Applied);
    assert_eq!(
        ws.selections(view),
        original.iter().map(widened).collect::<Vec<_>>()
    );
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_deactivate_stops_once_and_disables_commands() {
    let mut h = harness(Config::default(), no_backend_calls);
    let ws = Workspace::new();
    ws.open(uri("file:///src/lib.rs"), "rust");

    h.bridge.deactivate().await.unwrap();
    h.bridge.deactivate().await.unwrap();

    assert_eq!(h.backend.shutdown_count(), 1);
    assert!(!h.bridge.is_connected());
    for command in BridgeCommand::ALL {
        assert_eq!(
            h.bridge.execute(command, &ws).await.unwrap(),
            CommandOutcome::Skipped
        );
    }
    assert_eq!(h.bridge.virtual_document().read(&ws).await.unwrap(), PLACEHOLDER);
}

#[tokio::test]
async fn test_detached_bridge_is_inert() {
    let mut bridge = Bridge::detached(Config::default()).unwrap();
    let ws = Workspace::new();
    ws.open(uri("file:///src/lib.rs"), "rust");

    assert_eq!(
        bridge.execute(BridgeCommand::ShowSyntaxTree, &ws).await.unwrap(),
        CommandOutcome::Skipped
    );
    assert_eq!(bridge.process_incoming(&ws).await.unwrap(), 0);
    assert!(bridge.deactivate().await.is_ok());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = Config {
        language_id: String::new(),
        ..Config::default()
    };
    assert!(Bridge::detached(config).is_err());
}
