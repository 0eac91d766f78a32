// Shared helpers for integration tests

#![allow(dead_code)]

pub mod tracing;

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use syntax_bridge::services::lsp::testing::ScriptedTransport;
use syntax_bridge::services::lsp::transport::IncomingMessage;
use syntax_bridge::services::lsp::ClientError;
use syntax_bridge::{Bridge, Config};
use tokio::sync::mpsc;

/// A bridge wired to a scripted backend
pub struct Harness {
    pub bridge: Bridge,
    pub backend: Arc<ScriptedTransport>,
    /// Inject server-initiated messages
    pub server: mpsc::UnboundedSender<IncomingMessage>,
}

pub fn harness<F>(config: Config, responder: F) -> Harness
where
    F: Fn(&str, &Value) -> Result<Value, ClientError> + Send + Sync + 'static,
{
    harness_with_delays(config, responder, [])
}

pub fn harness_with_delays<F>(
    config: Config,
    responder: F,
    delays: impl IntoIterator<Item = Duration>,
) -> Harness
where
    F: Fn(&str, &Value) -> Result<Value, ClientError> + Send + Sync + 'static,
{
    self::tracing::init_tracing_from_env();
    let backend = Arc::new(ScriptedTransport::new(responder).with_delays(delays));
    let (server, incoming) = mpsc::unbounded_channel();
    let bridge = Bridge::with_transport(config, backend.clone(), incoming).unwrap();
    Harness {
        bridge,
        backend,
        server,
    }
}

pub fn uri(s: &str) -> lsp_types::Uri {
    s.parse().unwrap()
}
