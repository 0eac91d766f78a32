//! Protocol extension client
//!
//! [`ExtensionClient`] is the single point of contact with the backend. It
//! owns the transport, sends the typed custom requests, and routes
//! server-initiated messages through a [`HandlerTable`] keyed by method
//! name. Handlers are plain functions of `(params, host)`; they see the host
//! only through the [`Host`] trait and keep no state of their own.

use super::error::ClientError;
use super::ext::{
    ExtendSelection, ExtendSelectionParams, FindMatchingBrace, FindMatchingBraceParams, SyntaxTree,
    SyntaxTreeParams,
};
use super::transport::{ErrorCode, IncomingMessage, ResponseError, Transport};
use crate::host::Host;
use lsp_types::notification::Notification;
use lsp_types::request::Request;
use lsp_types::{NumberOrString, Position, Range, TextDocumentIdentifier, Uri};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

type NotificationHandler = Box<dyn Fn(Value, &dyn Host) -> Result<(), ClientError> + Send + Sync>;
type RequestHandler = Box<dyn Fn(Value, &dyn Host) -> Result<Value, ClientError> + Send + Sync>;

/// Dispatch table for server-initiated messages
#[derive(Default)]
pub struct HandlerTable {
    notifications: HashMap<&'static str, NotificationHandler>,
    requests: HashMap<&'static str, RequestHandler>,
}

/// What happened to one incoming message
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// A notification handler ran
    Handled,
    /// No handler is registered for the notification
    Ignored,
    /// A server request was answered (result or error)
    Reply {
        id: NumberOrString,
        response: Result<Value, ResponseError>,
    },
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for notification `N`, replacing any previous one
    pub fn on_notification<N>(&mut self, handler: fn(N::Params, &dyn Host))
    where
        N: Notification + 'static,
    {
        self.notifications.insert(
            N::METHOD,
            Box::new(move |params: Value, host: &dyn Host| {
                let params: N::Params = serde_json::from_value(params)?;
                handler(params, host);
                Ok(())
            }),
        );
    }

    /// Register the handler for server request `R`, replacing any previous one
    pub fn on_request<R>(&mut self, handler: fn(R::Params, &dyn Host) -> R::Result)
    where
        R: Request + 'static,
    {
        self.requests.insert(
            R::METHOD,
            Box::new(move |params: Value, host: &dyn Host| {
                let params: R::Params = serde_json::from_value(params)?;
                Ok(serde_json::to_value(handler(params, host))?)
            }),
        );
    }

    pub fn handles(&self, method: &str) -> bool {
        self.notifications.contains_key(method) || self.requests.contains_key(method)
    }

    /// Run the handler for `message` against `host`
    pub fn dispatch(&self, message: IncomingMessage, host: &dyn Host) -> Dispatched {
        match message {
            IncomingMessage::Notification { method, params } => {
                let Some(handler) = self.notifications.get(method.as_str()) else {
                    tracing::debug!("no handler for notification {method}");
                    return Dispatched::Ignored;
                };
                if let Err(e) = handler(params, host) {
                    tracing::warn!("failed to handle {method}: {e}");
                }
                Dispatched::Handled
            }
            IncomingMessage::Request { id, method, params } => {
                let response = match self.requests.get(method.as_str()) {
                    Some(handler) => handler(params, host).map_err(|e| {
                        tracing::warn!("failed to handle {method}: {e}");
                        ResponseError::new(ErrorCode::InvalidParams, e.to_string())
                    }),
                    None => {
                        tracing::debug!("no handler for request {method}");
                        Err(ResponseError::new(
                            ErrorCode::MethodNotFound,
                            format!("method not found: {method}"),
                        ))
                    }
                };
                Dispatched::Reply { id, response }
            }
        }
    }
}

/// Typed client for the custom protocol methods
pub struct ExtensionClient {
    transport: Arc<dyn Transport>,
    handlers: HandlerTable,
}

impl ExtensionClient {
    /// Wrap a transport whose connection is already initialized.
    ///
    /// Installs the default push handlers; they stay registered for the
    /// client's lifetime.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let mut handlers = HandlerTable::new();
        super::handlers::register_default_handlers(&mut handlers);
        Self::with_handlers(transport, handlers)
    }

    pub fn with_handlers(transport: Arc<dyn Transport>, handlers: HandlerTable) -> Self {
        Self {
            transport,
            handlers,
        }
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// Send a typed request and decode its result
    pub async fn send_request<R>(&self, params: R::Params) -> Result<R::Result, ClientError>
    where
        R: Request,
    {
        let params = serde_json::to_value(params)?;
        let value = self.transport.request(R::METHOD, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Grow each selection to its enclosing syntactic unit.
    ///
    /// The result has one range per input range, in input order.
    pub async fn extend_selection(
        &self,
        uri: Uri,
        selections: Vec<Range>,
    ) -> Result<Vec<Range>, ClientError> {
        let expected = selections.len();
        let result = self
            .send_request::<ExtendSelection>(ExtendSelectionParams {
                text_document: TextDocumentIdentifier { uri },
                selections,
            })
            .await?;
        check_len(ExtendSelection::METHOD, expected, result.selections.len())?;
        Ok(result.selections)
    }

    /// Find the delimiter matching the one at each offset.
    ///
    /// The result has one position per input offset, in input order.
    pub async fn find_matching_brace(
        &self,
        uri: Uri,
        offsets: Vec<Position>,
    ) -> Result<Vec<Position>, ClientError> {
        let expected = offsets.len();
        let result = self
            .send_request::<FindMatchingBrace>(FindMatchingBraceParams {
                text_document: TextDocumentIdentifier { uri },
                offsets,
            })
            .await?;
        check_len(FindMatchingBrace::METHOD, expected, result.len())?;
        Ok(result)
    }

    /// Textual dump of the document's parse tree. Never cached.
    pub async fn syntax_tree(&self, uri: Uri) -> Result<String, ClientError> {
        self.send_request::<SyntaxTree>(SyntaxTreeParams {
            text_document: TextDocumentIdentifier { uri },
        })
        .await
    }

    /// Route one server-initiated message, answering it if it is a request
    pub async fn handle_incoming(
        &self,
        message: IncomingMessage,
        host: &dyn Host,
    ) -> Result<Dispatched, ClientError> {
        let dispatched = self.handlers.dispatch(message, host);
        if let Dispatched::Reply { id, response } = &dispatched {
            self.transport.respond(id.clone(), response.clone()).await?;
        }
        Ok(dispatched)
    }

    /// Tear down the connection
    pub async fn stop(&self) -> Result<(), ClientError> {
        self.transport.shutdown().await
    }
}

fn check_len(method: &'static str, expected: usize, actual: usize) -> Result<(), ClientError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ClientError::LengthMismatch {
            method,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::workspace::Workspace;
    use crate::services::lsp::ext::PublishDecorations;
    use crate::services::lsp::testing::ScriptedTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn uri() -> Uri {
        "file:///src/lib.rs".parse().unwrap()
    }

    fn range(line: u32, from: u32, to: u32) -> Range {
        Range::new(Position::new(line, from), Position::new(line, to))
    }

    #[tokio::test]
    async fn test_extend_selection_sends_batched_request() {
        let transport = Arc::new(ScriptedTransport::new(|_, params| {
            // Widen every range to the whole line
            let widened: Vec<Value> = params["selections"]
                .as_array()
                .unwrap()
                .iter()
                .map(|r| {
                    json!({
                        "start": { "line": r["start"]["line"], "character": 0 },
                        "end": { "line": r["end"]["line"], "character": 80 }
                    })
                })
                .collect();
            Ok(json!({ "selections": widened }))
        }));
        let client = ExtensionClient::new(transport.clone());

        let result = client
            .extend_selection(uri(), vec![range(3, 4, 5), range(1, 2, 2)])
            .await
            .unwrap();

        assert_eq!(result, vec![range(3, 0, 80), range(1, 0, 80)]);
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "m/extendSelection");
        assert_eq!(requests[0].1["textDocument"]["uri"], "file:///src/lib.rs");
    }

    #[tokio::test]
    async fn test_length_mismatch_is_error() {
        let transport = Arc::new(ScriptedTransport::new(|_, _| {
            Ok(json!([{ "line": 0, "character": 0 }]))
        }));
        let client = ExtensionClient::new(transport);

        let err = client
            .find_matching_brace(uri(), vec![Position::new(0, 1), Position::new(0, 2)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::LengthMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_syntax_tree_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let transport = Arc::new(ScriptedTransport::new(move |_, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!(format!("tree #{n}")))
        }));
        let client = ExtensionClient::new(transport);

        assert_eq!(client.syntax_tree(uri()).await.unwrap(), "tree #0");
        assert_eq!(client.syntax_tree(uri()).await.unwrap(), "tree #1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            Err(ClientError::Timeout {
                method: method.to_string(),
            })
        }));
        let client = ExtensionClient::new(transport.clone());

        let err = client.syntax_tree(uri()).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));
        // No retry
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_default_handlers_are_installed() {
        let client = ExtensionClient::new(Arc::new(ScriptedTransport::new(|_, _| Ok(Value::Null))));
        assert!(client.handlers().handles(PublishDecorations::METHOD));
        assert!(client.handlers().handles("m/moveCursor"));
        assert!(!client.handlers().handles("textDocument/publishDiagnostics"));
    }

    #[tokio::test]
    async fn test_unknown_server_request_gets_method_not_found() {
        let transport = Arc::new(ScriptedTransport::new(|_, _| Ok(Value::Null)));
        let client = ExtensionClient::new(transport.clone());
        let workspace = Workspace::new();

        let dispatched = client
            .handle_incoming(
                IncomingMessage::Request {
                    id: NumberOrString::Number(5),
                    method: "m/unknown".to_string(),
                    params: Value::Null,
                },
                &workspace,
            )
            .await
            .unwrap();

        assert!(matches!(dispatched, Dispatched::Reply { response: Err(_), .. }));
        let responses = transport.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, NumberOrString::Number(5));
        let error = responses[0].1.as_ref().unwrap_err();
        assert_eq!(error.code, ErrorCode::MethodNotFound as i64);
        assert_eq!(error.message, "method not found: m/unknown");
    }

    #[tokio::test]
    async fn test_unknown_notification_is_ignored() {
        let transport = Arc::new(ScriptedTransport::new(|_, _| Ok(Value::Null)));
        let client = ExtensionClient::new(transport.clone());
        let workspace = Workspace::new();

        let dispatched = client
            .handle_incoming(
                IncomingMessage::Notification {
                    method: "window/logMessage".to_string(),
                    params: json!({ "type": 3, "message": "hi" }),
                },
                &workspace,
            )
            .await
            .unwrap();

        assert_eq!(dispatched, Dispatched::Ignored);
        assert!(transport.responses().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_request_params_get_error_reply() {
        let transport = Arc::new(ScriptedTransport::new(|_, _| Ok(Value::Null)));
        let client = ExtensionClient::new(transport.clone());
        let workspace = Workspace::new();

        client
            .handle_incoming(
                IncomingMessage::Request {
                    id: NumberOrString::Number(1),
                    method: "m/moveCursor".to_string(),
                    params: json!("not a position"),
                },
                &workspace,
            )
            .await
            .unwrap();

        let responses = transport.responses();
        assert_eq!(
            responses[0].1.as_ref().unwrap_err().code,
            ErrorCode::InvalidParams as i64
        );
    }
}
