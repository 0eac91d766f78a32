//! Transport boundary between the extension client and a backend process
//!
//! A transport moves JSON-RPC payloads; it knows nothing about the custom
//! methods. Server-initiated traffic arrives separately as
//! [`IncomingMessage`]s on a channel owned by whoever created the transport.

use super::error::ClientError;
use async_trait::async_trait;
use lsp_types::NumberOrString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message initiated by the server
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Fire-and-forget push
    Notification { method: String, params: Value },
    /// Request that must be answered via [`Transport::respond`]
    Request {
        id: NumberOrString,
        method: String,
        params: Value,
    },
}

impl IncomingMessage {
    pub fn method(&self) -> &str {
        match self {
            IncomingMessage::Notification { method, .. } => method,
            IncomingMessage::Request { method, .. } => method,
        }
    }
}

/// JSON-RPC error codes used when answering server requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}

/// Error object of a JSON-RPC response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i64,
            message: message.into(),
        }
    }
}

impl From<ResponseError> for ClientError {
    fn from(err: ResponseError) -> Self {
        ClientError::Server {
            code: err.code,
            message: err.message,
        }
    }
}

/// Moves JSON-RPC payloads to and from the backend
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its result
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError>;

    /// Send a notification
    async fn notify(&self, method: &str, params: Value) -> Result<(), ClientError>;

    /// Answer a server-initiated request
    async fn respond(
        &self,
        id: NumberOrString,
        response: Result<Value, ResponseError>,
    ) -> Result<(), ClientError>;

    /// Shut the session down. Calling it twice is allowed.
    async fn shutdown(&self) -> Result<(), ClientError>;
}
