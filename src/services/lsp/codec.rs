//! JSON-RPC framing over a byte stream
//!
//! Messages are `Content-Length` framed as in the base language server
//! protocol. Other headers are read and ignored.

use super::transport::{ErrorCode, IncomingMessage, ResponseError};
use lsp_types::NumberOrString;
use serde_json::{json, Map, Value};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest body the reader accepts. Larger frames are rejected before
/// anything is allocated.
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

/// A decoded message, either a response to one of our requests or
/// something the server initiated
#[derive(Debug, Clone, PartialEq)]
pub enum RawMessage {
    Response {
        id: NumberOrString,
        result: Result<Value, ResponseError>,
    },
    Incoming(IncomingMessage),
}

/// Read one framed message. Returns `Ok(None)` on a clean end of stream.
pub async fn read_message<R>(reader: &mut R) -> io::Result<Option<Value>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return match content_length {
                None => Ok(None),
                Some(_) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended inside message header",
                )),
            };
        }

        let header = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
        if header.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }

        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let len = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                if len > MAX_CONTENT_LENGTH {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("content length {len} exceeds {MAX_CONTENT_LENGTH}"),
                    ));
                }
                content_length = Some(len);
            }
        } else {
            tracing::warn!("ignoring malformed header line {header:?}");
        }
    }

    let len = content_length.unwrap_or_default();
    let mut body = vec![0; len];
    reader.read_exact(&mut body).await?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Frame a message for the wire
pub fn encode_message(message: &Value) -> Vec<u8> {
    let body = message.to_string();
    let mut out = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    out.extend_from_slice(body.as_bytes());
    out
}

/// Write one framed message and flush
pub async fn write_message<W>(writer: &mut W, message: &Value) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_message(message)).await?;
    writer.flush().await
}

pub fn request_message(id: i32, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

pub fn notification_message(method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "method": method, "params": params })
}

pub fn response_message(id: &NumberOrString, response: Result<Value, ResponseError>) -> Value {
    match response {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(error) => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
    }
}

/// Sort a decoded JSON value into a response or a server-initiated message.
///
/// Returns None for values that are neither (no method and no id).
pub fn classify(value: Value) -> Option<RawMessage> {
    let Value::Object(mut obj) = value else {
        return None;
    };

    let method = match obj.remove("method") {
        Some(Value::String(method)) => Some(method),
        _ => None,
    };
    let id = obj
        .remove("id")
        .and_then(|id| serde_json::from_value::<NumberOrString>(id).ok());
    let params = obj.remove("params").unwrap_or(Value::Null);

    match (method, id) {
        (Some(method), Some(id)) => Some(RawMessage::Incoming(IncomingMessage::Request {
            id,
            method,
            params,
        })),
        (Some(method), None) => Some(RawMessage::Incoming(IncomingMessage::Notification {
            method,
            params,
        })),
        (None, Some(id)) => Some(RawMessage::Response {
            id,
            result: response_result(obj),
        }),
        (None, None) => None,
    }
}

fn response_result(mut obj: Map<String, Value>) -> Result<Value, ResponseError> {
    match obj.remove("error") {
        Some(error) if !error.is_null() => Err(serde_json::from_value(error).unwrap_or_else(
            |_| ResponseError::new(ErrorCode::InternalError, "malformed error object"),
        )),
        _ => Ok(obj.remove("result").unwrap_or(Value::Null)),
    }
}
