//! Backend process transport over stdin/stdout
//!
//! The backend is spawned as a child process. Two tokio tasks own the
//! pipes: a writer that drains an outgoing queue, and a reader that routes
//! responses to waiting requests (by id, through oneshot channels) and
//! forwards server-initiated messages to an unbounded channel.

use super::codec::{self, RawMessage};
use super::error::ClientError;
use super::transport::{IncomingMessage, ResponseError, Transport};
use crate::config::ServerConfig;
use async_trait::async_trait;
use lsp_types::{InitializeResult, NumberOrString};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};

/// Type alias for the map of requests waiting on a response.
///
/// A std mutex: it is never held across an await, and the reader teardown
/// must be able to take it from `Drop`.
type PendingRequests =
    Arc<std::sync::Mutex<HashMap<i32, oneshot::Sender<Result<Value, ResponseError>>>>>;

fn lock_pending(
    pending: &PendingRequests,
) -> std::sync::MutexGuard<'_, HashMap<i32, oneshot::Sender<Result<Value, ResponseError>>>> {
    pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Owned by the reader task. However the task ends (EOF, read error or
/// panic), dropping this marks the connection dead and fails every waiter.
struct ReaderTeardown {
    alive: Arc<AtomicBool>,
    pending: PendingRequests,
}

impl Drop for ReaderTeardown {
    fn drop(&mut self) {
        // Under the lock, so a concurrent send_request either sees the
        // connection dead or has its sender cleared here
        let mut pending = lock_pending(&self.pending);
        self.alive.store(false, Ordering::Release);
        if !pending.is_empty() {
            tracing::debug!("failing {} pending requests", pending.len());
        }
        // Dropping the senders wakes every waiter with NotRunning
        pending.clear();
    }
}

/// How long `shutdown` waits for the server to answer and exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct StdioTransport {
    outgoing: mpsc::UnboundedSender<Value>,
    pending: PendingRequests,
    next_id: AtomicI32,
    request_timeout: Option<Duration>,
    /// Cleared by the reader task when the server's output ends
    alive: Arc<AtomicBool>,
    shut_down: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("alive", &self.alive.load(Ordering::Relaxed))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl StdioTransport {
    /// Spawn the backend described by `config` and wire up its pipes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: &ServerConfig,
        request_timeout: Option<Duration>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<IncomingMessage>), ClientError> {
        tracing::info!(
            "spawning backend {} {:?} in {}",
            config.command,
            config.args,
            config.cwd.display()
        );

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .current_dir(&config.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::Transport("backend stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::Transport("backend stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "syntax_bridge::backend", "{line}");
                }
            });
        }

        Ok(Self::from_streams(stdout, stdin, Some(child), request_timeout))
    }

    /// Build a transport over arbitrary streams (used for in-process servers).
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_streams<R, W>(
        reader: R,
        writer: W,
        child: Option<Child>,
        request_timeout: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<IncomingMessage>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Value>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let pending: PendingRequests = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        tokio::spawn(async move {
            let mut writer = writer;
            while let Some(message) = outgoing_rx.recv().await {
                if let Err(e) = codec::write_message(&mut writer, &message).await {
                    tracing::error!("failed to write to backend: {e}");
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let teardown = ReaderTeardown {
            alive: alive.clone(),
            pending: pending.clone(),
        };
        tokio::spawn(async move {
            let _teardown = teardown;
            let mut reader = BufReader::new(reader);
            loop {
                match codec::read_message(&mut reader).await {
                    Ok(Some(value)) => match codec::classify(value) {
                        Some(RawMessage::Response { id, result }) => {
                            let id = match id {
                                NumberOrString::Number(id) => id,
                                NumberOrString::String(id) => {
                                    tracing::warn!("response with non-numeric id {id:?}");
                                    continue;
                                }
                            };
                            let waiter = lock_pending(&reader_pending).remove(&id);
                            match waiter {
                                Some(waiter) => {
                                    let _ = waiter.send(result);
                                }
                                None => tracing::warn!("response for unknown request id {id}"),
                            }
                        }
                        Some(RawMessage::Incoming(message)) => {
                            tracing::debug!("<- {}", message.method());
                            if incoming_tx.send(message).is_err() {
                                tracing::debug!("incoming channel closed, dropping message");
                            }
                        }
                        None => tracing::warn!("ignoring message that is neither request nor response"),
                    },
                    Ok(None) => {
                        tracing::debug!("backend closed its output");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("failed to read from backend: {e}");
                        break;
                    }
                }
            }
        });

        let transport = Self {
            outgoing: outgoing_tx,
            pending,
            next_id: AtomicI32::new(1),
            request_timeout,
            alive,
            shut_down: AtomicBool::new(false),
            child: Mutex::new(child),
        };
        (transport, incoming_rx)
    }

    /// Run the `initialize`/`initialized` handshake. The connection is ready
    /// once this returns.
    pub async fn initialize(
        &self,
        initialization_options: Option<Value>,
    ) -> Result<InitializeResult, ClientError> {
        let params = json!({
            "processId": std::process::id(),
            "rootUri": null,
            "capabilities": {},
            "initializationOptions": initialization_options,
        });
        let value = self.send_request("initialize", params).await?;
        let result: InitializeResult = serde_json::from_value(value)?;
        if let Some(info) = &result.server_info {
            tracing::info!(
                "backend {} {} initialized",
                info.name,
                info.version.as_deref().unwrap_or("")
            );
        }
        self.notify("initialized", json!({})).await?;
        Ok(result)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            // Checked under the same lock the reader teardown takes
            let mut pending = lock_pending(&self.pending);
            if !self.is_alive() {
                return Err(ClientError::NotRunning);
            }
            pending.insert(id, tx);
        }

        if self
            .outgoing
            .send(codec::request_message(id, method, params))
            .is_err()
        {
            lock_pending(&self.pending).remove(&id);
            return Err(ClientError::NotRunning);
        }
        tracing::debug!("-> {method} (id {id})");

        let response = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(response) => response,
                Err(_) => {
                    lock_pending(&self.pending).remove(&id);
                    tracing::warn!("{method} (id {id}) timed out after {limit:?}");
                    return Err(ClientError::Timeout {
                        method: method.to_string(),
                    });
                }
            },
            None => rx.await,
        };

        match response {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(error.into()),
            Err(_) => Err(ClientError::NotRunning),
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(ClientError::NotRunning);
        }
        self.send_request(method, params).await
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ClientError> {
        self.outgoing
            .send(codec::notification_message(method, params))
            .map_err(|_| ClientError::NotRunning)
    }

    async fn respond(
        &self,
        id: NumberOrString,
        response: Result<Value, ResponseError>,
    ) -> Result<(), ClientError> {
        self.outgoing
            .send(codec::response_message(&id, response))
            .map_err(|_| ClientError::NotRunning)
    }

    async fn shutdown(&self) -> Result<(), ClientError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let result =
            match tokio::time::timeout(SHUTDOWN_GRACE, self.send_request("shutdown", Value::Null))
                .await
            {
                Ok(result) => result.map(|_| ()),
                Err(_) => Err(ClientError::Timeout {
                    method: "shutdown".to_string(),
                }),
            };
        if let Err(e) = &result {
            tracing::warn!("backend did not acknowledge shutdown: {e}");
        }
        let _ = self
            .outgoing
            .send(codec::notification_message("exit", Value::Null));

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!("backend exited with {status}"),
                _ => {
                    tracing::warn!("backend did not exit, killing it");
                    let _ = child.kill().await;
                }
            }
        }

        match result {
            Err(ClientError::NotRunning) => Ok(()),
            other => other,
        }
    }
}
