//! In-process transport for tests and host integration harnesses
//!
//! [`ScriptedTransport`] answers requests with a user-supplied function and
//! records everything the client sends. Optional per-request delays (taken
//! in request order) let tests reorder responses under tokio's paused clock.
//! The responder runs when the request is sent, so its answers follow send
//! order even when delivery is reordered.

use super::error::ClientError;
use super::transport::{ResponseError, Transport};
use async_trait::async_trait;
use lsp_types::NumberOrString;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Responder = Box<dyn Fn(&str, &Value) -> Result<Value, ClientError> + Send + Sync>;

pub struct ScriptedTransport {
    responder: Responder,
    delays: Mutex<VecDeque<Duration>>,
    requests: Mutex<Vec<(String, Value)>>,
    notifications: Mutex<Vec<(String, Value)>>,
    responses: Mutex<Vec<(NumberOrString, Result<Value, ResponseError>)>>,
    shutdowns: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value, ClientError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delays: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
        }
    }

    /// Delay the nth request by the nth duration
    pub fn with_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        if let Ok(mut queue) = self.delays.lock() {
            queue.extend(delays);
        }
        self
    }

    /// Requests sent so far, as `(method, params)`
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<(String, Value)> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    /// Answers sent to server-initiated requests
    pub fn responses(&self) -> Vec<(NumberOrString, Result<Value, ResponseError>)> {
        self.responses.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((method.to_string(), params.clone()));
        }
        // Answer is decided at send time; the delay only holds it back
        let response = (self.responder)(method, &params);
        let delay = self.delays.lock().ok().and_then(|mut d| d.pop_front());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ClientError> {
        if let Ok(mut notifications) = self.notifications.lock() {
            notifications.push((method.to_string(), params));
        }
        Ok(())
    }

    async fn respond(
        &self,
        id: NumberOrString,
        response: Result<Value, ResponseError>,
    ) -> Result<(), ClientError> {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push((id, response));
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ClientError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
