//! Edit-driven invalidation of the syntax tree document
//!
//! Every edit to a document of the configured language schedules one
//! invalidation signal after a short delay, giving the backend time to see
//! the change before the tree is re-read. In coalescing mode a newer edit
//! to the same document cancels the pending signal instead of adding one.

use lsp_types::Uri;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct ChangeWatcher {
    language_id: String,
    delay: Duration,
    coalesce: bool,
    /// The virtual document itself; its own changes never schedule anything
    target: Uri,
    signals: mpsc::UnboundedSender<Uri>,
    timers: Vec<(Uri, JoinHandle<()>)>,
    scheduled: usize,
}

impl ChangeWatcher {
    pub fn new(
        language_id: impl Into<String>,
        delay: Duration,
        coalesce: bool,
        target: Uri,
        signals: mpsc::UnboundedSender<Uri>,
    ) -> Self {
        Self {
            language_id: language_id.into(),
            delay,
            coalesce,
            target,
            signals,
            timers: Vec::new(),
            scheduled: 0,
        }
    }

    /// Record an edit to `uri`. Returns true if an invalidation was scheduled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_document_changed(&mut self, uri: &Uri, language_id: &str) -> bool {
        if language_id != self.language_id || uri == &self.target {
            return false;
        }

        self.timers.retain(|(_, handle)| !handle.is_finished());

        if self.coalesce {
            self.timers.retain(|(edited, handle)| {
                if edited == uri {
                    handle.abort();
                    tracing::trace!("coalesced invalidation for {}", uri.as_str());
                    false
                } else {
                    true
                }
            });
        }

        let delay = self.delay;
        let target = self.target.clone();
        let signals = self.signals.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if signals.send(target).is_err() {
                tracing::debug!("invalidation dropped: receiver gone");
            }
        });

        self.timers.push((uri.clone(), handle));
        self.scheduled += 1;
        true
    }

    /// Timers scheduled since creation, including cancelled ones
    pub fn scheduled(&self) -> usize {
        self.scheduled
    }

    /// Timers that have not fired yet
    pub fn pending(&self) -> usize {
        self.timers
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Abort every pending timer
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
