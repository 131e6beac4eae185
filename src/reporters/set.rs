//! # ReporterSet: non-blocking fan-out over multiple reporters
//!
//! [`ReporterSet`] hands each [`StatusUpdate`] to every reporter **without
//! awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&StatusUpdate)` returns immediately.
//! - Per-reporter FIFO.
//! - Panics inside reporters are caught and logged.
//!
//! ## What it does **not** guarantee
//! - No ordering across different reporters.
//! - No retries on queue overflow (the update is dropped for that reporter).

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::StatusUpdate;

use super::StatusReporter;

struct ReporterChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<StatusUpdate>>,
}

/// Composite fan-out with per-reporter bounded queues and worker tasks.
pub struct ReporterSet {
    channels: Vec<ReporterChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl ReporterSet {
    /// Creates a new set and spawns one worker per reporter.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(reporters: Vec<Arc<dyn StatusReporter>>) -> Self {
        let mut channels = Vec::with_capacity(reporters.len());
        let mut workers = Vec::with_capacity(reporters.len());

        for reporter in reporters {
            let name = reporter.name();
            let (tx, mut rx) = mpsc::channel::<Arc<StatusUpdate>>(reporter.queue_capacity().max(1));

            let handle = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    let fut = reporter.report(update.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        tracing::error!(reporter = name, ?panic, "status reporter panicked");
                    }
                }
            });

            channels.push(ReporterChannel { name, sender: tx });
            workers.push(handle);
        }

        Self { channels, workers }
    }

    /// Fans one update out to every reporter (non-blocking).
    pub fn emit(&self, update: &StatusUpdate) {
        let update = Arc::new(update.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&update)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(reporter = channel.name, "status update dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(reporter = channel.name, "status update dropped: worker closed");
                }
            }
        }
    }

    /// Closes all queues and waits for the workers to drain them.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no reporters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of reporters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}
