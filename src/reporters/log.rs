//! # LogReporter: status updates through `tracing`
//!
//! ## Example output
//! ```text
//! INFO dapvisor::status: starting seq=0
//! INFO dapvisor::status: connecting seq=1 detail="waiting for worker to accept connections" attempt=1
//! INFO dapvisor::status: connected seq=3
//! WARN dapvisor::status: failed seq=9 detail="worker did not accept connections within 60s (60 attempts)"
//! ```

use async_trait::async_trait;

use crate::events::{StatusUpdate, SupervisorState};
use crate::reporters::StatusReporter;

/// Reporter that logs every update.
#[derive(Default)]
pub struct LogReporter;

impl LogReporter {
    /// Construct a new [`LogReporter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatusReporter for LogReporter {
    async fn report(&self, u: &StatusUpdate) {
        let detail = u.detail.as_deref().unwrap_or("");
        match u.state {
            SupervisorState::Failed => {
                tracing::warn!(target: "dapvisor::status", seq = u.seq, detail, attempt = u.attempt, "{}", u.state);
            }
            _ => {
                tracing::info!(target: "dapvisor::status", seq = u.seq, detail, attempt = u.attempt, "{}", u.state);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
