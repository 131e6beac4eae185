//! # Supervisor states and the updates that announce them.
//!
//! Every transition of the connection state machine produces one
//! [`StatusUpdate`]. Refusal reports during `Connecting` reuse the current
//! state with an `attempt` number and a detail string.
//!
//! ## Ordering guarantees
//! Each update carries a globally unique, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use dapvisor::{StatusUpdate, SupervisorState};
//!
//! let up = StatusUpdate::new(SupervisorState::Failed)
//!     .with_detail("worker did not accept connections within 60s")
//!     .with_attempt(60);
//!
//! assert_eq!(up.state, SupervisorState::Failed);
//! assert_eq!(up.attempt, Some(60));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for update ordering.
static STATUS_SEQ: AtomicU64 = AtomicU64::new(0);

/// State of one supervised session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Constructed, nothing launched yet.
    Idle,
    /// Launching (or relaunching) the worker process.
    Starting,
    /// Worker launched; dialing its socket.
    Connecting,
    /// Link established and watched.
    Connected,
    /// Link lost; waiting out the settle delay.
    Reconnecting,
    /// Activation cycle gave up; worker terminated. `activate()` may retry.
    Failed,
    /// Terminal. Everything has been torn down.
    Disposed,
}

impl SupervisorState {
    /// True for states in which `activate()` is a no-op.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SupervisorState::Starting
                | SupervisorState::Connecting
                | SupervisorState::Connected
                | SupervisorState::Reconnecting
        )
    }

    /// Returns a short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Starting => "starting",
            SupervisorState::Connecting => "connecting",
            SupervisorState::Connected => "connected",
            SupervisorState::Reconnecting => "reconnecting",
            SupervisorState::Failed => "failed",
            SupervisorState::Disposed => "disposed",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// One entry of the append-only status channel.
#[derive(Clone, Debug)]
pub struct StatusUpdate {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// State at the time of the update.
    pub state: SupervisorState,
    /// Human-readable detail (failure cause, exit code, refusal progress).
    pub detail: Option<Arc<str>>,
    /// Dial attempt number, for refusal reports and failures.
    pub attempt: Option<u32>,
}

impl StatusUpdate {
    /// Creates an update for `state` with the current timestamp and next sequence number.
    pub fn new(state: SupervisorState) -> Self {
        Self {
            seq: STATUS_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            state,
            detail: None,
            attempt: None,
        }
    }

    /// Attaches a human-readable detail.
    #[inline]
    pub fn with_detail(mut self, detail: impl Into<Arc<str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attaches a dial attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }
}
