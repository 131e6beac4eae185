//! # Reporter trait.
//!
//! Each reporter gets a dedicated worker task and a bounded queue inside
//! [`ReporterSet`](crate::ReporterSet):
//! - a slow reporter only affects its own queue;
//! - overflow drops the update for that reporter only;
//! - panics are caught and logged, the worker keeps running.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use dapvisor::{StatusReporter, StatusUpdate, SupervisorState};
//!
//! struct StatusBar;
//!
//! #[async_trait]
//! impl StatusReporter for StatusBar {
//!     async fn report(&self, update: &StatusUpdate) {
//!         if update.state == SupervisorState::Failed {
//!             // show update.detail to the user
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "status-bar" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::StatusUpdate;

/// Sink for supervisor state transitions.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Never call back into the supervisor.
#[async_trait]
pub trait StatusReporter: Send + Sync + 'static {
    /// Presents a single update. Updates arrive in FIFO order per reporter.
    async fn report(&self, update: &StatusUpdate);

    /// Name used in logs about this reporter.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1). Default: 256.
    fn queue_capacity(&self) -> usize {
        256
    }
}
