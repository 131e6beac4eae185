//! # dapvisor
//!
//! **dapvisor** keeps a debug adapter worker process alive and maintains a
//! resilient TCP link to it on behalf of an editor or other host.
//!
//! It launches the worker, waits for it to accept connections (a freshly
//! spawned worker needs time before its socket is ready), reconnects when the
//! link drops, restarts the worker when it dies, and tears everything down on
//! request. Every state change is published as a [`StatusUpdate`].
//!
//! ## Architecture
//! ```text
//!  host ──► ConnectionSupervisor ── Command ──► SessionActor (one task)
//!                 │    ▲                          │        │          │
//!                 │    │ state / bytes            ▼        ▼          ▼
//!                 │    │              ProcessSupervisor ConnectionAttempt ActiveLink
//!                 │    │                    │               │            │
//!                 │    │              Launcher/Worker     Dialer      watcher task
//!                 │    │                    └── Signal (exit / refusal / result / loss) ┘
//!                 │    │                                       │
//!                 │    └──────────── Bus (StatusUpdate) ◄──────┘
//!                 │                        │
//!                 │                reporter listener ──► ReporterSet ──► StatusReporter...
//!                 └── subscribe() / take_data()
//! ```
//!
//! ### States
//! ```text
//! Idle ─► Starting ─► Connecting ─► Connected ─► Reconnecting ─► Connecting ...
//!            │            │             │
//!            ▼            ▼             └─ worker exit ─► Starting (restart)
//!          Failed ◄───────┘
//! any ─► Disposed
//! ```
//!
//! ## Features
//! | Area            | Description                                                | Key types / traits                                  |
//! |-----------------|------------------------------------------------------------|-----------------------------------------------------|
//! | **Supervision** | Lifecycle of one worker and its link.                      | [`ConnectionSupervisor`], [`SupervisorBuilder`]     |
//! | **Process**     | Launching, monitoring and terminating the worker.          | [`ProcessSupervisor`], [`Launcher`], [`Worker`]     |
//! | **Connection**  | Bounded-retry dialing and the established link.            | [`ConnectionAttempt`], [`Dialer`], [`ActiveLink`]   |
//! | **Status**      | State enum, update payload and reporters.                  | [`StatusUpdate`], [`StatusReporter`], [`ReporterSet`] |
//! | **Policies**    | Crash-loop restart delays.                                 | [`BackoffPolicy`], [`JitterPolicy`]                 |
//! | **Errors**      | Typed errors for spawn, dial, connect and session failures.| [`SessionError`], [`ConnectError`], [`SpawnError`]  |
//! | **Configuration** | Endpoint, command and timing knobs.                      | [`SupervisorConfig`]                                |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogReporter`] that renders updates through `tracing`.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dapvisor::{ConnectionSupervisor, Endpoint, StatusReporter, SupervisorConfig, WorkerCommand};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         endpoint: Endpoint::new("localhost", 4142),
//!         command: WorkerCommand::new("racket", ["-l", "dap-debugger"]),
//!         connect_timeout: Duration::from_secs(30),
//!         ..SupervisorConfig::default()
//!     };
//!
//!     #[cfg(feature = "logging")]
//!     let reporters: Vec<Arc<dyn StatusReporter>> = vec![Arc::new(dapvisor::LogReporter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let reporters: Vec<Arc<dyn StatusReporter>> = Vec::new();
//!
//!     let sup = ConnectionSupervisor::builder(cfg).with_reporters(reporters).build();
//!     let mut status = sup.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(update) = status.recv().await {
//!             println!("{}", update.state);
//!         }
//!     });
//!
//!     // Runs until SIGINT/SIGTERM, a terminal failure, or dispose().
//!     sup.serve().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod connection;
mod core;
mod error;
mod events;
mod policies;
mod process;
mod reporters;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use config::{Endpoint, SupervisorConfig, WorkerCommand};
pub use connection::{
    ActiveLink, ConnectionAttempt, Dialer, LinkIo, LinkLoss, LinkLost, LinkStream, RefusalHook, RetryBudget, TcpDialer,
};
pub use core::{ConnectionSupervisor, SupervisorBuilder};
pub use error::{ConnectError, DialError, SessionError, SpawnError};
pub use events::{Bus, StatusUpdate, SupervisorState};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use process::{ExitHandler, Launcher, ProcessExit, ProcessState, ProcessSupervisor, TokioLauncher, Worker, WorkerExit};
pub use reporters::{ReporterSet, StatusReporter};

// Optional: expose a simple built-in logging reporter.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use reporters::LogReporter;
