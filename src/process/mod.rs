//! Worker process lifecycle.
//!
//! - [`launcher`]: the spawn seam ([`Launcher`], [`Worker`]) and its
//!   `tokio::process` implementation with output forwarding;
//! - [`supervisor`]: [`ProcessSupervisor`], which owns at most one running
//!   worker and reports each instance's exit exactly once.

mod launcher;
mod supervisor;

pub use launcher::{Launcher, TokioLauncher, Worker, WorkerExit};
pub use supervisor::{ExitHandler, ProcessExit, ProcessState, ProcessSupervisor};
