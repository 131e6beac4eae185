//! # Spawning workers.
//!
//! [`Launcher`] turns a [`WorkerCommand`] into a running [`Worker`]. The
//! default [`TokioLauncher`] uses `tokio::process` with piped output: every
//! non-empty stdout line is logged at `info`, every stderr line at `warn`,
//! both under the `dapvisor::worker` target. Output is drained by detached
//! tasks, so a chatty worker never blocks on a full pipe.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::config::WorkerCommand;
use crate::error::SpawnError;

/// How a worker instance ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// Exited on its own with this code.
    Code(i32),
    /// Terminated by a signal, either ours or external.
    Killed,
}

impl WorkerExit {
    /// True for a clean `exit(0)`.
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, WorkerExit::Code(0))
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Code(code) => write!(f, "exit code: {code}"),
            WorkerExit::Killed => f.write_str("killed"),
        }
    }
}

/// A launched worker process.
#[async_trait]
pub trait Worker: Send + 'static {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Waits for the process to exit.
    ///
    /// Must be cancel-safe: dropping the future and calling again is allowed.
    async fn wait(&mut self) -> WorkerExit;

    /// Terminates the process and reaps it.
    ///
    /// No-op on an already-exited process; failures are logged, not returned.
    async fn kill(&mut self);
}

/// Spawns workers.
pub trait Launcher: Send + Sync + 'static {
    /// Launches `command`. Launch failures are reported synchronously.
    fn launch(&self, command: &WorkerCommand) -> Result<Box<dyn Worker>, SpawnError>;
}

/// [`Launcher`] backed by `tokio::process`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioLauncher;

impl Launcher for TokioLauncher {
    fn launch(&self, command: &WorkerCommand) -> Result<Box<dyn Worker>, SpawnError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpawnError::from_io(command.program.clone(), e))?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, OutputStream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, OutputStream::Stderr));
        }

        Ok(Box::new(TokioWorker { child }))
    }
}

struct TokioWorker {
    child: Child,
}

#[async_trait]
impl Worker for TokioWorker {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> WorkerExit {
        match self.child.wait().await {
            Ok(status) => status.code().map_or(WorkerExit::Killed, WorkerExit::Code),
            Err(e) => {
                tracing::warn!(error = %e, "lost track of worker process");
                WorkerExit::Killed
            }
        }
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            // already reaped
            tracing::debug!(error = %e, "worker kill ignored");
        }
    }
}

#[derive(Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

async fn forward_lines<R>(pipe: R, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match stream {
                    OutputStream::Stdout => tracing::info!(target: "dapvisor::worker", "{line}"),
                    OutputStream::Stderr => tracing::warn!(target: "dapvisor::worker", "{line}"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(target: "dapvisor::worker", error = %e, "output pipe closed");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let cmd = WorkerCommand::new("dapvisor-definitely-missing-binary", ["--x"]);
        let err = TokioLauncher.launch(&cmd).err().expect("launch must fail");
        assert!(matches!(err, SpawnError::NotFound { .. }));
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let cmd = WorkerCommand::new("sh", ["-c", "echo ready; exit 3"]);
        let mut worker = TokioLauncher.launch(&cmd).expect("sh is available");
        assert_eq!(worker.wait().await, WorkerExit::Code(3));
        // killing an exited worker is a no-op
        worker.kill().await;
    }

    #[tokio::test]
    async fn kill_terminates_a_running_worker() {
        let cmd = WorkerCommand::new("sleep", ["30"]);
        let mut worker = TokioLauncher.launch(&cmd).expect("sleep is available");
        assert!(worker.id().is_some());
        worker.kill().await;
        assert_eq!(worker.wait().await, WorkerExit::Killed);
    }
}
