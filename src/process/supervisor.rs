//! # ProcessSupervisor: one worker slot.
//!
//! Owns spawning, monitoring and terminating the worker process. Each
//! launched instance gets a numeric id and a waiter task; the waiter invokes
//! the registered [`ExitHandler`] exactly once for that instance, whether the
//! process exited on its own or was killed.
//!
//! ## Rules
//! - At most one instance occupies the slot. It is `Running` until its
//!   waiter records the exit, then `Exited` until the owner acknowledges the
//!   exit through `clear_exited` (or replaces the instance).
//! - `start()` terminates a running instance before launching a new one.
//! - `stop()` is idempotent. The exit it causes is still reported to the
//!   handler, but [`ProcessSupervisor::clear_exited`] returns `false` for it,
//!   so restart policy (owned by the caller) never sees it as unexpected.
//! - Spawn failures are returned to the caller and never retried here.
//!
//! ## Flow
//! ```text
//! start() ──► stop() previous ──► launcher.launch() ──► waiter task
//!                                                          │
//!                       ┌──────────────────────────────────┤
//!                       ▼                                  ▼
//!                 worker.wait()                      kill.cancelled()
//!                       │                                  │
//!                       │                            worker.kill()
//!                       └──────────► on_exit(ProcessExit{instance, exit})
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerCommand;
use crate::error::SpawnError;
use crate::process::launcher::{Launcher, Worker, WorkerExit};

/// Exit notification for one worker instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessExit {
    /// Instance id returned by [`ProcessSupervisor::start`].
    pub instance: u64,
    /// How it ended.
    pub exit: WorkerExit,
}

/// Callback invoked once per instance when it exits.
pub type ExitHandler = Arc<dyn Fn(ProcessExit) + Send + Sync + 'static>;

/// Lifecycle of the worker slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// No worker, or its exit has been handled.
    NotStarted,
    /// A worker instance is running.
    Running {
        /// Instance id.
        instance: u64,
        /// OS process id, if known.
        pid: Option<u32>,
    },
    /// The instance ended and its exit has not been acknowledged yet.
    Exited {
        /// Instance id.
        instance: u64,
        /// How it ended.
        exit: WorkerExit,
    },
}

struct WorkerProcess {
    instance: u64,
    pid: Option<u32>,
    exited: watch::Receiver<Option<WorkerExit>>,
    kill: CancellationToken,
    waiter: JoinHandle<()>,
}

/// Owns at most one running worker.
pub struct ProcessSupervisor {
    launcher: Arc<dyn Launcher>,
    command: WorkerCommand,
    grace: Duration,
    on_exit: Option<ExitHandler>,
    current: Option<WorkerProcess>,
    next_instance: u64,
}

impl ProcessSupervisor {
    /// Creates an empty slot. `grace` bounds how long `stop()` waits for a
    /// killed worker to be reaped.
    pub fn new(launcher: Arc<dyn Launcher>, command: WorkerCommand, grace: Duration) -> Self {
        Self {
            launcher,
            command,
            grace,
            on_exit: None,
            current: None,
            next_instance: 0,
        }
    }

    /// Registers the exit callback used for instances launched from now on.
    pub fn on_exit(&mut self, handler: impl Fn(ProcessExit) + Send + Sync + 'static) {
        self.on_exit = Some(Arc::new(handler));
    }

    /// Current slot state.
    pub fn state(&self) -> ProcessState {
        let Some(p) = &self.current else {
            return ProcessState::NotStarted;
        };
        match *p.exited.borrow() {
            Some(exit) => ProcessState::Exited {
                instance: p.instance,
                exit,
            },
            None => ProcessState::Running {
                instance: p.instance,
                pid: p.pid,
            },
        }
    }

    /// True while the current instance has not exited.
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self.state(), ProcessState::Running { .. })
    }

    /// Launches a fresh worker, terminating the running one first.
    ///
    /// Returns the new instance id.
    pub async fn start(&mut self) -> Result<u64, SpawnError> {
        if self.current.is_some() {
            tracing::info!("cleaning up previous worker");
            self.stop().await;
        }

        let worker = self.launcher.launch(&self.command).map_err(|e| {
            tracing::error!(command = %self.command, error = %e, "failed to launch worker");
            e
        })?;

        self.next_instance += 1;
        let instance = self.next_instance;
        let pid = worker.id();
        let kill = CancellationToken::new();
        let (exit_tx, exited) = watch::channel(None);
        let waiter = tokio::spawn(monitor(worker, instance, kill.clone(), exit_tx, self.on_exit.clone()));

        tracing::info!(command = %self.command, instance, pid, "worker started");
        self.current = Some(WorkerProcess {
            instance,
            pid,
            exited,
            kill,
            waiter,
        });
        Ok(instance)
    }

    /// Terminates the running worker, if any, and clears the slot.
    ///
    /// Waits at most `grace` for the process to be reaped; a worker that
    /// outlives it is logged and left to its waiter task.
    pub async fn stop(&mut self) {
        let Some(p) = self.current.take() else {
            return;
        };
        p.kill.cancel();
        match time::timeout(self.grace, p.waiter).await {
            Ok(Ok(())) => tracing::debug!(instance = p.instance, "worker stopped"),
            Ok(Err(e)) => tracing::warn!(instance = p.instance, error = %e, "worker waiter failed"),
            Err(_) => tracing::warn!(
                instance = p.instance,
                grace = ?self.grace,
                "worker not reaped within grace period"
            ),
        }
    }

    /// Clears the slot after `instance` exited.
    ///
    /// Returns `true` only when `instance` is the one currently running,
    /// i.e. the exit was not requested through `stop()`/`start()`.
    pub fn clear_exited(&mut self, instance: u64) -> bool {
        match &self.current {
            Some(p) if p.instance == instance => {
                self.current = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Some(p) = &self.current {
            p.kill.cancel();
        }
    }
}

async fn monitor(
    mut worker: Box<dyn Worker>,
    instance: u64,
    kill: CancellationToken,
    exited: watch::Sender<Option<WorkerExit>>,
    on_exit: Option<ExitHandler>,
) {
    let (exit, requested) = tokio::select! {
        exit = worker.wait() => (exit, false),
        _ = kill.cancelled() => {
            worker.kill().await;
            (WorkerExit::Killed, true)
        }
    };

    match exit {
        _ if requested => tracing::info!(instance, "worker terminated"),
        ok if ok.is_success() => tracing::info!(instance, "worker exited"),
        other => tracing::error!(instance, %other, "worker ended unexpectedly"),
    }
    exited.send_replace(Some(exit));

    if let Some(handler) = on_exit {
        handler(ProcessExit { instance, exit });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLauncher;
    use std::sync::Mutex;

    fn slot(launcher: &FakeLauncher) -> ProcessSupervisor {
        ProcessSupervisor::new(
            Arc::new(launcher.clone()),
            WorkerCommand::default(),
            Duration::from_secs(1),
        )
    }

    fn recorded(sup: &mut ProcessSupervisor) -> Arc<Mutex<Vec<ProcessExit>>> {
        let exits = Arc::new(Mutex::new(Vec::new()));
        let sink = exits.clone();
        sup.on_exit(move |e| sink.lock().unwrap().push(e));
        exits
    }

    #[tokio::test]
    async fn start_replaces_running_worker() {
        let launcher = FakeLauncher::default();
        let mut sup = slot(&launcher);
        let exits = recorded(&mut sup);

        let first = sup.start().await.unwrap();
        let second = sup.start().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(launcher.spawns(), 2);
        assert_eq!(launcher.kills(), 1);
        assert!(matches!(sup.state(), ProcessState::Running { instance, .. } if instance == second));

        // the replaced instance reports its exit, but it is not the current one
        let exit = exits.lock().unwrap()[0];
        assert_eq!(exit, ProcessExit { instance: first, exit: WorkerExit::Killed });
        assert!(!sup.clear_exited(first));
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_not_unexpected() {
        let launcher = FakeLauncher::default();
        let mut sup = slot(&launcher);
        let exits = recorded(&mut sup);

        let instance = sup.start().await.unwrap();
        sup.stop().await;
        sup.stop().await;

        assert_eq!(sup.state(), ProcessState::NotStarted);
        assert_eq!(launcher.kills(), 1);
        assert_eq!(exits.lock().unwrap().len(), 1);
        assert!(!sup.clear_exited(instance));
    }

    #[tokio::test]
    async fn crash_is_reported_once_and_clears_slot() {
        let launcher = FakeLauncher::default();
        let mut sup = slot(&launcher);
        let exits = recorded(&mut sup);

        let instance = sup.start().await.unwrap();
        launcher.crash_latest(1);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            exits.lock().unwrap().as_slice(),
            &[ProcessExit { instance, exit: WorkerExit::Code(1) }]
        );
        assert_eq!(sup.state(), ProcessState::Exited { instance, exit: WorkerExit::Code(1) });
        assert!(!sup.is_running());
        assert!(sup.clear_exited(instance));
        assert_eq!(sup.state(), ProcessState::NotStarted);
        assert!(!sup.clear_exited(instance));
        assert_eq!(launcher.kills(), 0);
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_and_leaves_slot_empty() {
        let launcher = FakeLauncher::failing(std::io::ErrorKind::NotFound);
        let mut sup = slot(&launcher);

        let err = sup.start().await.unwrap_err();
        assert!(matches!(err, SpawnError::NotFound { .. }));
        assert!(!sup.is_running());
        assert_eq!(launcher.spawns(), 0);
    }
}
