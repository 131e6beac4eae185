use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{actor::SessionActor, supervisor::ConnectionSupervisor};
use crate::{
    config::SupervisorConfig,
    connection::{Dialer, TcpDialer},
    events::{Bus, StatusUpdate, SupervisorState},
    process::{Launcher, ProcessSupervisor, TokioLauncher},
    reporters::{ReporterSet, StatusReporter},
};

/// Inbound chunks buffered for the data consumer before the link stops reading.
const INBOUND_CAPACITY: usize = 256;

/// Builder for a [`ConnectionSupervisor`] with optional collaborators.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    reporters: Vec<Arc<dyn StatusReporter>>,
    launcher: Option<Arc<dyn Launcher>>,
    dialer: Option<Arc<dyn Dialer>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            reporters: Vec::new(),
            launcher: None,
            dialer: None,
        }
    }

    /// Sets status reporters.
    ///
    /// Reporters receive every [`StatusUpdate`](crate::StatusUpdate) through
    /// dedicated workers with bounded queues.
    pub fn with_reporters(mut self, reporters: Vec<Arc<dyn StatusReporter>>) -> Self {
        self.reporters = reporters;
        self
    }

    /// Replaces the process launcher (default: [`TokioLauncher`]).
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Replaces the dialer (default: [`TcpDialer`]).
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Builds the supervisor and spawns its actor.
    ///
    /// Must be called from within a tokio runtime. The session starts `Idle`;
    /// nothing is launched before [`ConnectionSupervisor::activate`].
    pub fn build(self) -> ConnectionSupervisor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        reporter_listener(&bus, ReporterSet::new(self.reporters));

        let launcher = self.launcher.unwrap_or_else(|| Arc::new(TokioLauncher));
        let dialer = self.dialer.unwrap_or_else(|| Arc::new(TcpDialer));
        let process = ProcessSupervisor::new(launcher, self.cfg.command.clone(), self.cfg.stop_grace);

        let (commands, mailbox) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(StatusUpdate::new(SupervisorState::Idle));
        let (inbound, data) = mpsc::channel(INBOUND_CAPACITY);

        let actor = SessionActor::new(
            self.cfg,
            process,
            dialer,
            bus.clone(),
            state_tx,
            inbound,
            CancellationToken::new(),
            mailbox,
        );
        tokio::spawn(actor.run());

        ConnectionSupervisor::new_internal(commands, state_rx, bus, data)
    }
}

/// Forwards bus updates to the reporter set until the bus closes (fire-and-forget).
fn reporter_listener(bus: &Bus, set: ReporterSet) {
    if set.is_empty() {
        return;
    }
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(update) => set.emit(&update),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "reporter listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    });
}
