//! # SessionActor: the connection state machine.
//!
//! One actor task owns every mutable piece of a supervised session: the
//! [`ProcessSupervisor`], the in-flight [`ConnectionAttempt`], the
//! [`ActiveLink`] and the single pending timer. Public requests arrive as
//! [`Command`]s; helpers report back as [`Signal`]s. Both are handled on the
//! actor task, one at a time.
//!
//! ## Transitions
//! ```text
//! Idle/Failed ──activate──► Starting ──spawn ok──► Connecting ──link──► Connected
//!                              │                      │  │                 │
//!                         spawn error          timeout / unreachable   end / error
//!                              ▼                      ▼                    ▼
//!                            Failed ◄── stop worker ──┘              Reconnecting
//!                                                                          │
//!                                              settle delay ──► Connecting ┘
//!
//! worker exit while Connecting/Connected/Reconnecting ──► Starting (restart, maybe delayed)
//! any ──dispose──► Disposed
//! ```
//!
//! ## Rules
//! - At most one pending timer; scheduling while one is pending is a no-op.
//!   A worker exit replaces a pending reconnect, since the reconnect would dial
//!   a dead process.
//! - Attempt results, refusal reports and link losses carry ids; stale ones
//!   are ignored.
//! - After disposal starts no link is accepted and nothing but `Disposed` is
//!   published: late attempt results are closed on arrival.
//! - Only the actor publishes status updates.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Sleep};
use tokio_util::sync::CancellationToken;

use crate::config::SupervisorConfig;
use crate::connection::{ActiveLink, ConnectionAttempt, Dialer, LinkLost, LinkStream};
use crate::error::{ConnectError, SessionError};
use crate::events::{Bus, StatusUpdate, SupervisorState};
use crate::process::{ProcessExit, ProcessSupervisor};

/// Requests from [`ConnectionSupervisor`](crate::ConnectionSupervisor) handles.
pub(crate) enum Command {
    Activate(oneshot::Sender<Result<(), SessionError>>),
    Writer(oneshot::Sender<Option<mpsc::Sender<Vec<u8>>>>),
    Dispose(oneshot::Sender<()>),
}

/// Reports from helper tasks owned by the actor.
pub(crate) enum Signal {
    ProcessExited(ProcessExit),
    Refused {
        cycle: u64,
        attempt: u32,
    },
    AttemptFinished {
        cycle: u64,
        result: Result<LinkStream, ConnectError>,
    },
    LinkLost(LinkLost),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerKind {
    Reconnect,
    Restart,
}

struct Timer {
    kind: TimerKind,
    sleep: Pin<Box<Sleep>>,
}

struct InFlight {
    cycle: u64,
    cancel: CancellationToken,
}

/// Owns one supervised session.
pub(crate) struct SessionActor {
    cfg: SupervisorConfig,
    dialer: Arc<dyn Dialer>,
    bus: Bus,
    state_tx: watch::Sender<StatusUpdate>,
    inbound: mpsc::Sender<Vec<u8>>,
    token: CancellationToken,

    commands: mpsc::UnboundedReceiver<Command>,
    signals: mpsc::UnboundedReceiver<Signal>,
    signal_tx: mpsc::UnboundedSender<Signal>,

    state: SupervisorState,
    disposed: bool,
    process: ProcessSupervisor,
    attempt: Option<InFlight>,
    link: Option<ActiveLink>,
    timer: Option<Timer>,
    pending_activation: Option<oneshot::Sender<Result<(), SessionError>>>,
    cycle: u64,
    link_seq: u64,
    crash_streak: u32,
}

impl SessionActor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cfg: SupervisorConfig,
        mut process: ProcessSupervisor,
        dialer: Arc<dyn Dialer>,
        bus: Bus,
        state_tx: watch::Sender<StatusUpdate>,
        inbound: mpsc::Sender<Vec<u8>>,
        token: CancellationToken,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let exits = signal_tx.clone();
        process.on_exit(move |exit| {
            let _ = exits.send(Signal::ProcessExited(exit));
        });

        Self {
            cfg,
            dialer,
            bus,
            state_tx,
            inbound,
            token,
            commands,
            signals,
            signal_tx,
            state: SupervisorState::Idle,
            disposed: false,
            process,
            attempt: None,
            link: None,
            timer: None,
            pending_activation: None,
            cycle: 0,
            link_seq: 0,
            crash_streak: 0,
        }
    }

    /// Runs until disposed, or until every handle is gone.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    None => self.dispose().await,
                },
                Some(sig) = self.signals.recv() => self.on_signal(sig).await,
                kind = expired(&mut self.timer) => {
                    self.timer = None;
                    self.on_timer(kind).await;
                }
            }

            if self.disposed {
                break;
            }
        }

        // late results are checked against the disposed flag and closed
        while let Ok(sig) = self.signals.try_recv() {
            self.on_signal(sig).await;
        }
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Activate(reply) => self.activate(reply).await,
            Command::Writer(reply) => {
                let _ = reply.send(self.link.as_ref().map(ActiveLink::writer));
            }
            Command::Dispose(reply) => {
                self.dispose().await;
                let _ = reply.send(());
            }
        }
    }

    async fn on_signal(&mut self, sig: Signal) {
        match sig {
            Signal::ProcessExited(exit) => self.on_process_exit(exit).await,
            Signal::Refused { cycle, attempt } => self.on_refused(cycle, attempt),
            Signal::AttemptFinished { cycle, result } => self.on_attempt_finished(cycle, result).await,
            Signal::LinkLost(lost) => self.on_link_lost(lost).await,
        }
    }

    async fn activate(&mut self, reply: oneshot::Sender<Result<(), SessionError>>) {
        match self.state {
            SupervisorState::Disposed => {
                let _ = reply.send(Err(SessionError::Disposed));
            }
            s if s.is_active() => {
                tracing::debug!(state = %s, "activate ignored: session already active");
                let _ = reply.send(Ok(()));
            }
            _ => {
                tracing::info!(endpoint = %self.cfg.endpoint, "activating session");
                self.pending_activation = Some(reply);
                self.crash_streak = 0;
                self.transition(StatusUpdate::new(SupervisorState::Starting));
                self.launch().await;
            }
        }
    }

    /// Starting → Connecting (or Failed on spawn error).
    async fn launch(&mut self) {
        match self.process.start().await {
            Ok(_) => self.connect(),
            Err(e) => self.fail(e.into()),
        }
    }

    /// Enters Connecting and starts a fresh attempt cycle.
    fn connect(&mut self) {
        self.abandon_attempt();
        self.transition(StatusUpdate::new(SupervisorState::Connecting));

        self.cycle += 1;
        let cycle = self.cycle;
        let cancel = self.token.child_token();
        let reports = self.signal_tx.clone();
        let mut attempt = ConnectionAttempt::new(self.dialer.clone(), self.cfg.retry_delay).with_reports(
            self.cfg.report_every_clamped(),
            move |attempt| {
                let _ = reports.send(Signal::Refused { cycle, attempt });
            },
        );
        let endpoint = self.cfg.endpoint.clone();
        let budget = self.cfg.connect_timeout;
        let signals = self.signal_tx.clone();
        let token = cancel.clone();

        tokio::spawn(async move {
            let result = attempt.attempt(&endpoint, budget, &token).await;
            // a closed mailbox drops (and closes) any late stream
            let _ = signals.send(Signal::AttemptFinished { cycle, result });
        });
        self.attempt = Some(InFlight { cycle, cancel });
    }

    /// Publishes a refusal report of the current cycle.
    fn on_refused(&mut self, cycle: u64, attempt: u32) {
        let current = self.attempt.as_ref().is_some_and(|a| a.cycle == cycle);
        if self.disposed || !current || self.state != SupervisorState::Connecting {
            return;
        }
        self.publish(
            StatusUpdate::new(SupervisorState::Connecting)
                .with_detail("waiting for worker to accept connections")
                .with_attempt(attempt),
        );
    }

    async fn on_attempt_finished(&mut self, cycle: u64, result: Result<LinkStream, ConnectError>) {
        let current = self.attempt.as_ref().is_some_and(|a| a.cycle == cycle);
        if self.disposed || !current {
            if result.is_ok() {
                tracing::debug!(cycle, "discarding link from abandoned attempt");
            }
            return;
        }
        self.attempt = None;

        match result {
            Ok(stream) => {
                self.link_seq += 1;
                let signals = self.signal_tx.clone();
                let link = ActiveLink::attach(
                    self.link_seq,
                    stream,
                    self.inbound.clone(),
                    self.token.child_token(),
                    move |lost| {
                        let _ = signals.send(Signal::LinkLost(lost));
                    },
                );
                self.link = Some(link);
                self.crash_streak = 0;
                self.transition(StatusUpdate::new(SupervisorState::Connected));
                if let Some(reply) = self.pending_activation.take() {
                    let _ = reply.send(Ok(()));
                }
            }
            Err(ConnectError::Cancelled) => {}
            Err(e) => {
                tracing::error!(error = %e, "giving up on worker");
                self.process.stop().await;
                self.fail(e.into());
            }
        }
    }

    async fn on_link_lost(&mut self, lost: LinkLost) {
        if self.link.as_ref().map(ActiveLink::id) != Some(lost.link) {
            return;
        }
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        self.transition(StatusUpdate::new(SupervisorState::Reconnecting).with_detail(lost.loss.to_string()));
        self.schedule(TimerKind::Reconnect, self.cfg.settle_delay);
    }

    async fn on_process_exit(&mut self, exit: ProcessExit) {
        if !self.process.clear_exited(exit.instance) {
            return;
        }
        if !matches!(
            self.state,
            SupervisorState::Connecting | SupervisorState::Connected | SupervisorState::Reconnecting
        ) {
            return;
        }

        self.abandon_attempt();
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        if self.timer.as_ref().is_some_and(|t| t.kind == TimerKind::Reconnect) {
            self.timer = None;
        }

        self.crash_streak += 1;
        let delay = self.restart_delay();
        let detail = if delay.is_zero() {
            format!("worker exited unexpectedly ({})", exit.exit)
        } else {
            format!("worker exited unexpectedly ({}); restarting in {delay:?}", exit.exit)
        };
        tracing::warn!(exit = %exit.exit, streak = self.crash_streak, ?delay, "restarting worker");
        self.transition(StatusUpdate::new(SupervisorState::Starting).with_detail(detail));

        if delay.is_zero() {
            self.launch().await;
        } else {
            self.schedule(TimerKind::Restart, delay);
        }
    }

    async fn on_timer(&mut self, kind: TimerKind) {
        match (kind, self.state) {
            (TimerKind::Reconnect, SupervisorState::Reconnecting) => {
                if self.process.is_running() {
                    self.connect();
                } else {
                    self.transition(StatusUpdate::new(SupervisorState::Starting));
                    self.launch().await;
                }
            }
            (TimerKind::Restart, SupervisorState::Starting) => self.launch().await,
            (kind, state) => tracing::debug!(?kind, %state, "stale timer ignored"),
        }
    }

    async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        tracing::info!(state = %self.state, "disposing session");

        self.timer = None;
        self.token.cancel();
        self.attempt = None;
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        self.process.stop().await;
        if let Some(reply) = self.pending_activation.take() {
            let _ = reply.send(Err(SessionError::Disposed));
        }
        self.transition(StatusUpdate::new(SupervisorState::Disposed));
    }

    fn fail(&mut self, err: SessionError) {
        self.transition(StatusUpdate::new(SupervisorState::Failed).with_detail(err.to_string()));
        match self.pending_activation.take() {
            Some(reply) => {
                let _ = reply.send(Err(err));
            }
            None => tracing::error!(error = %err, "session failed"),
        }
    }

    fn abandon_attempt(&mut self) {
        if let Some(a) = self.attempt.take() {
            a.cancel.cancel();
        }
    }

    fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        if let Some(t) = &self.timer {
            tracing::debug!(pending = ?t.kind, requested = ?kind, "timer already pending");
            return;
        }
        self.timer = Some(Timer {
            kind,
            sleep: Box::pin(time::sleep(delay)),
        });
    }

    /// First restart is immediate, later ones follow the backoff policy.
    fn restart_delay(&self) -> Duration {
        match self.crash_streak {
            0 | 1 => Duration::ZERO,
            n => self.cfg.restart_backoff.next(n - 2),
        }
    }

    fn transition(&mut self, update: StatusUpdate) {
        if self.state != update.state {
            tracing::info!(from = %self.state, to = %update.state, "session state changed");
        }
        self.state = update.state;
        self.publish(update);
    }

    fn publish(&self, update: StatusUpdate) {
        self.state_tx.send_replace(update.clone());
        self.bus.publish(update);
    }
}

async fn expired(timer: &mut Option<Timer>) -> TimerKind {
    match timer {
        Some(t) => {
            t.sleep.as_mut().await;
            t.kind
        }
        None => pending().await,
    }
}
