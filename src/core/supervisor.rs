//! # ConnectionSupervisor: public handle to one supervised session.
//!
//! The handle is a thin client of the session actor. It owns no session
//! state itself; every request becomes a command in the actor's mailbox, so
//! requests from several tasks are serialized by the actor.
//!
//! ## Architecture
//! ```text
//! ConnectionSupervisor ── Command ──► SessionActor ──► ProcessSupervisor ──► worker
//!        │                               │  ▲
//!        │                               │  └── Signal (exit / attempt result / link loss)
//!        │                               ▼
//!        │                      Bus (StatusUpdate) ──► reporter listener ──► ReporterSet
//!        │                               │
//!        └── subscribe() ◄───────────────┘
//! ```
//!
//! Bytes read from every link go, in order, to the single receiver handed
//! out by [`ConnectionSupervisor::take_data`]; they are buffered until it is
//! taken, and reading pauses while the buffer is full.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use dapvisor::{ConnectionSupervisor, StatusReporter, SupervisorConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reporters: Vec<Arc<dyn StatusReporter>> = Vec::new();
//!     let sup = ConnectionSupervisor::builder(SupervisorConfig::default())
//!         .with_reporters(reporters)
//!         .build();
//!
//!     sup.activate().await?;
//!     sup.send(b"Content-Length: 2\r\n\r\n{}".to_vec()).await?;
//!     sup.dispose().await;
//!     Ok(())
//! }
//! ```

use std::sync::{Mutex, PoisonError};

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::config::SupervisorConfig;
use crate::core::actor::Command;
use crate::core::builder::SupervisorBuilder;
use crate::core::shutdown;
use crate::error::SessionError;
use crate::events::{Bus, StatusUpdate, SupervisorState};

/// Handle to one supervised worker and its link.
///
/// Dropping the handle disposes the session.
pub struct ConnectionSupervisor {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<StatusUpdate>,
    bus: Bus,
    data: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
}

impl ConnectionSupervisor {
    /// Starts building a supervisor for `cfg`.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        commands: mpsc::UnboundedSender<Command>,
        state: watch::Receiver<StatusUpdate>,
        bus: Bus,
        data: mpsc::Receiver<Vec<u8>>,
    ) -> Self {
        Self {
            commands,
            state,
            bus,
            data: Mutex::new(Some(data)),
        }
    }

    /// Launches the worker and waits until the link is established.
    ///
    /// A no-op returning `Ok(())` while a session is already active.
    /// Allowed again after `Failed`.
    ///
    /// # Errors
    /// - [`SessionError::Spawn`] when the worker cannot be launched;
    /// - [`SessionError::Connect`] when the worker never accepted a connection;
    /// - [`SessionError::Disposed`] after [`dispose`](Self::dispose).
    pub async fn activate(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Activate(tx))
            .map_err(|_| SessionError::Disposed)?;
        rx.await.unwrap_or(Err(SessionError::Disposed))
    }

    /// Tears everything down. Idempotent; safe from any state.
    pub async fn dispose(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Dispose(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Queues `bytes` on the active link.
    ///
    /// # Errors
    /// [`SessionError::NotConnected`] without an active link,
    /// [`SessionError::LinkClosed`] if it went away meanwhile.
    pub async fn send(&self, bytes: Vec<u8>) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Writer(tx))
            .map_err(|_| SessionError::Disposed)?;
        let writer = rx
            .await
            .map_err(|_| SessionError::Disposed)?
            .ok_or(SessionError::NotConnected)?;
        writer.send(bytes).await.map_err(|_| SessionError::LinkClosed)
    }

    /// Hands out the receiver of bytes read from the worker; `None` once taken.
    ///
    /// Chunks arrive in order across reconnects, including those read before
    /// the receiver was taken. Dropping the receiver discards further input.
    pub fn take_data(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Receives status updates published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.bus.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        self.state.borrow().state
    }

    /// Most recent update, including its detail.
    pub fn status(&self) -> StatusUpdate {
        self.state.borrow().clone()
    }

    /// Activates, then keeps the session up until an OS termination signal
    /// arrives or the session fails or is disposed elsewhere. Disposes on exit.
    ///
    /// # Errors
    /// Activation errors, or [`SessionError::Failed`] with the published cause
    /// when the session fails later on.
    pub async fn serve(&self) -> Result<(), SessionError> {
        self.activate().await?;

        let mut state = self.state.clone();
        let ended = tokio::select! {
            res = shutdown::wait_for_shutdown_signal() => {
                if let Err(e) = res {
                    tracing::warn!(error = %e, "signal handling unavailable; disposing");
                }
                None
            }
            ended = state.wait_for(|u| matches!(u.state, SupervisorState::Failed | SupervisorState::Disposed)) => {
                ended.ok().map(|u| u.clone())
            }
        };

        self.dispose().await;
        match ended {
            Some(u) if u.state == SupervisorState::Failed => {
                let detail = u.detail.as_deref().unwrap_or("session failed").to_owned();
                tracing::error!(%detail, "debug session failed");
                Err(SessionError::Failed { detail })
            }
            _ => {
                tracing::info!("debug session ended");
                Ok(())
            }
        }
    }
}
