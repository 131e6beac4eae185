//! # Status bus.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the actor can publish without
//! ever blocking on a slow consumer.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits.
//! - **Bounded capacity**: one ring buffer shared by every receiver.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: updates sent while nobody listens are lost.

use tokio::sync::broadcast;

use super::status::StatusUpdate;

/// Broadcast channel for [`StatusUpdate`]s. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<StatusUpdate>,
}

impl Bus {
    /// Creates a bus with the given ring capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<StatusUpdate>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an update to every current receiver.
    pub fn publish(&self, update: StatusUpdate) {
        let _ = self.tx.send(update);
    }

    /// Creates a receiver that observes updates sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }
}
