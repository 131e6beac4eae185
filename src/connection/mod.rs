//! TCP link to the worker.
//!
//! - [`dialer`]: the socket seam ([`Dialer`]) and its `tokio::net` implementation;
//! - [`attempt`]: [`ConnectionAttempt`], one bounded-retry dial loop;
//! - [`link`]: [`ActiveLink`], an established stream plus its watcher task.

mod attempt;
mod dialer;
mod link;

pub use attempt::{ConnectionAttempt, RefusalHook, RetryBudget};
pub use dialer::{Dialer, LinkIo, LinkStream, TcpDialer};
pub use link::{ActiveLink, LinkLoss, LinkLost};
