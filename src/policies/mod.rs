//! Delay policies.
//!
//! The supervisor only needs one tunable policy: how long to wait before
//! relaunching a worker that keeps crashing. Fixed delays (dial retry,
//! reconnect settle) are plain `Duration`s on
//! [`SupervisorConfig`](crate::SupervisorConfig).
//!
//! ## Contents
//! - [`BackoffPolicy`] how restart delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization applied on top of the computed delay
//!
//! ## Wiring
//! ```text
//! SupervisorConfig { restart_backoff: BackoffPolicy }
//!      └─► core::actor uses restart_backoff.next(streak - 2) for the
//!          second and later exits before a link was established
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
