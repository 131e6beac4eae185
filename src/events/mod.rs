//! Status channel: state enum, update payload and broadcast bus.
//!
//! ## Contents
//! - [`SupervisorState`], [`StatusUpdate`] the single source of truth published by the actor
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: the supervisor actor (and the connection attempt it drives,
//!   for periodic refusal reports).
//! - **Consumers**: the reporter listener (fans out to
//!   [`ReporterSet`](crate::ReporterSet)) and any receiver obtained through
//!   [`ConnectionSupervisor::subscribe`](crate::ConnectionSupervisor::subscribe).

mod bus;
mod status;

pub use bus::Bus;
pub use status::{StatusUpdate, SupervisorState};
