//! Runtime core: the session actor and its public handle.
//!
//! The only public API from this module is [`ConnectionSupervisor`] (built
//! through [`SupervisorBuilder`]), which drives one worker and its link.
//!
//! Internal modules:
//! - [`actor`]: the single task that owns all session state and runs the state machine;
//! - [`builder`]: wires bus, reporters, launcher and dialer, then spawns the actor;
//! - [`supervisor`]: the handle; turns requests into actor commands;
//! - [`shutdown`]: cross-platform termination signal handling for [`ConnectionSupervisor::serve`].

mod actor;
mod builder;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use supervisor::ConnectionSupervisor;
