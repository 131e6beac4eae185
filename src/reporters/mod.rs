//! # Status reporters.
//!
//! A [`StatusReporter`] is a pure sink for [`StatusUpdate`](crate::StatusUpdate)s.
//! Reporters never call back into the supervisor; they only present state
//! (status bar, log, metrics, test recorder, ...).
//!
//! ## Architecture
//! ```text
//! actor ── publish(StatusUpdate) ──► Bus ──► reporter listener ──► ReporterSet::emit
//!                                                                 ┌──────┴──────┐
//!                                                                 ▼             ▼
//!                                                            [queue R1]    [queue RN]
//!                                                                 ▼             ▼
//!                                                          R1.report()    RN.report()
//! ```

mod reporter;
mod set;

#[cfg(feature = "logging")]
mod log;

pub use reporter::StatusReporter;
pub use set::ReporterSet;

#[cfg(feature = "logging")]
pub use log::LogReporter;
