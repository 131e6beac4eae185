//! Error types used by the dapvisor runtime.
//!
//! The taxonomy follows the lifecycle of one supervised session:
//!
//! - [`SpawnError`]: the worker process could not be launched.
//! - [`DialError`]: a single TCP dial failed (refusal class or not).
//! - [`ConnectError`]: a whole connection attempt cycle gave up.
//! - [`SessionError`]: what crosses the public boundary of
//!   [`ConnectionSupervisor`](crate::ConnectionSupervisor).
//!
//! Every enum provides `as_label()` for logs. Transient failures (refusals,
//! dropped links, unexpected worker exits) never surface here: they are
//! absorbed by the supervisor and only show up on the status channel.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// # Worker launch failures.
///
/// Fatal to the current activation cycle and never retried: a misconfigured
/// launch command will not fix itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The worker executable could not be found.
    #[error("worker executable not found: {program}")]
    NotFound {
        /// Program that was looked up.
        program: String,
    },

    /// The worker executable exists but may not be executed.
    #[error("permission denied launching {program}")]
    PermissionDenied {
        /// Program that was rejected.
        program: String,
    },

    /// Any other OS-level launch failure (pipes, resource limits, ...).
    #[error("failed to launch {program}: {source}")]
    Io {
        /// Program being launched.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl SpawnError {
    /// Classifies an I/O error returned by the OS while launching `program`.
    pub fn from_io(program: impl Into<String>, source: io::Error) -> Self {
        let program = program.into();
        match source.kind() {
            io::ErrorKind::NotFound => SpawnError::NotFound { program },
            io::ErrorKind::PermissionDenied => SpawnError::PermissionDenied { program },
            _ => SpawnError::Io { program, source },
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::NotFound { .. } => "spawn_not_found",
            SpawnError::PermissionDenied { .. } => "spawn_permission_denied",
            SpawnError::Io { .. } => "spawn_io",
        }
    }
}

/// # A single failed dial.
///
/// Wraps the I/O error of one connect call. [`DialError::is_refusal`] separates
/// the startup race (nobody listening yet) from configuration problems.
#[derive(Error, Debug)]
#[error("dial {target} failed: {source}")]
pub struct DialError {
    /// `host:port` that was dialed.
    pub target: String,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

impl DialError {
    /// Creates a dial error for `target`.
    pub fn new(target: impl Into<String>, source: io::Error) -> Self {
        Self {
            target: target.into(),
            source,
        }
    }

    /// Shorthand for a refused dial, used by fakes and tests.
    pub fn refused(target: impl Into<String>) -> Self {
        Self::new(target, io::Error::from(io::ErrorKind::ConnectionRefused))
    }

    /// True when the remote end is simply not accepting connections yet.
    ///
    /// Resets and aborts on loopback are treated the same way: they show up
    /// while a listener is being set up and go away on their own.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self.source.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
        )
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        if self.is_refusal() {
            "dial_refused"
        } else {
            "dial_failed"
        }
    }
}

/// # Outcome of a failed connection attempt cycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The time budget ran out while the worker kept refusing.
    #[error("worker did not accept connections within {after:?} ({attempts} attempts)")]
    Timeout {
        /// Configured attempt budget.
        after: Duration,
        /// Number of dials made.
        attempts: u32,
    },

    /// A non-retryable dial failure (name resolution, permissions, ...).
    #[error("worker unreachable: {source}")]
    Unreachable {
        /// The dial failure that aborted the cycle.
        #[source]
        source: DialError,
    },

    /// The attempt was abandoned because the supervisor is shutting down.
    #[error("connection attempt cancelled")]
    Cancelled,
}

impl ConnectError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectError::Timeout { .. } => "connect_timeout",
            ConnectError::Unreachable { .. } => "connect_unreachable",
            ConnectError::Cancelled => "connect_cancelled",
        }
    }
}

/// # Errors returned by the public supervisor surface.
///
/// Only terminal causes of an activation cycle ([`SessionError::Spawn`],
/// [`SessionError::Connect`]), the end of a served session
/// ([`SessionError::Failed`]) and misuse after shutdown are reported here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
    /// The worker process could not be launched.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// No link could be established to the worker.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The supervisor has been disposed.
    #[error("supervisor disposed")]
    Disposed,

    /// There is no active link to write to.
    #[error("no active link")]
    NotConnected,

    /// The active link closed before the write could be queued.
    #[error("link closed")]
    LinkClosed,

    /// A served session ended in `Failed`; `detail` is the terminal cause.
    #[error("session failed: {detail}")]
    Failed {
        /// Human-readable cause, as published with the `Failed` update.
        detail: String,
    },
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use dapvisor::SessionError;
    ///
    /// assert_eq!(SessionError::Disposed.as_label(), "session_disposed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::Spawn(e) => e.as_label(),
            SessionError::Connect(e) => e.as_label(),
            SessionError::Disposed => "session_disposed",
            SessionError::NotConnected => "session_not_connected",
            SessionError::LinkClosed => "session_link_closed",
            SessionError::Failed { .. } => "session_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_kinds_are_retryable() {
        assert!(DialError::refused("localhost:4142").is_refusal());
        let reset = DialError::new("localhost:4142", io::ErrorKind::ConnectionReset.into());
        assert!(reset.is_refusal());
    }

    #[test]
    fn configuration_failures_are_not_refusals() {
        let dns = DialError::new(
            "nowhere.invalid:4142",
            io::Error::other("failed to lookup address information"),
        );
        assert!(!dns.is_refusal());
        assert_eq!(dns.as_label(), "dial_failed");

        let denied = DialError::new("localhost:4142", io::ErrorKind::PermissionDenied.into());
        assert!(!denied.is_refusal());
    }

    #[test]
    fn spawn_error_classifies_io_kind() {
        let err = SpawnError::from_io("racket", io::ErrorKind::NotFound.into());
        assert!(matches!(err, SpawnError::NotFound { .. }));
        assert_eq!(err.as_label(), "spawn_not_found");

        let err = SpawnError::from_io("racket", io::ErrorKind::PermissionDenied.into());
        assert!(matches!(err, SpawnError::PermissionDenied { .. }));

        let err = SpawnError::from_io("racket", io::Error::other("too many open files"));
        assert_eq!(err.as_label(), "spawn_io");
    }

    #[test]
    fn session_error_forwards_labels() {
        let err: SessionError = ConnectError::Timeout {
            after: Duration::from_secs(60),
            attempts: 60,
        }
        .into();
        assert_eq!(err.as_label(), "connect_timeout");
        assert!(err.to_string().contains("60 attempts"));
    }
}
