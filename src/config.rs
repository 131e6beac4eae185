//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the fixed deployment parameters of one
//! supervised session, plus the two value types it is built from:
//! [`Endpoint`] (where to dial) and [`WorkerCommand`] (what to launch).
//!
//! ## Sentinel values
//! - `connect_timeout = 0s` → one dial, no retry
//! - `report_every = 0` → treated as 1 (report every refusal)
//! - `bus_capacity = 0` → treated as 1

use std::fmt;
use std::time::Duration;

use crate::policies::{BackoffPolicy, JitterPolicy};

/// TCP target of the worker's listening socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    /// `localhost:4142`, where the debug adapter listens.
    fn default() -> Self {
        Self::new("localhost", 4142)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Program and arguments used to launch the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Executable name or path.
    pub program: String,
    /// Fixed launch arguments.
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Creates a command from a program and its arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for WorkerCommand {
    /// `racket -l dap-debugger`.
    fn default() -> Self {
        Self::new("racket", ["-l", "dap-debugger"])
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Configuration of one [`ConnectionSupervisor`](crate::ConnectionSupervisor).
///
/// ## Field semantics
/// - `connect_timeout`: total budget of one attempt cycle (`0s` = single dial)
/// - `retry_delay`: pause between refused dials
/// - `settle_delay`: pause between link loss and the next attempt cycle
/// - `report_every`: refusal reporting cadence on the status channel
/// - `stop_grace`: how long `stop` waits for a killed worker to be reaped
/// - `restart_backoff`: delay policy for repeated crashes before reconnecting
/// - `bus_capacity`: status channel ring buffer size
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Where the worker listens.
    pub endpoint: Endpoint,

    /// How the worker is launched.
    pub command: WorkerCommand,

    /// Overall time budget of one connection attempt cycle.
    ///
    /// When it runs out, the cycle fails with `ConnectError::Timeout`, the
    /// worker is terminated and the supervisor moves to `Failed`.
    pub connect_timeout: Duration,

    /// Delay between a refused dial and the next one.
    pub retry_delay: Duration,

    /// Delay between link loss and the next attempt cycle.
    pub settle_delay: Duration,

    /// Report one refusal out of every `report_every` (1st, 6th, 11th, ... with 5).
    pub report_every: u32,

    /// Maximum wait for a terminated worker to be reaped.
    pub stop_grace: Duration,

    /// Crash-loop policy.
    ///
    /// The first restart after an unexpected exit is immediate; the `n`-th
    /// consecutive one (`n >= 2`) waits `restart_backoff.next(n - 2)`. The
    /// streak resets once a link is established.
    pub restart_backoff: BackoffPolicy,

    /// Capacity of the status channel broadcast ring buffer.
    pub bus_capacity: usize,
}

impl SupervisorConfig {
    /// Refusal reporting cadence, never below 1.
    #[inline]
    pub fn report_every_clamped(&self) -> u32 {
        self.report_every.max(1)
    }

    /// Bus capacity, never below 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `endpoint = localhost:4142`, `command = racket -l dap-debugger`
    /// - `connect_timeout = 60s`, `retry_delay = 1s`, `settle_delay = 2s`
    /// - `report_every = 5`, `stop_grace = 5s`, `bus_capacity = 1024`
    /// - `restart_backoff`: 500ms doubling up to 30s, no jitter
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            command: WorkerCommand::default(),
            connect_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            report_every: 5,
            stop_grace: Duration::from_secs(5),
            restart_backoff: BackoffPolicy {
                first: Duration::from_millis(500),
                max: Duration::from_secs(30),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_debug_adapter_deployment() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.endpoint.to_string(), "localhost:4142");
        assert_eq!(cfg.command.to_string(), "racket -l dap-debugger");
        assert_eq!(cfg.connect_timeout, Duration::from_secs(60));
        assert_eq!(cfg.retry_delay, Duration::from_secs(1));
        assert_eq!(cfg.settle_delay, Duration::from_secs(2));
    }

    #[test]
    fn sentinels_are_clamped() {
        let cfg = SupervisorConfig {
            report_every: 0,
            bus_capacity: 0,
            ..SupervisorConfig::default()
        };
        assert_eq!(cfg.report_every_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
