//! # ConnectionAttempt: bounded-retry dial loop.
//!
//! Dials the endpoint until it accepts, the time budget runs out, a
//! non-retryable error shows up, or the caller cancels.
//!
//! ## Flow
//! ```text
//! reset budget, deadline = now + max_duration
//! loop {
//!   ├─► attempts += 1, dial()            (raced against deadline / cancel)
//!   │     ├─ Ok            ─► return stream
//!   │     ├─ refusal       ─► refusals += 1, on_refusal(1st / 6th / 11th ...)
//!   │     │                   max_duration == 0 ─► Timeout
//!   │     │                   sleep(retry_delay) (raced against deadline / cancel)
//!   │     └─ other error   ─► Unreachable (no retry)
//!   └─► deadline hit       ─► Timeout
//! }
//! ```
//!
//! ## Rules
//! - One dial in flight at a time; the previous dial future (and any socket it
//!   owns) is dropped before the next one starts.
//! - `attempt` takes `&mut self`, so one instance cannot run two loops at once.
//! - The loop never overshoots `max_duration`: both the dial and the retry
//!   sleep are cut off at the deadline. A `max_duration` too large to be
//!   represented as an instant means no deadline at all.
//! - Refusal reports go to a callback; the attempt never publishes status
//!   itself, so its owner decides whether a report is still current.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Endpoint;
use crate::connection::dialer::{Dialer, LinkStream};
use crate::error::ConnectError;

/// Callback receiving the attempt number of a reported refusal.
pub type RefusalHook = Box<dyn Fn(u32) + Send + Sync + 'static>;

/// Counters of one attempt cycle. Reset at the start of every cycle.
#[derive(Clone, Copy, Debug)]
pub struct RetryBudget {
    /// Dials made so far.
    pub attempts: u32,
    /// Dials refused so far.
    pub refusals: u32,
    /// Delay applied between refused dials.
    pub retry_delay: Duration,
    started: Instant,
}

impl RetryBudget {
    fn new(retry_delay: Duration) -> Self {
        Self {
            attempts: 0,
            refusals: 0,
            retry_delay,
            started: Instant::now(),
        }
    }

    /// Time since the cycle started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// One bounded-retry dial loop against the worker.
pub struct ConnectionAttempt {
    dialer: Arc<dyn Dialer>,
    report_every: u32,
    on_refusal: Option<RefusalHook>,
    budget: RetryBudget,
}

impl ConnectionAttempt {
    /// Creates an attempt that waits `retry_delay` between refused dials.
    pub fn new(dialer: Arc<dyn Dialer>, retry_delay: Duration) -> Self {
        Self {
            dialer,
            report_every: 5,
            on_refusal: None,
            budget: RetryBudget::new(retry_delay),
        }
    }

    /// Calls `on_refusal` with the attempt number of every `every`-th
    /// refusal, starting with the first.
    pub fn with_reports(mut self, every: u32, on_refusal: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_refusal = Some(Box::new(on_refusal));
        self.report_every = every.max(1);
        self
    }

    /// Counters of the last (or current) cycle.
    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    /// Dials `endpoint` until success, timeout, hard failure or cancellation.
    ///
    /// `max_duration == 0` makes exactly one dial.
    pub async fn attempt(
        &mut self,
        endpoint: &Endpoint,
        max_duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<LinkStream, ConnectError> {
        self.budget = RetryBudget::new(self.budget.retry_delay);
        let deadline = self.budget.started.checked_add(max_duration);
        let single_shot = max_duration.is_zero();
        tracing::debug!(%endpoint, ?max_duration, "establishing connection to worker");

        loop {
            self.budget.attempts += 1;

            let dialed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ConnectError::Cancelled),
                _ = expires(deadline), if !single_shot => return Err(self.timeout(max_duration)),
                res = self.dialer.dial(endpoint) => res,
            };

            match dialed {
                Ok(stream) => {
                    tracing::info!(
                        %endpoint,
                        attempts = self.budget.attempts,
                        elapsed = ?self.budget.elapsed(),
                        "connected to worker"
                    );
                    return Ok(stream);
                }
                Err(e) if e.is_refusal() => {
                    self.budget.refusals += 1;
                    tracing::debug!(attempt = self.budget.attempts, error = %e, "worker refused connection");
                    self.report_refusal();

                    if single_shot {
                        return Err(self.timeout(max_duration));
                    }
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ConnectError::Cancelled),
                        _ = expires(deadline) => return Err(self.timeout(max_duration)),
                        _ = time::sleep(self.budget.retry_delay) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(%endpoint, error = %e, "failed to connect to worker");
                    return Err(ConnectError::Unreachable { source: e });
                }
            }
        }
    }

    fn timeout(&self, after: Duration) -> ConnectError {
        tracing::warn!(attempts = self.budget.attempts, ?after, "worker did not become ready");
        ConnectError::Timeout {
            after,
            attempts: self.budget.attempts,
        }
    }

    fn report_refusal(&self) {
        if (self.budget.refusals - 1) % self.report_every != 0 {
            return;
        }
        tracing::info!(attempt = self.budget.attempts, "waiting for worker to be ready");
        if let Some(report) = &self.on_refusal {
            report(self.budget.attempts);
        }
    }
}

/// Completes at `deadline`; never, without one.
async fn expires(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::testing::ScriptedDialer;

    fn endpoint() -> Endpoint {
        Endpoint::default()
    }

    #[tokio::test(start_paused = true)]
    async fn refusals_then_success_within_window() {
        let dialer = ScriptedDialer::refusing_for(Duration::from_secs(3));
        let mut attempt = ConnectionAttempt::new(Arc::new(dialer.clone()), Duration::from_secs(1));
        let started = Instant::now();

        let stream = attempt
            .attempt(&endpoint(), Duration::from_secs(60), &CancellationToken::new())
            .await;

        assert!(stream.is_ok());
        let budget = attempt.budget();
        assert_eq!(budget.refusals, 3);
        assert_eq!(budget.attempts, 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_leaves_no_open_socket() {
        let dialer = ScriptedDialer::never_accepting();
        let mut attempt = ConnectionAttempt::new(Arc::new(dialer.clone()), Duration::from_secs(1));
        let started = Instant::now();

        let err = attempt
            .attempt(&endpoint(), Duration::from_secs(60), &CancellationToken::new())
            .await
            .err()
            .expect("never accepting worker must time out");

        assert!(matches!(err, ConnectError::Timeout { attempts: 60..=61, .. }));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed <= Duration::from_secs(61));
        assert!((60..=61).contains(&dialer.dials()));
        assert_eq!(dialer.closed(), dialer.dials());
        assert_eq!(dialer.established(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_dials_never_overshoot_deadline() {
        let dialer = ScriptedDialer::never_accepting().with_latency(Duration::from_millis(700));
        let mut attempt = ConnectionAttempt::new(Arc::new(dialer.clone()), Duration::from_secs(1));
        let started = Instant::now();

        let res = attempt
            .attempt(&endpoint(), Duration::from_secs(10), &CancellationToken::new())
            .await;

        assert!(matches!(res, Err(ConnectError::Timeout { .. })));
        assert!(started.elapsed() <= Duration::from_secs(10) + Duration::from_secs(1));
        // the dial cut off by the deadline is dropped, and with it its socket
        assert_eq!(dialer.closed(), dialer.dials());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_means_single_dial() {
        let dialer = ScriptedDialer::never_accepting();
        let mut attempt = ConnectionAttempt::new(Arc::new(dialer.clone()), Duration::from_secs(1));

        let res = attempt
            .attempt(&endpoint(), Duration::ZERO, &CancellationToken::new())
            .await;

        assert!(matches!(res, Err(ConnectError::Timeout { attempts: 1, .. })));
        assert_eq!(dialer.dials(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_refusal_aborts_immediately() {
        let dialer = ScriptedDialer::unreachable();
        let mut attempt = ConnectionAttempt::new(Arc::new(dialer.clone()), Duration::from_secs(1));
        let started = Instant::now();

        let res = attempt
            .attempt(&endpoint(), Duration::from_secs(60), &CancellationToken::new())
            .await;

        assert!(matches!(res, Err(ConnectError::Unreachable { .. })));
        assert_eq!(dialer.dials(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_abandons_in_flight_dial() {
        let dialer = ScriptedDialer::accepting().with_latency(Duration::from_secs(5));
        let mut attempt = ConnectionAttempt::new(Arc::new(dialer.clone()), Duration::from_secs(1));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let res = attempt.attempt(&endpoint(), Duration::from_secs(60), &cancel).await;
        assert!(matches!(res, Err(ConnectError::Cancelled)));
        assert_eq!(dialer.established(), 0);
        assert_eq!(dialer.closed(), dialer.dials());
    }

    #[tokio::test(start_paused = true)]
    async fn every_fifth_refusal_is_reported() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let dialer = ScriptedDialer::refusing_for(Duration::from_secs(12));
        let mut attempt = ConnectionAttempt::new(Arc::new(dialer), Duration::from_secs(1))
            .with_reports(5, move |n| sink.lock().unwrap().push(n));

        attempt
            .attempt(&endpoint(), Duration::from_secs(60), &CancellationToken::new())
            .await
            .map(drop)
            .expect("worker accepts after 12s");

        assert_eq!(*reported.lock().unwrap(), vec![1, 6, 11]);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_budget_means_no_deadline() {
        let dialer = ScriptedDialer::refusing_for(Duration::from_secs(3));
        let mut attempt = ConnectionAttempt::new(Arc::new(dialer.clone()), Duration::from_secs(1));

        let stream = attempt
            .attempt(&endpoint(), Duration::MAX, &CancellationToken::new())
            .await;

        assert!(stream.is_ok());
        assert_eq!(attempt.budget().refusals, 3);
        assert_eq!(dialer.dials(), 4);
    }
}
