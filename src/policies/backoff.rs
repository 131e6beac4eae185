//! # Restart backoff.
//!
//! [`BackoffPolicy`] turns a crash streak into a delay. The base for step `n`
//! is `first × factor^n`, clamped to `max`; jitter is applied to the clamped
//! base and never fed back into later steps.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use dapvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(30),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(500));
//! assert_eq!(backoff.next(3), Duration::from_secs(4));
//! assert_eq!(backoff.next(20), Duration::from_secs(30));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Capped exponential delay policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay for step 0.
    pub first: Duration,
    /// Upper bound for any step.
    pub max: Duration,
    /// Growth factor per step (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 500ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Delay for step `step` (0-indexed).
    ///
    /// Overflowing or non-finite intermediate values clamp to `max`.
    pub fn next(&self, step: u32) -> Duration {
        let exp = step.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}
