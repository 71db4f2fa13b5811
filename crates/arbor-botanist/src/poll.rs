//! Bounded poll executor
//!
//! [`poll_until`] evaluates a readiness check immediately and then on a fixed
//! interval until it reports [`Readiness::Ready`] or [`Readiness::Failed`], the
//! step's deadline passes, or the operation is cancelled. Ticks fall at
//! `start + k * interval`; a tick landing exactly on the deadline still gets
//! its check. Both the check and the sleep between ticks race the
//! cancellation token and the deadline, so neither has to wait for a tick
//! boundary. A check that has not answered when the deadline arrives is
//! dropped.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use arbor_common::{Error, Result};

use crate::readiness::Readiness;

/// Interval and deadline for one wait step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSpec {
    /// Time between the start of two consecutive checks
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    /// Budget for the whole step, measured from the first check
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl PollSpec {
    /// Create a poll spec
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Check `interval > 0`, `timeout > 0` and `interval <= timeout`
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::validation_for_field(
                "interval",
                "poll interval must be greater than zero",
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::validation_for_field(
                "timeout",
                "poll timeout must be greater than zero",
            ));
        }
        if self.interval > self.timeout {
            return Err(Error::validation_for_field(
                "interval",
                format!(
                    "poll interval {:?} exceeds timeout {:?}",
                    self.interval, self.timeout
                ),
            ));
        }
        Ok(())
    }

    /// Upper bound on checks within the budget: `floor(timeout / interval) + 1`
    ///
    /// Counts the immediate check at zero and one at every tick up to and
    /// including the deadline.
    pub fn max_evaluations(&self) -> u64 {
        let interval = self.interval.as_nanos().max(1);
        (self.timeout.as_nanos() / interval) as u64 + 1
    }
}

/// Serialize a Duration as whole seconds
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Poll `check` until it is ready, fails, the deadline passes, or `cancel` fires.
///
/// # Returns
/// * `Ok(T)` - the value carried by the first [`Readiness::Ready`]
/// * `Err(cause)` - the cause carried by a [`Readiness::Failed`], unchanged
/// * `Err(Error::Timeout)` - the deadline passed; `last_error` holds the most
///   recent transient error, or the last pending reason if none was seen
/// * `Err(Error::Cancelled)` - `cancel` fired before an outcome was reached
pub async fn poll_until<T, F, Fut>(
    spec: PollSpec,
    cancel: &CancellationToken,
    operation: &str,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Readiness<T>>,
{
    spec.validate()?;

    let deadline = Instant::now() + spec.timeout;
    let mut last_error: Option<String> = None;
    let mut last_reason: Option<String> = None;
    let mut attempt: u64 = 0;

    let timed_out = |last_error: Option<String>, last_reason: Option<String>| {
        Error::timeout(operation, spec.timeout, last_error.or(last_reason))
    };

    loop {
        if cancel.is_cancelled() {
            return Err(Error::cancelled(operation));
        }

        attempt += 1;
        let tick_start = Instant::now();

        // The check is polled before the deadline so one that answers at the
        // deadline instant still counts.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled(operation)),
            outcome = check() => outcome,
            _ = sleep_until(deadline) => {
                trace!(operation, attempt, "deadline reached during check");
                return Err(timed_out(last_error, last_reason));
            }
        };

        match outcome {
            Readiness::Ready(value) => {
                debug!(operation, attempt, "condition met");
                return Ok(value);
            }
            Readiness::Failed(cause) => {
                debug!(operation, attempt, error = %cause, "condition failed");
                return Err(cause);
            }
            Readiness::Pending { reason, error } => {
                match &error {
                    Some(e) => debug!(operation, attempt, reason = %reason, error = %e, "waiting"),
                    None => debug!(operation, attempt, reason = %reason, "waiting"),
                }
                if error.is_some() {
                    last_error = error;
                }
                last_reason = Some(reason);
            }
        }

        let next_tick = tick_start + spec.interval;
        if next_tick > deadline || Instant::now() >= deadline {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled(operation)),
                _ = sleep_until(deadline) => {}
            }
            trace!(operation, attempt, "deadline reached");
            return Err(timed_out(last_error, last_reason));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled(operation)),
            _ = sleep_until(next_tick) => {}
        }
    }
}
