//! # Retry Module
//!
//! Retry policies are opaque to the dispatcher: it threads the effective policy
//! (call override or client default) through to the transport untouched, and
//! the transport decides how to interpret it. [`RetryPolicy::execute`] is the
//! schedule the HTTP transport uses.
//!
//! `count` is always the maximum number of attempts, the first one included,
//! so `Fixed { count: 5, .. }` tolerates four failures.

use crate::error::ApiError;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

/// Exponential backoff schedule.
///
/// Delay before attempt `n` (1-based, `n >= 2`) is
/// `min(initial * multiplier^(n-2), max)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExponentialBackoff {
    /// Maximum number of attempts
    pub count: u32,
    /// Delay before the first retry
    #[serde(with = "millis")]
    pub initial: Duration,
    /// Upper bound for any single delay
    #[serde(with = "millis")]
    pub max: Duration,
    /// Growth factor between consecutive delays; finite and at least 1.0
    #[serde(
        default = "default_multiplier",
        deserialize_with = "validated_multiplier"
    )]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    2.0
}

fn validated_multiplier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() && value >= 1.0 {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(format!(
            "backoff multiplier must be a finite number >= 1.0, got {value}"
        )))
    }
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(count: u32, initial: Duration, max: Duration) -> Self {
        Self {
            count,
            initial,
            max,
            multiplier: default_multiplier(),
        }
    }

    /// Delay to wait before `attempt` (1-based). The first attempt never waits.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(exp);
        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(scaled.max(0.0))
        }
    }
}

/// Per-call retry policy handed opaquely to the transport.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Single attempt
    #[default]
    None,
    /// Up to `count` attempts, `delay` apart
    Fixed {
        count: u32,
        #[serde(with = "millis")]
        delay: Duration,
    },
    /// Up to `count` attempts with exponentially growing delays
    Backoff(ExponentialBackoff),
}

impl RetryPolicy {
    /// Fixed schedule: `count` attempts, `delay` between them.
    #[must_use]
    pub fn fixed(count: u32, delay: Duration) -> Self {
        RetryPolicy::Fixed { count, delay }
    }

    /// Total attempts this policy allows (never less than one).
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 1,
            RetryPolicy::Fixed { count, .. } => (*count).max(1),
            RetryPolicy::Backoff(backoff) => backoff.count.max(1),
        }
    }

    /// Delay to wait before `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { delay, .. } => {
                if attempt <= 1 {
                    Duration::ZERO
                } else {
                    *delay
                }
            }
            RetryPolicy::Backoff(backoff) => backoff.delay_for(attempt),
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// policy runs out of attempts. `op` receives the 1-based attempt number.
    ///
    /// Blocks the calling thread between attempts, so this belongs on a
    /// transport worker thread, not on a coroutine.
    pub fn execute<T, F>(&self, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut(u32) -> Result<T, ApiError>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            let delay = self.delay_for(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    debug!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_makes_one_attempt() {
        let mut calls = 0;
        let result: Result<(), ApiError> = RetryPolicy::None.execute(|_| {
            calls += 1;
            Err(ApiError::Transport("down".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_fixed_retries_until_success() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(1));
        let mut seen = Vec::new();
        let result = policy.execute(|attempt| {
            seen.push(attempt);
            if attempt < 5 {
                Err(ApiError::Status {
                    status: 502,
                    body: serde_json::Value::Null,
                })
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(5));
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(1));
        let mut calls = 0;
        let result: Result<(), ApiError> = policy.execute(|_| {
            calls += 1;
            Err(ApiError::Status {
                status: 404,
                body: serde_json::Value::Null,
            })
        });
        assert_eq!(result.err().and_then(|e| e.status()), Some(404));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_backoff_delays_grow_and_cap() {
        let backoff =
            ExponentialBackoff::new(6, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(backoff.delay_for(1), Duration::ZERO);
        assert_eq!(backoff.delay_for(2), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(4), Duration::from_millis(350));
        assert_eq!(backoff.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_zero_count_still_attempts_once() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let policy: RetryPolicy =
            serde_yaml::from_str("kind: fixed\ncount: 5\ndelay: 500\n").expect("fixed policy");
        assert_eq!(policy, RetryPolicy::fixed(5, Duration::from_millis(500)));

        let policy: RetryPolicy =
            serde_yaml::from_str("kind: backoff\ncount: 3\ninitial: 10\nmax: 1000\n")
                .expect("backoff policy");
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_backoff_multiplier_below_one_is_rejected() {
        for bad in ["-2.0", "0.5", ".nan", ".inf"] {
            let yaml = format!("kind: backoff\ncount: 4\ninitial: 10\nmax: 1000\nmultiplier: {bad}\n");
            assert!(
                serde_yaml::from_str::<RetryPolicy>(&yaml).is_err(),
                "multiplier {bad} should be rejected"
            );
        }
        let policy: RetryPolicy = serde_yaml::from_str(
            "kind: backoff\ncount: 4\ninitial: 100\nmax: 1000\nmultiplier: 3.0\n",
        )
        .expect("valid multiplier");
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn test_negative_multiplier_never_panics() {
        let mut backoff =
            ExponentialBackoff::new(4, Duration::from_millis(10), Duration::from_millis(1000));
        backoff.multiplier = -2.0;
        assert_eq!(backoff.delay_for(2), Duration::from_millis(10));
        assert_eq!(backoff.delay_for(3), Duration::ZERO);
    }
}
