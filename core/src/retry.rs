//! Retry plans with exponential backoff.
//!
//! The first delay is `base_delay + uniform(0, jitter)`, drawn once per call
//! site; every further failed attempt doubles it. Jitter is not re-drawn.

use crate::error::{CoreError, CoreResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPlan {
    /// Maximum number of attempts, including the first one (>= 1)
    pub max_attempts: u32,
    /// Base delay before the second attempt, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound of the random component added to the base delay, in milliseconds
    pub jitter_ms: u64,
}

impl Default for RetryPlan {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2000, // 2 seconds
            jitter_ms: 1000,
        }
    }
}

impl RetryPlan {
    /// Create a validated retry plan
    pub fn new(max_attempts: u32, base_delay: Duration, jitter: Duration) -> CoreResult<Self> {
        if max_attempts == 0 {
            return Err(CoreError::InvalidRetryPlan(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            jitter_ms: jitter.as_millis() as u64,
        })
    }

    /// A plan that tries once and never sleeps
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            jitter_ms: 0,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    /// Draw the initial delay: base plus a uniform random jitter.
    pub fn initial_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..=self.jitter_ms)
        };
        Duration::from_millis(self.base_delay_ms.saturating_add(jitter))
    }

    /// Start a backoff schedule with a freshly drawn initial delay.
    pub fn schedule(&self) -> BackoffSchedule {
        let initial = self.initial_delay(&mut rand::thread_rng());
        BackoffSchedule::new(self.max_attempts.max(1), initial)
    }
}

/// Delay for a given attempt (1-based) when the first delay is `initial`.
///
/// Attempt 1 waits `initial`, attempt 2 waits `2 * initial`, and so on.
pub fn calculate_backoff(initial: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    initial.saturating_mul(1u32 << shift)
}

/// Delays for one retry loop.
///
/// Call [`BackoffSchedule::after_failure`] once per failed attempt; it returns
/// the delay to sleep before the next attempt, or `None` when the failed
/// attempt was the last one allowed.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    max_attempts: u32,
    failed_attempts: u32,
    initial: Duration,
}

impl BackoffSchedule {
    pub fn new(max_attempts: u32, initial: Duration) -> Self {
        Self {
            max_attempts,
            failed_attempts: 0,
            initial,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn after_failure(&mut self) -> Option<Duration> {
        self.failed_attempts += 1;
        if self.failed_attempts >= self.max_attempts {
            return None;
        }
        Some(calculate_backoff(self.initial, self.failed_attempts))
    }
}
