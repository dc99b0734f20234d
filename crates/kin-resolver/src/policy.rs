use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, ResolverResult};

/// Bounded exponential backoff for content identifier resolution.
///
/// Attempt `k` (1-based) is followed, unless it is the last, by a sleep of
/// `initial_delay * multiplier^(k-1)`. With the defaults the resolver looks
/// at the path five times, sleeping 1s, 2s, 4s and 8s in between.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Upper bound on resolution attempts, first one included.
    pub max_attempts: u32,
    /// Sleep after the first failed attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Factor applied to the sleep after each further attempt.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// A policy with the default multiplier.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            ..Default::default()
        }
    }

    /// A single attempt, no sleeping.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Sleep taken after the given 1-based attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier).saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }

    /// Total time spent sleeping when every attempt misses.
    pub fn budget(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Reject policies the resolver cannot run.
    pub fn validate(&self) -> ResolverResult<()> {
        if self.max_attempts == 0 {
            return Err(ResolverError::InvalidPolicy(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.multiplier == 0 {
            return Err(ResolverError::InvalidPolicy(
                "multiplier must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
