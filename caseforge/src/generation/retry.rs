//! Retry policy for generation calls.
//!
//! Transport failures and timeouts back off and consume attempts. A
//! rate-limit response instead triggers an explicit cool-down that does not
//! consume an attempt; consecutive rate limits double the cool-down up to a
//! cap, and a server-provided retry-after wins when longer.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for generation retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts (including the initial call).
    pub max_attempts: usize,
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
    /// Base rate-limit cool-down in milliseconds.
    pub cooldown_base_ms: u64,
    /// Rate-limit cool-down cap in milliseconds.
    pub cooldown_cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff: BackoffStrategy::Exponential,
            jitter: JitterStrategy::Full,
            cooldown_base_ms: 30_000,
            cooldown_cap_ms: 120_000,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Sets the rate-limit cool-down base and cap.
    #[must_use]
    pub fn with_cooldown_ms(mut self, base: u64, cap: u64) -> Self {
        self.cooldown_base_ms = base;
        self.cooldown_cap_ms = cap;
        self
    }
}

/// Attempt tracking across one logical generation call.
///
/// Attempt counters are first-class state rather than loop locals so they
/// survive suspension and can be reported on events.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts consumed so far (transport failures and timeouts).
    pub attempt: usize,
    /// Consecutive rate-limit responses observed.
    pub consecutive_rate_limits: u32,
}

impl RetryState {
    /// Creates fresh state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if attempts are exhausted.
    #[must_use]
    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempt >= policy.max_attempts
    }

    /// Calculates the backoff delay for the current attempt.
    #[must_use]
    pub fn backoff_delay(&self, policy: &RetryPolicy) -> Duration {
        let base = policy.base_delay_ms;
        let max = policy.max_delay_ms;

        let delay = match policy.backoff {
            BackoffStrategy::Exponential => base
                .saturating_mul(2u64.saturating_pow(self.attempt as u32))
                .min(max),
            BackoffStrategy::Linear => base.saturating_mul(self.attempt as u64 + 1).min(max),
            BackoffStrategy::Constant => base.min(max),
        };

        let jittered = match policy.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }

    /// Records a retryable failure and returns the delay before the next
    /// attempt, or `None` when attempts are exhausted.
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> Option<Duration> {
        self.consecutive_rate_limits = 0;
        self.attempt += 1;
        if self.is_exhausted(policy) {
            None
        } else {
            Some(self.backoff_delay(policy))
        }
    }

    /// Records a rate-limit response and returns the cool-down to apply.
    ///
    /// Does not consume an attempt. The cool-down doubles per consecutive
    /// rate limit up to the cap; a longer server-provided retry-after wins.
    pub fn record_rate_limit(
        &mut self,
        policy: &RetryPolicy,
        retry_after_ms: Option<u64>,
    ) -> Duration {
        let scaled = policy
            .cooldown_base_ms
            .saturating_mul(2u64.saturating_pow(self.consecutive_rate_limits))
            .min(policy.cooldown_cap_ms);
        self.consecutive_rate_limits += 1;
        Duration::from_millis(scaled.max(retry_after_ms.unwrap_or(0)))
    }
}
