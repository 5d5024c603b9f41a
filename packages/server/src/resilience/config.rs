//! Resilience configuration types.

use std::time::Duration;

/// Circuit breaker thresholds for one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes kept in the sliding window.
    pub sliding_window_size: usize,
    /// Samples required before the failure rate is evaluated.
    pub minimum_number_of_calls: usize,
    /// Failure percentage (0-100) at or above which the breaker opens.
    pub failure_rate_threshold: u8,
    /// How long the breaker stays open before admitting probes.
    pub wait_duration_in_open_state: Duration,
    /// Probes admitted while half-open; that many consecutive successes close the breaker.
    pub permitted_calls_in_half_open_state: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_number_of_calls: 5,
            failure_rate_threshold: 50,
            wait_duration_in_open_state: Duration::from_secs(5),
            permitted_calls_in_half_open_state: 3,
        }
    }
}

/// Fixed-delay retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: Duration::from_secs(1),
        }
    }
}

/// Everything a [`super::ResilienceGateway`] needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResilienceConfig {
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    /// Hard deadline for each attempt.
    pub call_timeout: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            call_timeout: Duration::from_secs(2),
        }
    }
}

impl ResilienceConfig {
    /// Deadline for a whole gateway call: `call_timeout + max_attempts * retry.wait`.
    #[must_use]
    pub fn overall_budget(&self) -> Duration {
        self.call_timeout + self.retry.wait * self.retry.max_attempts
    }
}
