//! Fixed-delay retry of transient failures.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::config::RetryConfig;
use super::error::CallError;

/// Retries an operation while it fails transiently.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    wait: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            wait: config.wait,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `attempt` (passing the 1-based attempt number) until it succeeds,
    /// fails with a non-transient error, or the attempts are used up.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `attempt`.
    pub async fn run<T, F, Fut>(&self, dependency: &str, mut attempt: F) -> Result<T, CallError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let mut n = 1;
        loop {
            match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && n < self.max_attempts => {
                    debug!(dependency, attempt = n, error = %err, "retrying after transient failure");
                    tokio::time::sleep(self.wait).await;
                    n += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(&RetryConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_up_to_max() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result: Result<(), _> = policy()
            .run("dep", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::Connection("refused".into())) }
            })
            .await;
        assert!(matches!(result, Err(CallError::Connection(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_terminal() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("dep", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CallError::NotFound) }
            })
            .await;
        assert_eq!(result, Err(CallError::NotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_later_attempt() {
        let result = policy()
            .run("dep", |n| async move {
                if n < 3 {
                    Err(CallError::Timeout { timeout_ms: 10 })
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result, Ok(3));
    }
}
