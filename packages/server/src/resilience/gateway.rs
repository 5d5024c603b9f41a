//! Composition of timeout, retry and circuit breaker around one outbound call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use orgmesh_core::clock::ClockSource;
use tracing::warn;

use super::circuit_breaker::CircuitBreaker;
use super::clock::TokioClock;
use super::config::ResilienceConfig;
use super::error::CallError;
use super::retry::RetryPolicy;
use crate::telemetry::FALLBACKS_TOTAL;

/// Guards every call to one logical dependency.
///
/// Layering, outermost first: overall budget, retry, circuit breaker
/// permission, per-attempt timeout. The breaker therefore sees every attempt,
/// and a retry loop stops as soon as the breaker opens.
#[derive(Debug)]
pub struct ResilienceGateway {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
    budget: Duration,
}

impl ResilienceGateway {
    /// Creates a gateway whose breaker follows the tokio clock.
    #[must_use]
    pub fn new(dependency: impl Into<String>, config: &ResilienceConfig) -> Self {
        Self::with_clock(dependency, config, Arc::new(TokioClock::new()))
    }

    #[must_use]
    pub fn with_clock(
        dependency: impl Into<String>,
        config: &ResilienceConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        Self {
            breaker: Arc::new(CircuitBreaker::new(dependency, config.breaker.clone(), clock)),
            retry: RetryPolicy::new(&config.retry),
            call_timeout: config.call_timeout,
            budget: config.overall_budget(),
        }
    }

    /// Name of the guarded dependency.
    #[must_use]
    pub fn dependency(&self) -> &str {
        self.breaker.name()
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Runs `op` under the full resilience stack.
    ///
    /// `op` is invoked once per attempt.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::CircuitOpen`] without invoking `op` while the
    /// breaker rejects calls, [`CallError::Timeout`] when an attempt or the
    /// overall budget runs out, or the last error `op` produced.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let dependency = self.dependency();
        let attempts = self.retry.run(dependency, |_attempt| {
            let permit = self.breaker.try_acquire();
            let fut = permit.is_ok().then(&mut op);
            async move {
                let permit = permit?;
                let Some(fut) = fut else {
                    return Err(CallError::CircuitOpen(dependency.to_string()));
                };
                match tokio::time::timeout(self.call_timeout, fut).await {
                    Ok(Ok(value)) => {
                        permit.record_success();
                        Ok(value)
                    }
                    Ok(Err(err)) => {
                        permit.record(err.counts_as_success());
                        Err(err)
                    }
                    Err(_elapsed) => {
                        permit.record_failure();
                        Err(CallError::timeout(self.call_timeout))
                    }
                }
            }
        });

        // Dropping the in-flight attempt on budget expiry drops its permit,
        // which records a failure.
        match tokio::time::timeout(self.budget, attempts).await {
            Ok(result) => result,
            Err(_elapsed) => Err(CallError::timeout(self.budget)),
        }
    }

    /// Runs `op` and substitutes `fallback(&error)` for any failure.
    pub async fn call_or_fallback<T, F, Fut, FB>(&self, op: F, fallback: FB) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
        FB: FnOnce(&CallError) -> T,
    {
        match self.call(op).await {
            Ok(value) => value,
            Err(err) => {
                warn!(dependency = %self.dependency(), error = %err, "using fallback");
                metrics::counter!(FALLBACKS_TOTAL, "dependency" => self.dependency().to_string())
                    .increment(1);
                fallback(&err)
            }
        }
    }
}
