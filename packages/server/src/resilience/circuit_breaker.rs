//! Count-based circuit breaker.
//!
//! State machine: CLOSED -> OPEN -> HALF_OPEN -> CLOSED (or back to OPEN).
//!
//! All state lives behind a single `parking_lot::Mutex` that is only held
//! while reading or updating counters, never across the guarded call. A call
//! obtains a [`Permit`] before it starts and reports its outcome through it;
//! a permit dropped without an outcome (cancelled future, panic) counts as a
//! failure.
//!
//! Every transition bumps a generation counter. Outcomes reported through a
//! permit issued in an earlier generation are discarded so a slow call from
//! a previous CLOSED period cannot flip a fresh HALF_OPEN probe cycle.

use std::collections::VecDeque;
use std::sync::Arc;

use orgmesh_core::clock::ClockSource;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::config::CircuitBreakerConfig;
use super::error::CallError;
use crate::telemetry::{BREAKER_REJECTED_TOTAL, BREAKER_STATE};

/// Breaker state as observed by callers and health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }

    /// Value exported through the state gauge.
    #[must_use]
    pub fn gauge_value(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    /// Outcomes currently buffered in the sliding window.
    pub buffered_calls: usize,
    /// Failures among the buffered outcomes.
    pub failed_calls: usize,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    generation: u64,
    /// `true` marks a failure.
    window: VecDeque<bool>,
    opened_at_ms: u64,
    half_open_issued: usize,
    half_open_successes: usize,
}

impl Inner {
    fn failures(&self) -> usize {
        self.window.iter().filter(|failed| **failed).count()
    }
}

/// Circuit breaker for one logical dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn ClockSource>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("inner", &*self.inner.lock())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        let name = name.into();
        metrics::gauge!(BREAKER_STATE, "dependency" => name.clone())
            .set(CircuitState::Closed.gauge_value());
        Self {
            name,
            config,
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 0,
                window: VecDeque::new(),
                opened_at_ms: 0,
                half_open_issued: 0,
                half_open_successes: 0,
            }),
        }
    }

    /// Dependency name this breaker guards.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, applying a due OPEN -> HALF_OPEN transition first.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);
        inner.state
    }

    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            buffered_calls: inner.window.len(),
            failed_calls: inner.failures(),
        }
    }

    /// Asks for permission to make one call.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::CircuitOpen`] while the breaker is open, or while
    /// half-open once every probe slot has been handed out.
    pub fn try_acquire(self: &Arc<Self>) -> Result<Permit, CallError> {
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);

        let permitted = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.half_open_issued < self.config.permitted_calls_in_half_open_state {
                    inner.half_open_issued += 1;
                    true
                } else {
                    false
                }
            }
        };

        if !permitted {
            drop(inner);
            metrics::counter!(BREAKER_REJECTED_TOTAL, "dependency" => self.name.clone())
                .increment(1);
            debug!(dependency = %self.name, "call rejected by circuit breaker");
            return Err(CallError::CircuitOpen(self.name.clone()));
        }

        Ok(Permit {
            breaker: Arc::clone(self),
            generation: inner.generation,
            recorded: false,
        })
    }

    fn maybe_half_open(&self, inner: &mut Inner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let wait_ms =
            u64::try_from(self.config.wait_duration_in_open_state.as_millis()).unwrap_or(u64::MAX);
        if self.clock.now().saturating_sub(inner.opened_at_ms) >= wait_ms {
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn on_outcome(&self, generation: u64, success: bool) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.window.push_back(!success);
                while inner.window.len() > self.config.sliding_window_size {
                    inner.window.pop_front();
                }
                let samples = inner.window.len();
                if samples >= self.config.minimum_number_of_calls.max(1)
                    && inner.failures() * 100
                        >= usize::from(self.config.failure_rate_threshold) * samples
                {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                if success {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.config.permitted_calls_in_half_open_state {
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                } else {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        let failures = inner.failures();
        let samples = inner.window.len();

        inner.state = to;
        inner.generation += 1;
        inner.window.clear();
        inner.half_open_issued = 0;
        inner.half_open_successes = 0;
        if to == CircuitState::Open {
            inner.opened_at_ms = self.clock.now();
        }

        match to {
            CircuitState::Open => warn!(
                dependency = %self.name,
                from = from.as_str(),
                failures,
                samples,
                "circuit breaker opened"
            ),
            CircuitState::HalfOpen | CircuitState::Closed => info!(
                dependency = %self.name,
                from = from.as_str(),
                to = to.as_str(),
                "circuit breaker transition"
            ),
        }
        metrics::gauge!(BREAKER_STATE, "dependency" => self.name.clone()).set(to.gauge_value());
    }
}

/// Permission to make one guarded call.
///
/// Consumed by [`Permit::record`]; dropping it unrecorded records a failure.
#[derive(Debug)]
pub struct Permit {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    recorded: bool,
}

impl Permit {
    /// Reports the call outcome.
    pub fn record(mut self, success: bool) {
        self.recorded = true;
        self.breaker.on_outcome(self.generation, success);
    }

    pub fn record_success(self) {
        self.record(true);
    }

    pub fn record_failure(self) {
        self.record(false);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.recorded {
            self.breaker.on_outcome(self.generation, false);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use orgmesh_core::clock::ManualClock;
    use proptest::prelude::*;

    use super::*;

    fn breaker(clock: &ManualClock) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "department-service",
            CircuitBreakerConfig::default(),
            Arc::new(clock.clone()),
        ))
    }

    fn fail(breaker: &Arc<CircuitBreaker>, n: usize) {
        for _ in 0..n {
            breaker.try_acquire().unwrap().record_failure();
        }
    }

    fn succeed(breaker: &Arc<CircuitBreaker>, n: usize) {
        for _ in 0..n {
            breaker.try_acquire().unwrap().record_success();
        }
    }

    #[test]
    fn stays_closed_below_minimum_calls() {
        let clock = ManualClock::new(0);
        let cb = breaker(&clock);
        fail(&cb, 4);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn opens_at_threshold_after_minimum_calls() {
        let clock = ManualClock::new(0);
        let cb = breaker(&clock);
        succeed(&cb, 3);
        fail(&cb, 2);
        assert_eq!(cb.state(), CircuitState::Closed, "2/5 failures is below 50%");
        fail(&cb, 1);
        assert_eq!(cb.state(), CircuitState::Open, "3/6 failures reaches 50%");
    }

    #[test]
    fn open_rejects_until_wait_elapses() {
        let clock = ManualClock::new(0);
        let cb = breaker(&clock);
        fail(&cb, 5);
        assert!(matches!(cb.try_acquire(), Err(CallError::CircuitOpen(_))));

        clock.advance(4_999);
        assert!(cb.try_acquire().is_err());

        clock.advance(1);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn half_open_limits_probes() {
        let clock = ManualClock::new(0);
        let cb = breaker(&clock);
        fail(&cb, 5);
        clock.advance(5_000);

        let probes: Vec<Permit> = (0..3).map(|_| cb.try_acquire().unwrap()).collect();
        assert!(cb.try_acquire().is_err(), "fourth probe must be rejected");
        for probe in probes {
            probe.record_success();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().buffered_calls, 0);
    }

    #[test]
    fn half_open_failure_reopens() {
        let clock = ManualClock::new(0);
        let cb = breaker(&clock);
        fail(&cb, 5);
        clock.advance(5_000);

        succeed(&cb, 1);
        fail(&cb, 1);
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(5_000);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn dropped_permit_counts_as_failure() {
        let clock = ManualClock::new(0);
        let cb = breaker(&clock);
        for _ in 0..5 {
            drop(cb.try_acquire().unwrap());
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn stale_permits_are_ignored() {
        let clock = ManualClock::new(0);
        let cb = breaker(&clock);
        let slow = cb.try_acquire().unwrap();
        fail(&cb, 5);
        clock.advance(5_000);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // Issued while CLOSED; must not reopen the breaker.
        slow.record_failure();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn window_slides() {
        let clock = ManualClock::new(0);
        let cb = Arc::new(CircuitBreaker::new(
            "x",
            CircuitBreakerConfig {
                sliding_window_size: 4,
                minimum_number_of_calls: 4,
                failure_rate_threshold: 75,
                wait_duration_in_open_state: Duration::from_secs(1),
                permitted_calls_in_half_open_state: 1,
            },
            Arc::new(clock.clone()),
        ));
        fail(&cb, 2);
        succeed(&cb, 4);
        let snap = cb.snapshot();
        assert_eq!(snap.buffered_calls, 4);
        assert_eq!(snap.failed_calls, 0);
        fail(&cb, 3);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    fn wide_window(minimum_number_of_calls: usize) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            sliding_window_size: 1_000,
            minimum_number_of_calls,
            ..CircuitBreakerConfig::default()
        }
    }

    #[test]
    fn concurrent_outcomes_are_all_buffered() {
        let clock = ManualClock::new(0);
        let cb = Arc::new(CircuitBreaker::new("x", wide_window(1_000), Arc::new(clock)));
        let start = std::sync::Barrier::new(8);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    start.wait();
                    for n in 0..100 {
                        cb.try_acquire().unwrap().record(n % 4 != 0);
                    }
                });
            }
        });

        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.buffered_calls, 800);
        assert_eq!(snap.failed_calls, 200);
        assert_eq!(cb.inner.lock().generation, 0);
    }

    #[test]
    fn concurrent_failures_open_exactly_once() {
        let clock = ManualClock::new(0);
        let cb = Arc::new(CircuitBreaker::new("x", wide_window(10), Arc::new(clock)));
        let start = std::sync::Barrier::new(8);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    start.wait();
                    // Hold a few permits at once so some outcomes land after the trip.
                    for _ in 0..25 {
                        let held: Vec<Permit> =
                            (0..2).filter_map(|_| cb.try_acquire().ok()).collect();
                        for permit in held {
                            permit.record_failure();
                        }
                    }
                });
            }
        });

        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.inner.lock().generation, 1);
        assert_eq!(cb.snapshot().buffered_calls, 0);
    }

    proptest! {
        #[test]
        fn closed_state_matches_window_model(outcomes in proptest::collection::vec(any::<bool>(), 0..60)) {
            let clock = ManualClock::new(0);
            let cb = breaker(&clock);
            let mut model: VecDeque<bool> = VecDeque::new();
            for success in outcomes {
                cb.try_acquire().unwrap().record(success);
                model.push_back(!success);
                if model.len() > 10 {
                    model.pop_front();
                }
                let failures = model.iter().filter(|f| **f).count();
                let should_open = model.len() >= 5 && failures * 100 >= 50 * model.len();
                if should_open {
                    prop_assert_eq!(cb.state(), CircuitState::Open);
                    break;
                }
                prop_assert_eq!(cb.state(), CircuitState::Closed);
                prop_assert_eq!(cb.snapshot().failed_calls, failures);
            }
        }
    }
}
