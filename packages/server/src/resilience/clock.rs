//! Monotonic clock backed by the tokio timer.

use orgmesh_core::clock::{ClockSource, SystemClock};
use tokio::time::Instant;

/// Wall-clock anchored, tokio-driven clock.
///
/// Reads advance with `tokio::time`, so a runtime with paused time (tests)
/// moves breaker deadlines together with retry sleeps.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: Instant,
    origin_ms: u64,
}

impl TokioClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_ms: SystemClock.now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for TokioClock {
    fn now(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.origin_ms.saturating_add(elapsed)
    }
}
