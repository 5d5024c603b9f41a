//! Resilience gateway for outbound calls to the counterpart service.
//!
//! Every lookup that crosses the service boundary goes through a
//! [`ResilienceGateway`], which layers three mechanisms around a single
//! async operation:
//!
//! - a per-attempt hard timeout,
//! - a fixed-delay [`RetryPolicy`] that only retries transient failures,
//! - a [`CircuitBreaker`] that short-circuits calls to a dependency that is
//!   known to be failing.
//!
//! Callers that can degrade use [`ResilienceGateway::call_or_fallback`] with
//! one of the pure constructors in [`fallback`].

pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod retry;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState, Permit};
pub use clock::TokioClock;
pub use config::{CircuitBreakerConfig, ResilienceConfig, RetryConfig};
pub use error::CallError;
pub use gateway::ResilienceGateway;
pub use retry::RetryPolicy;
