//! Failure taxonomy for a single outbound call.

/// Why an outbound call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The attempt (or the whole call) ran past its deadline.
    #[error("timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The counterpart could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The counterpart answered that the entity does not exist.
    #[error("not found")]
    NotFound,

    /// The counterpart answered with an unexpected HTTP status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The counterpart answered with a body that could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(String),

    /// The breaker for the dependency did not permit the call.
    #[error("circuit breaker '{0}' does not permit calls")]
    CircuitOpen(String),
}

impl CallError {
    /// Timeouts and connection failures are worth another attempt; well-formed
    /// answers are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection(_))
    }

    /// Outcome recorded by the circuit breaker. A not-found answer proves the
    /// dependency is healthy.
    #[must_use]
    pub fn counts_as_success(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub(crate) fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_and_connection_errors_are_transient() {
        assert!(CallError::Timeout { timeout_ms: 1 }.is_transient());
        assert!(CallError::Connection("refused".into()).is_transient());
        assert!(!CallError::NotFound.is_transient());
        assert!(!CallError::Status(500).is_transient());
        assert!(!CallError::Decode("eof".into()).is_transient());
        assert!(!CallError::CircuitOpen("x".into()).is_transient());
    }

    #[test]
    fn not_found_is_a_breaker_success() {
        assert!(CallError::NotFound.counts_as_success());
        assert!(!CallError::Status(503).counts_as_success());
    }
}
