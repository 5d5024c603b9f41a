//! Health, liveness, and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::NodeState;
use crate::network::HealthState;

/// Detailed health as JSON.
///
/// Always 200; `state` and the peer breaker state tell monitoring what is
/// actually going on.
pub async fn health_handler(State(node): State<NodeState>) -> Json<serde_json::Value> {
    let breaker = node.peer.breaker().snapshot();
    Json(json!({
        "service": node.service_name,
        "state": node.shutdown.health_state().as_str(),
        "inFlight": node.shutdown.in_flight_count(),
        "uptimeSecs": node.start_time.elapsed().as_secs(),
        "dependencies": {
            node.peer.dependency(): {
                "circuitBreaker": breaker.state.as_str(),
                "bufferedCalls": breaker.buffered_calls,
                "failedCalls": breaker.failed_calls,
            }
        },
    }))
}

/// Liveness probe: 200 while the process answers at all.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only in the `Ready` state.
///
/// An open breaker towards the peer does not make this instance unready;
/// every cross-service read has a fallback.
pub async fn readiness_handler(State(node): State<NodeState>) -> StatusCode {
    if node.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
