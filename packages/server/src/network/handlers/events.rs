//! `POST /internal/events/{topic}`: lifecycle events pushed by the peer.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use orgmesh_core::Topic;
use tracing::debug;

use super::NodeState;
use crate::error::{ApiError, ApiPath, ApiResult};

/// Hands the payload to the local subscriber.
///
/// 202 once dispatched, 404 for a topic this service does not subscribe to
/// (or does not know), 400 when the payload does not decode as that topic.
pub async fn ingest_handler(
    State(node): State<NodeState>,
    ApiPath(topic): ApiPath<String>,
    payload: Bytes,
) -> ApiResult<StatusCode> {
    let topic: Topic = topic
        .parse()
        .map_err(|_| ApiError::not_found(format!("Unknown event topic: {topic}")))?;
    if !node.subscriber.is_subscribed(topic) {
        return Err(ApiError::not_found(format!(
            "{} does not subscribe to {topic}",
            node.service_name
        )));
    }
    let handlers = node
        .subscriber
        .dispatch(topic, &payload)
        .await
        .map_err(|err| ApiError::invalid(format!("Malformed {topic} event: {err}")))?;
    debug!(%topic, handlers, "event ingested");
    Ok(StatusCode::ACCEPTED)
}
