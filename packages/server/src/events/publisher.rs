//! Fire-and-forget publication of lifecycle events.

use std::sync::Arc;

use orgmesh_core::LifecycleEvent;
use tracing::{debug, error};

use crate::telemetry::{EVENTS_FAILED_TOTAL, EVENTS_PUBLISHED_TOTAL};
use crate::traits::EventChannel;

/// Serializes lifecycle events and hands them to a channel.
///
/// Publication never fails from the caller's point of view: the mutation
/// that produced the event has already committed, so serialization and
/// transport errors are logged and counted, then dropped.
#[derive(Clone)]
pub struct EventPublisher {
    channel: Arc<dyn EventChannel>,
}

impl EventPublisher {
    #[must_use]
    pub fn new(channel: Arc<dyn EventChannel>) -> Self {
        Self { channel }
    }

    /// Publishes `event` on the topic derived from its entity and action.
    pub async fn publish(&self, event: impl Into<LifecycleEvent>) {
        let event = event.into();
        let topic = event.topic();

        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(err) => {
                error!(%topic, entity_id = event.entity_id(), error = %err, "failed to serialize event");
                metrics::counter!(EVENTS_FAILED_TOTAL, "topic" => topic.name()).increment(1);
                return;
            }
        };

        match self.channel.send(topic, payload).await {
            Ok(()) => {
                debug!(%topic, entity_id = event.entity_id(), "event published");
                metrics::counter!(EVENTS_PUBLISHED_TOTAL, "topic" => topic.name()).increment(1);
            }
            Err(err) => {
                error!(%topic, entity_id = event.entity_id(), error = %err, "failed to publish event");
                metrics::counter!(EVENTS_FAILED_TOTAL, "topic" => topic.name()).increment(1);
            }
        }
    }
}
