//! Topic-keyed registry of event handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use orgmesh_core::events::decode;
use orgmesh_core::{EventDecodeError, LifecycleEvent, Topic};
use tracing::{info, warn};

use crate::telemetry::EVENTS_RECEIVED_TOTAL;
use crate::traits::EventHandler;

/// Routes delivered payloads to every handler registered for their topic.
#[derive(Default)]
pub struct EventSubscriber {
    handlers: HashMap<Topic, Vec<Arc<dyn EventHandler>>>,
}

impl EventSubscriber {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` to the slot for `topic`.
    #[must_use]
    pub fn register(mut self, topic: Topic, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.entry(topic).or_default().push(handler);
        self
    }

    /// Adds `handler` to each of `topics`.
    #[must_use]
    pub fn register_all(
        mut self,
        topics: impl IntoIterator<Item = Topic>,
        handler: &Arc<dyn EventHandler>,
    ) -> Self {
        for topic in topics {
            self = self.register(topic, Arc::clone(handler));
        }
        self
    }

    #[must_use]
    pub fn is_subscribed(&self, topic: Topic) -> bool {
        self.handlers.contains_key(&topic)
    }

    /// Decodes `payload` and runs every handler for `topic`.
    ///
    /// Returns the number of handlers invoked; a topic nobody subscribed to
    /// yields zero without decoding.
    ///
    /// # Errors
    ///
    /// Returns [`EventDecodeError`] when the payload is not a valid event for
    /// `topic`. Handler failures are logged and do not surface here.
    pub async fn dispatch(&self, topic: Topic, payload: &[u8]) -> Result<usize, EventDecodeError> {
        let Some(handlers) = self.handlers.get(&topic) else {
            return Ok(0);
        };
        let event = decode(topic, payload)?;
        metrics::counter!(EVENTS_RECEIVED_TOTAL, "topic" => topic.name()).increment(1);

        for handler in handlers {
            if let Err(err) = handler.handle(&event).await {
                warn!(
                    %topic,
                    handler = handler.name(),
                    entity_id = event.entity_id(),
                    error = %err,
                    "event handler failed"
                );
            }
        }
        Ok(handlers.len())
    }
}

/// Acknowledges every event with a log line.
#[derive(Debug, Default)]
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        info!(
            event_type = %event.event_type(),
            entity_id = event.entity_id(),
            occurred_at = %event.occurred_at(),
            "received lifecycle event"
        );
        Ok(())
    }
}
