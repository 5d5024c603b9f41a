//! In-process event bus built on `tokio::sync::broadcast`.
//!
//! Used when both services run in one process and by tests. Sending with no
//! live subscriber is not an error; the event is simply dropped.

use std::sync::Arc;

use async_trait::async_trait;
use orgmesh_core::Topic;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::subscriber::EventSubscriber;
use super::ChannelError;
use crate::traits::EventChannel;

type Envelope = (Topic, Arc<[u8]>);

/// Broadcast bus carrying serialized events tagged with their topic.
#[derive(Clone)]
pub struct InMemoryEventBus {
    tx: broadcast::Sender<Envelope>,
}

impl InMemoryEventBus {
    /// Creates a bus whose subscribers may lag by at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Spawns a task feeding every event on the bus to `subscriber`, in order.
    ///
    /// The task ends when every sender clone has been dropped.
    pub fn spawn_pump(&self, subscriber: Arc<EventSubscriber>) -> JoinHandle<()> {
        let mut rx = self.tx.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok((topic, payload)) => {
                        if !subscriber.is_subscribed(topic) {
                            continue;
                        }
                        if let Err(err) = subscriber.dispatch(topic, &payload).await {
                            warn!(%topic, error = %err, "dropping undecodable event");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event pump lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("event pump stopped");
        })
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventChannel for InMemoryEventBus {
    async fn send(&self, topic: Topic, payload: Vec<u8>) -> Result<(), ChannelError> {
        // No receivers is not a failure for fire-and-forget delivery.
        let _ = self.tx.send((topic, payload.into()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use orgmesh_core::{Employee, EmployeeEvent, LifecycleAction, NewEmployee};

    use super::*;
    use crate::events::{EventPublisher, HeadcountProjection};

    #[tokio::test]
    async fn pump_feeds_subscriber_in_order() {
        let bus = InMemoryEventBus::default();
        let projection = Arc::new(HeadcountProjection::new());
        let subscriber = Arc::new(
            EventSubscriber::new()
                .register(Topic::EmployeeCreated, projection.clone())
                .register(Topic::EmployeeDeleted, projection.clone()),
        );
        let pump = bus.spawn_pump(subscriber);

        let publisher = EventPublisher::new(Arc::new(bus.clone()));
        let employee = Employee::from_new(
            1,
            NewEmployee {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                department_id: Some(3),
            },
            Utc::now(),
        );
        publisher
            .publish(EmployeeEvent::new(LifecycleAction::Created, &employee, Utc::now()))
            .await;
        // Unsubscribed topic, skipped by the pump.
        publisher
            .publish(EmployeeEvent::new(LifecycleAction::Updated, &employee, Utc::now()))
            .await;

        tokio::time::timeout(Duration::from_secs(1), async {
            while projection.headcount(3) != 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        publisher
            .publish(EmployeeEvent::new(LifecycleAction::Deleted, &employee, Utc::now()))
            .await;
        drop(publisher);
        drop(bus);
        pump.await.unwrap();
        assert_eq!(projection.headcount(3), 0);
    }

    #[tokio::test]
    async fn send_without_subscribers_succeeds() {
        let bus = InMemoryEventBus::new(4);
        assert!(bus.send(Topic::DepartmentCreated, b"{}".to_vec()).await.is_ok());
    }
}
