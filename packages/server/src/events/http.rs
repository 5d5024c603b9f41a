//! Webhook-style event channel for services running in separate processes.
//!
//! Events are queued on a single [`BackgroundWorker`] and POSTed in order to
//! `/internal/events/{topic}` on every configured peer. Delivery is
//! best-effort: a failed POST is logged and counted, never retried, and an
//! event that finds the queue full is rejected at once so a slow peer never
//! holds up the mutation that produced it.

use std::time::Duration;

use async_trait::async_trait;
use orgmesh_core::Topic;
use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, warn};

use super::worker::{BackgroundRunnable, BackgroundWorker, DEFAULT_CAPACITY};
use super::ChannelError;
use crate::client::endpoint;
use crate::telemetry::EVENTS_FAILED_TOTAL;
use crate::traits::EventChannel;

/// One queued delivery.
#[derive(Debug)]
pub struct Outgoing {
    pub topic: Topic,
    pub payload: Vec<u8>,
}

/// Posts each queued event to every peer in turn.
pub struct WebhookDelivery {
    client: reqwest::Client,
    peers: Vec<Url>,
    timeout: Duration,
}

impl WebhookDelivery {
    async fn deliver(&self, peer: &Url, event: &Outgoing) -> Result<(), ChannelError> {
        let url = endpoint(peer, &["internal", "events", event.topic.name()])
            .map_err(|e| ChannelError::Delivery(e.to_string()))?;
        let response = self
            .client
            .post(url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(event.payload.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ChannelError::Delivery(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::Delivery(format!("peer answered {}", response.status())))
        }
    }
}

#[async_trait]
impl BackgroundRunnable for WebhookDelivery {
    type Task = Outgoing;

    async fn run(&mut self, event: Outgoing) {
        for peer in &self.peers {
            match self.deliver(peer, &event).await {
                Ok(()) => debug!(topic = %event.topic, %peer, "event delivered"),
                Err(err) => {
                    warn!(topic = %event.topic, %peer, error = %err, "event delivery failed");
                    metrics::counter!(EVENTS_FAILED_TOTAL, "topic" => event.topic.name())
                        .increment(1);
                }
            }
        }
    }
}

/// [`EventChannel`] that forwards events to peer services over HTTP.
pub struct HttpEventChannel {
    /// `None` once closed.
    worker: Mutex<Option<BackgroundWorker<WebhookDelivery>>>,
}

impl HttpEventChannel {
    /// Starts the delivery worker. Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(client: reqwest::Client, peers: Vec<Url>, timeout: Duration) -> Self {
        Self::with_capacity(client, peers, timeout, DEFAULT_CAPACITY)
    }

    /// Like [`start`](Self::start) with a queue of `capacity` events.
    #[must_use]
    pub fn with_capacity(
        client: reqwest::Client,
        peers: Vec<Url>,
        timeout: Duration,
        capacity: usize,
    ) -> Self {
        let delivery = WebhookDelivery {
            client,
            peers,
            timeout,
        };
        Self {
            worker: Mutex::new(Some(BackgroundWorker::start(delivery, capacity))),
        }
    }

    /// Stops accepting events and delivers everything already queued.
    pub async fn close(&self) {
        let worker = self.worker.lock().take();
        if let Some(mut worker) = worker {
            worker.stop().await;
        }
    }
}

#[async_trait]
impl EventChannel for HttpEventChannel {
    async fn send(&self, topic: Topic, payload: Vec<u8>) -> Result<(), ChannelError> {
        match &*self.worker.lock() {
            Some(worker) => worker.try_submit(Outgoing { topic, payload }),
            None => Err(ChannelError::Closed),
        }
    }
}
