//! Asynchronous propagation of lifecycle events between the two services.
//!
//! A service publishes its own entity's events through an [`EventPublisher`]
//! onto an [`EventChannel`](crate::traits::EventChannel) and receives the
//! counterpart's events through an [`EventSubscriber`]. Two channels exist:
//! [`InMemoryEventBus`] for a single process and [`HttpEventChannel`] for
//! services running apart, which POSTs to `/internal/events/{topic}`.

pub mod bus;
pub mod headcount;
pub mod http;
pub mod publisher;
pub mod subscriber;
pub mod worker;

pub use bus::InMemoryEventBus;
pub use headcount::HeadcountProjection;
pub use http::HttpEventChannel;
pub use publisher::EventPublisher;
pub use subscriber::{EventSubscriber, LoggingHandler};

/// Transport-level failure while handing an event to a channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("event channel is closed")]
    Closed,

    #[error("event queue is full")]
    Full,

    #[error("event delivery failed: {0}")]
    Delivery(String),
}
