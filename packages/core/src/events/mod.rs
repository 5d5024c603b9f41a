//! Lifecycle events exchanged between the department and employee services.
//!
//! Every successful create/update/delete produces exactly one immutable event
//! carrying a snapshot of the entity, an `eventType` discriminator and the
//! instant of the mutation. Events travel as camelCase JSON on the topic
//! derived from their entity and action.

mod topic;

pub use topic::{EntityKind, EventType, LifecycleAction, Topic, UnknownTopic};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::department::Department;
use crate::employee::Employee;

/// Department lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentEvent {
    pub event_type: EventType,
    pub department_id: i64,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl DepartmentEvent {
    /// Snapshot of `department` for the given action.
    #[must_use]
    pub fn new(action: LifecycleAction, department: &Department, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_type: Topic::of(EntityKind::Department, action).event_type(),
            department_id: department.id,
            code: department.code.clone(),
            name: department.name.clone(),
            description: department.description.clone(),
            occurred_at,
        }
    }
}

/// Employee lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeEvent {
    pub event_type: EventType,
    pub employee_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub department_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

impl EmployeeEvent {
    /// Snapshot of `employee` for the given action.
    #[must_use]
    pub fn new(action: LifecycleAction, employee: &Employee, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_type: Topic::of(EntityKind::Employee, action).event_type(),
            employee_id: employee.id,
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            email: employee.email.clone(),
            department_id: employee.department_id,
            occurred_at,
        }
    }
}

/// Any lifecycle event. Serializes as the inner event body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LifecycleEvent {
    Department(DepartmentEvent),
    Employee(EmployeeEvent),
}

impl LifecycleEvent {
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Department(e) => e.event_type,
            Self::Employee(e) => e.event_type,
        }
    }

    /// Topic this event is published on.
    #[must_use]
    pub fn topic(&self) -> Topic {
        self.event_type().topic()
    }

    /// Id of the entity the event describes.
    #[must_use]
    pub fn entity_id(&self) -> i64 {
        match self {
            Self::Department(e) => e.department_id,
            Self::Employee(e) => e.employee_id,
        }
    }

    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Department(e) => e.occurred_at,
            Self::Employee(e) => e.occurred_at,
        }
    }
}

impl From<DepartmentEvent> for LifecycleEvent {
    fn from(event: DepartmentEvent) -> Self {
        Self::Department(event)
    }
}

impl From<EmployeeEvent> for LifecycleEvent {
    fn from(event: EmployeeEvent) -> Self {
        Self::Employee(event)
    }
}

/// Failure to turn a delivered payload back into an event.
#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("malformed event body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event type {found} does not belong on topic {topic}")]
    TopicMismatch { topic: Topic, found: EventType },
}

/// Decodes a payload delivered on `topic`, checking its discriminator.
///
/// # Errors
///
/// Returns [`EventDecodeError::Json`] for a body that is not a valid event of
/// the topic's entity kind, and [`EventDecodeError::TopicMismatch`] when the
/// body's `eventType` names a different topic.
pub fn decode(topic: Topic, payload: &[u8]) -> Result<LifecycleEvent, EventDecodeError> {
    let event: LifecycleEvent = match topic.entity() {
        EntityKind::Department => serde_json::from_slice::<DepartmentEvent>(payload)?.into(),
        EntityKind::Employee => serde_json::from_slice::<EmployeeEvent>(payload)?.into(),
    };
    if event.topic() != topic {
        return Err(EventDecodeError::TopicMismatch {
            topic,
            found: event.event_type(),
        });
    }
    Ok(event)
}
