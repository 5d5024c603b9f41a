//! Lifecycle topics and event discriminators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which service owns the entity an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Department,
    Employee,
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleAction {
    Created,
    Updated,
    Deleted,
}

/// Discriminator carried inside every event body as `eventType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    DepartmentCreated,
    DepartmentUpdated,
    DepartmentDeleted,
    EmployeeCreated,
    EmployeeUpdated,
    EmployeeDeleted,
}

impl EventType {
    /// Topic this discriminator is published on.
    #[must_use]
    pub fn topic(self) -> Topic {
        match self {
            Self::DepartmentCreated => Topic::DepartmentCreated,
            Self::DepartmentUpdated => Topic::DepartmentUpdated,
            Self::DepartmentDeleted => Topic::DepartmentDeleted,
            Self::EmployeeCreated => Topic::EmployeeCreated,
            Self::EmployeeUpdated => Topic::EmployeeUpdated,
            Self::EmployeeDeleted => Topic::EmployeeDeleted,
        }
    }

    /// Wire spelling, e.g. `DEPARTMENT_CREATED`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DepartmentCreated => "DEPARTMENT_CREATED",
            Self::DepartmentUpdated => "DEPARTMENT_UPDATED",
            Self::DepartmentDeleted => "DEPARTMENT_DELETED",
            Self::EmployeeCreated => "EMPLOYEE_CREATED",
            Self::EmployeeUpdated => "EMPLOYEE_UPDATED",
            Self::EmployeeDeleted => "EMPLOYEE_DELETED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the six lifecycle channels (entity x action).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    DepartmentCreated,
    DepartmentUpdated,
    DepartmentDeleted,
    EmployeeCreated,
    EmployeeUpdated,
    EmployeeDeleted,
}

impl Topic {
    /// Every topic, department topics first.
    pub const ALL: [Topic; 6] = [
        Topic::DepartmentCreated,
        Topic::DepartmentUpdated,
        Topic::DepartmentDeleted,
        Topic::EmployeeCreated,
        Topic::EmployeeUpdated,
        Topic::EmployeeDeleted,
    ];

    /// Topics carrying department events.
    pub const DEPARTMENT: [Topic; 3] = [
        Topic::DepartmentCreated,
        Topic::DepartmentUpdated,
        Topic::DepartmentDeleted,
    ];

    /// Topics carrying employee events.
    pub const EMPLOYEE: [Topic; 3] = [
        Topic::EmployeeCreated,
        Topic::EmployeeUpdated,
        Topic::EmployeeDeleted,
    ];

    /// Topic for an (entity, action) pair.
    #[must_use]
    pub fn of(entity: EntityKind, action: LifecycleAction) -> Self {
        match (entity, action) {
            (EntityKind::Department, LifecycleAction::Created) => Self::DepartmentCreated,
            (EntityKind::Department, LifecycleAction::Updated) => Self::DepartmentUpdated,
            (EntityKind::Department, LifecycleAction::Deleted) => Self::DepartmentDeleted,
            (EntityKind::Employee, LifecycleAction::Created) => Self::EmployeeCreated,
            (EntityKind::Employee, LifecycleAction::Updated) => Self::EmployeeUpdated,
            (EntityKind::Employee, LifecycleAction::Deleted) => Self::EmployeeDeleted,
        }
    }

    /// Channel name, e.g. `departmentCreated`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DepartmentCreated => "departmentCreated",
            Self::DepartmentUpdated => "departmentUpdated",
            Self::DepartmentDeleted => "departmentDeleted",
            Self::EmployeeCreated => "employeeCreated",
            Self::EmployeeUpdated => "employeeUpdated",
            Self::EmployeeDeleted => "employeeDeleted",
        }
    }

    #[must_use]
    pub fn entity(self) -> EntityKind {
        match self {
            Self::DepartmentCreated | Self::DepartmentUpdated | Self::DepartmentDeleted => {
                EntityKind::Department
            }
            Self::EmployeeCreated | Self::EmployeeUpdated | Self::EmployeeDeleted => {
                EntityKind::Employee
            }
        }
    }

    #[must_use]
    pub fn action(self) -> LifecycleAction {
        match self {
            Self::DepartmentCreated | Self::EmployeeCreated => LifecycleAction::Created,
            Self::DepartmentUpdated | Self::EmployeeUpdated => LifecycleAction::Updated,
            Self::DepartmentDeleted | Self::EmployeeDeleted => LifecycleAction::Deleted,
        }
    }

    /// Discriminator expected inside bodies published on this topic.
    #[must_use]
    pub fn event_type(self) -> EventType {
        match self {
            Self::DepartmentCreated => EventType::DepartmentCreated,
            Self::DepartmentUpdated => EventType::DepartmentUpdated,
            Self::DepartmentDeleted => EventType::DepartmentDeleted,
            Self::EmployeeCreated => EventType::EmployeeCreated,
            Self::EmployeeUpdated => EventType::EmployeeUpdated,
            Self::EmployeeDeleted => EventType::EmployeeDeleted,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no known topic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.name() == s)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}
