use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgmesh_core::{
    Department, DepartmentSnapshot, Employee, LifecycleEvent, NewDepartment, Roster,
    NewEmployee, Topic,
};

use crate::events::ChannelError;
use crate::resilience::CallError;
use crate::storage::StorageError;

/// Department persistence owned by the department service.
/// Implementations: in-memory (`DashMap`).
#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    /// Assigns an id and stores a new department, claiming its code.
    async fn insert(&self, new: NewDepartment, now: DateTime<Utc>)
        -> Result<Department, StorageError>;

    /// Overwrites an existing department, moving its code claim if the code changed.
    async fn replace(&self, department: Department) -> Result<Department, StorageError>;

    async fn get(&self, id: i64) -> Option<Department>;

    async fn find_by_code(&self, code: &str) -> Option<Department>;

    /// Whether `code` is held by a department other than `excluding`.
    async fn code_taken(&self, code: &str, excluding: Option<i64>) -> bool;

    /// Snapshot of every stored department.
    async fn all(&self) -> Vec<Department>;

    async fn remove(&self, id: i64) -> Result<Department, StorageError>;

    async fn count(&self) -> u64;
}

/// Employee persistence owned by the employee service.
#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    /// Assigns an id and stores a new employee, claiming its email.
    async fn insert(&self, new: NewEmployee, now: DateTime<Utc>) -> Result<Employee, StorageError>;

    /// Overwrites an existing employee, moving its email claim if the email changed.
    async fn replace(&self, employee: Employee) -> Result<Employee, StorageError>;

    async fn get(&self, id: i64) -> Option<Employee>;

    /// Whether `email` is held by an employee other than `excluding`.
    async fn email_taken(&self, email: &str, excluding: Option<i64>) -> bool;

    /// Snapshot of every stored employee.
    async fn all(&self) -> Vec<Employee>;

    async fn remove(&self, id: i64) -> Result<Employee, StorageError>;

    async fn count(&self) -> u64;
}

/// Single-attempt department lookups against the department service.
/// Resilience is layered on top by a gateway.
#[async_trait]
pub trait DepartmentLookup: Send + Sync {
    async fn by_id(&self, id: i64) -> Result<DepartmentSnapshot, CallError>;

    async fn by_code(&self, code: &str) -> Result<DepartmentSnapshot, CallError>;
}

/// Single-attempt roster lookup against the employee service.
#[async_trait]
pub trait EmployeeLookup: Send + Sync {
    async fn by_department(&self, department_id: i64) -> Result<Roster, CallError>;
}

/// Outbound transport for serialized lifecycle events.
#[async_trait]
pub trait EventChannel: Send + Sync {
    async fn send(&self, topic: Topic, payload: Vec<u8>) -> Result<(), ChannelError>;
}

/// Local reaction to a lifecycle event received from the counterpart service.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &LifecycleEvent) -> anyhow::Result<()>;
}
