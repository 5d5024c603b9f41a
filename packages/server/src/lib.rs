//! `OrgMesh` Server: the department and employee services.
//!
//! Each service owns one in-memory store, looks up the other through a
//! [`ResilienceGateway`](resilience::ResilienceGateway), and exchanges
//! lifecycle events with it on a best-effort channel.

pub mod app;
pub mod cli;
pub mod client;
pub mod error;
pub mod events;
pub mod network;
pub mod resilience;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod trace_id;
pub mod traits;

pub use app::{department_service, employee_service, EventTransport, Role, ServiceHandle};
pub use error::{ApiError, ApiResult};
pub use traits::{
    DepartmentLookup, DepartmentRepository, EmployeeLookup, EmployeeRepository, EventChannel,
    EventHandler,
};
