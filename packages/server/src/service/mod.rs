//! Domain services behind the HTTP handlers.
//!
//! 1. **Departments** (`department`): CRUD, guarded delete, roster and headcount
//! 2. **Employees** (`employee`): CRUD with optional enrichment, search, stats, bulk create
//! 3. **Delete guard** (`delete_guard`): roster check before a department delete
//! 4. **Enrichment** (`enrichment`): department snapshots resolved through the gateway

pub mod config;
pub mod delete_guard;
pub mod department;
pub mod employee;
pub mod enrichment;

pub use config::ServiceConfig;
pub use delete_guard::{DeleteGuard, DeleteGuardPolicy, GuardDecision};
pub use department::{DepartmentService, DepartmentServiceParts};
pub use employee::{EmployeeService, EmployeeServiceParts};
pub use enrichment::EnrichmentResolver;

/// Publishes the current row count of a store as a gauge.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn record_total(name: &'static str, count: u64) {
    metrics::gauge!(name).set(count as f64);
}
