//! Stand-in values returned when a lookup cannot be answered.
//!
//! Each constructor is pure and infallible; the triggering error is accepted
//! so call sites can pass these straight to
//! [`ResilienceGateway::call_or_fallback`](super::ResilienceGateway::call_or_fallback).

use orgmesh_core::{DepartmentSnapshot, Roster};

use super::error::CallError;

/// Placeholder for `GET /departments/{id}`.
#[must_use]
pub fn department_by_id(id: i64, _cause: &CallError) -> DepartmentSnapshot {
    DepartmentSnapshot::unavailable_by_id(id)
}

/// Empty roster for `GET /employees?departmentId=…`.
#[must_use]
pub fn employees_by_department(_department_id: i64, _cause: &CallError) -> Roster {
    Roster::default()
}
