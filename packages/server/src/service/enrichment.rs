//! Attaches department data to employee responses.

use std::sync::Arc;

use futures_util::future::join_all;
use orgmesh_core::{DepartmentSnapshot, Employee, EmployeeView};

use crate::resilience::{fallback, CallError, ResilienceGateway};
use crate::traits::DepartmentLookup;

/// Resolves department snapshots through the department gateway.
///
/// By-id lookups never fail: any problem yields the "unavailable"
/// placeholder.
pub struct EnrichmentResolver {
    gateway: Arc<ResilienceGateway>,
    lookup: Arc<dyn DepartmentLookup>,
}

impl EnrichmentResolver {
    #[must_use]
    pub fn new(gateway: Arc<ResilienceGateway>, lookup: Arc<dyn DepartmentLookup>) -> Self {
        Self { gateway, lookup }
    }

    /// Employee view, with its department embedded when `enrich` is set and
    /// the employee references one.
    pub async fn resolve(&self, employee: Employee, enrich: bool) -> EmployeeView {
        let department = match employee.department_id {
            Some(id) if enrich => Some(self.department_by_id(id).await),
            _ => None,
        };
        employee.into_view_with(department)
    }

    /// Resolves a batch concurrently, preserving order.
    pub async fn resolve_many(&self, employees: Vec<Employee>, enrich: bool) -> Vec<EmployeeView> {
        if !enrich {
            return employees.into_iter().map(Employee::into_view).collect();
        }
        join_all(employees.into_iter().map(|e| self.resolve(e, true))).await
    }

    pub async fn department_by_id(&self, id: i64) -> DepartmentSnapshot {
        self.gateway
            .call_or_fallback(|| self.lookup.by_id(id), |err| fallback::department_by_id(id, err))
            .await
    }

    /// Resolves a business code without a placeholder; callers branch on
    /// the error instead.
    ///
    /// # Errors
    ///
    /// The gateway's [`CallError`] when the code is unknown or the department
    /// service cannot answer.
    pub async fn department_by_code(&self, code: &str) -> Result<DepartmentSnapshot, CallError> {
        self.gateway.call(|| self.lookup.by_code(code)).await
    }
}
