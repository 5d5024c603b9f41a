//! Refuses to delete a department that still has employees.

use std::str::FromStr;
use std::sync::Arc;

use tracing::warn;

use crate::error::ApiError;
use crate::resilience::{CallError, ResilienceGateway};
use crate::traits::EmployeeLookup;

/// What to do when the employee service cannot be asked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteGuardPolicy {
    /// Allow the delete and warn that employees may be orphaned.
    #[default]
    FailOpen,
    /// Refuse the delete with `DependencyUnavailable`.
    FailClosed,
}

impl FromStr for DeleteGuardPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-open" | "open" => Ok(Self::FailOpen),
            "fail-closed" | "closed" => Ok(Self::FailClosed),
            other => Err(format!("unknown delete guard policy: {other}")),
        }
    }
}

/// Verdict of a successful roster check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Block { employee_count: u64 },
}

/// Roster check run before every department delete.
pub struct DeleteGuard {
    gateway: Arc<ResilienceGateway>,
    lookup: Arc<dyn EmployeeLookup>,
    policy: DeleteGuardPolicy,
}

impl DeleteGuard {
    #[must_use]
    pub fn new(
        gateway: Arc<ResilienceGateway>,
        lookup: Arc<dyn EmployeeLookup>,
        policy: DeleteGuardPolicy,
    ) -> Self {
        Self {
            gateway,
            lookup,
            policy,
        }
    }

    /// Asks the employee service whether anyone still belongs to the department.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`CallError`] when the roster cannot be fetched.
    pub async fn check(&self, department_id: i64) -> Result<GuardDecision, CallError> {
        let roster = self
            .gateway
            .call(|| self.lookup.by_department(department_id))
            .await?;
        Ok(match roster.total {
            0 => GuardDecision::Allow,
            employee_count => GuardDecision::Block { employee_count },
        })
    }

    /// Runs [`check`](Self::check) and applies the failure policy.
    ///
    /// # Errors
    ///
    /// [`ApiError::Conflict`] when employees remain, and
    /// [`ApiError::DependencyUnavailable`] when the lookup failed under
    /// [`DeleteGuardPolicy::FailClosed`].
    pub async fn evaluate(&self, department_id: i64) -> Result<(), ApiError> {
        match self.check(department_id).await {
            Ok(GuardDecision::Allow) => Ok(()),
            Ok(GuardDecision::Block { employee_count }) => Err(ApiError::conflict(format!(
                "Cannot delete department {department_id}: {employee_count} employee(s) are still assigned to it"
            ))),
            Err(err) => match self.policy {
                DeleteGuardPolicy::FailOpen => {
                    warn!(
                        department_id,
                        error = %err,
                        "employee lookup failed, deleting anyway; employees may be orphaned"
                    );
                    Ok(())
                }
                DeleteGuardPolicy::FailClosed => Err(ApiError::DependencyUnavailable(format!(
                    "Cannot verify that department {department_id} has no employees: {err}"
                ))),
            },
        }
    }
}
