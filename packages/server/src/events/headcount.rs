//! Per-department employee counts maintained from employee events.

use async_trait::async_trait;
use dashmap::DashMap;
use orgmesh_core::{EmployeeEvent, LifecycleAction, LifecycleEvent};
use tracing::debug;

use crate::traits::EventHandler;

/// Local read model of how many employees each department has.
///
/// Built only from `EMPLOYEE_*` events, so it lags the employee service and
/// starts empty after a restart.
#[derive(Debug, Default)]
pub struct HeadcountProjection {
    counts: DashMap<i64, u64>,
    /// Last known department of each employee, used to follow moves and deletes.
    members: DashMap<i64, Option<i64>>,
}

impl HeadcountProjection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for a department; zero when it has never been seen.
    #[must_use]
    pub fn headcount(&self, department_id: i64) -> u64 {
        self.counts.get(&department_id).map_or(0, |count| *count)
    }

    fn apply(&self, event: &EmployeeEvent) {
        let (previous, current) = match event.event_type.topic().action() {
            LifecycleAction::Created | LifecycleAction::Updated => {
                let previous = self.members.insert(event.employee_id, event.department_id);
                (previous.flatten(), event.department_id)
            }
            LifecycleAction::Deleted => {
                let previous = self.members.remove(&event.employee_id);
                (previous.and_then(|(_, department)| department), None)
            }
        };
        if previous == current {
            return;
        }
        if let Some(old) = previous {
            if let Some(mut count) = self.counts.get_mut(&old) {
                *count = count.saturating_sub(1);
            }
        }
        if let Some(new) = current {
            *self.counts.entry(new).or_default() += 1;
        }
        debug!(employee_id = event.employee_id, ?previous, ?current, "headcount adjusted");
    }
}

#[async_trait]
impl EventHandler for HeadcountProjection {
    fn name(&self) -> &'static str {
        "headcount"
    }

    async fn handle(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        if let LifecycleEvent::Employee(event) = event {
            self.apply(event);
        }
        Ok(())
    }
}
