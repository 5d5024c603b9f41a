//! Department service: owns the department store and guards deletes.

use std::sync::Arc;

use orgmesh_core::clock::ClockSource;
use orgmesh_core::paging::build_page;
use orgmesh_core::{
    Department, DepartmentEmployees, DepartmentEvent, DepartmentFilter, DepartmentUpdate,
    Headcount, LifecycleAction, NewDepartment, PageDescriptor, PageRequest, SortSpec, Validate,
};
use tracing::info;

use super::delete_guard::DeleteGuard;
use super::record_total;
use crate::error::{ApiError, ApiResult};
use crate::events::{EventPublisher, HeadcountProjection};
use crate::resilience::{fallback, ResilienceGateway};
use crate::telemetry::{
    DEPARTMENTS_CREATED_TOTAL, DEPARTMENTS_DELETED_TOTAL, DEPARTMENTS_TOTAL,
    DEPARTMENTS_UPDATED_TOTAL,
};
use crate::traits::{DepartmentRepository, EmployeeLookup};

/// Collaborators of a [`DepartmentService`].
pub struct DepartmentServiceParts {
    pub repository: Arc<dyn DepartmentRepository>,
    pub publisher: EventPublisher,
    pub guard: DeleteGuard,
    /// Gateway to the employee service, shared with the guard.
    pub employees_gateway: Arc<ResilienceGateway>,
    pub employees: Arc<dyn EmployeeLookup>,
    pub headcount: Arc<HeadcountProjection>,
    pub clock: Arc<dyn ClockSource>,
}

pub struct DepartmentService {
    repository: Arc<dyn DepartmentRepository>,
    publisher: EventPublisher,
    guard: DeleteGuard,
    employees_gateway: Arc<ResilienceGateway>,
    employees: Arc<dyn EmployeeLookup>,
    headcount: Arc<HeadcountProjection>,
    clock: Arc<dyn ClockSource>,
}

impl DepartmentService {
    #[must_use]
    pub fn new(parts: DepartmentServiceParts) -> Self {
        Self {
            repository: parts.repository,
            publisher: parts.publisher,
            guard: parts.guard,
            employees_gateway: parts.employees_gateway,
            employees: parts.employees,
            headcount: parts.headcount,
            clock: parts.clock,
        }
    }

    /// Sort applied when the request names none or an unsupported field.
    #[must_use]
    pub fn default_sort() -> SortSpec {
        SortSpec::asc("name")
    }

    pub async fn list(
        &self,
        filter: &DepartmentFilter,
        request: PageRequest,
        sort: &SortSpec,
    ) -> PageDescriptor<Department> {
        let all = self.repository.all().await;
        build_page(all, filter, request, sort, &Self::default_sort())
    }

    /// # Errors
    ///
    /// [`ApiError::NotFound`] when no department has `id`.
    pub async fn get(&self, id: i64) -> ApiResult<Department> {
        self.repository
            .get(id)
            .await
            .ok_or_else(|| ApiError::not_found(format!("Department not found with id: {id}")))
    }

    /// # Errors
    ///
    /// [`ApiError::NotFound`] when no department has `code`.
    pub async fn get_by_code(&self, code: &str) -> ApiResult<Department> {
        self.repository
            .find_by_code(code)
            .await
            .ok_or_else(|| ApiError::not_found(format!("Department not found with code: {code}")))
    }

    /// # Errors
    ///
    /// [`ApiError::ValidationFailed`] for bad input and [`ApiError::Conflict`]
    /// when the code is taken.
    pub async fn create(&self, new: NewDepartment) -> ApiResult<Department> {
        new.validate()?;
        let code = new.code.trim();
        if self.repository.code_taken(code, None).await {
            return Err(duplicate_code(code));
        }
        let now = self.clock.now_utc();
        let department = self.repository.insert(new, now).await?;
        info!(id = department.id, code = %department.code, "department created");

        metrics::counter!(DEPARTMENTS_CREATED_TOTAL).increment(1);
        record_total(DEPARTMENTS_TOTAL, self.repository.count().await);
        self.publisher
            .publish(DepartmentEvent::new(LifecycleAction::Created, &department, now))
            .await;
        Ok(department)
    }

    /// Applies every field of `update` and publishes `DEPARTMENT_UPDATED`.
    ///
    /// # Errors
    ///
    /// As [`patch`](Self::patch).
    pub async fn update(&self, id: i64, update: DepartmentUpdate) -> ApiResult<Department> {
        self.modify(id, update).await
    }

    /// Applies the fields present in `update` and publishes
    /// `DEPARTMENT_UPDATED`.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`], [`ApiError::ValidationFailed`], or
    /// [`ApiError::Conflict`] when the new code belongs to another department.
    pub async fn patch(&self, id: i64, update: DepartmentUpdate) -> ApiResult<Department> {
        self.modify(id, update).await
    }

    async fn modify(&self, id: i64, update: DepartmentUpdate) -> ApiResult<Department> {
        update.validate()?;
        let mut department = self.get(id).await?;
        if let Some(code) = update.code.as_deref().map(str::trim) {
            if code != department.code && self.repository.code_taken(code, Some(id)).await {
                return Err(duplicate_code(code));
            }
        }
        department.apply(update, self.clock.now_utc());
        let department = self.repository.replace(department).await?;
        info!(id, code = %department.code, "department updated");
        metrics::counter!(DEPARTMENTS_UPDATED_TOTAL).increment(1);

        self.publisher
            .publish(DepartmentEvent::new(
                LifecycleAction::Updated,
                &department,
                department.updated_at,
            ))
            .await;
        Ok(department)
    }

    /// Deletes a department that has no employees.
    ///
    /// `DEPARTMENT_DELETED` is published before the row is removed.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`], [`ApiError::Conflict`] while employees remain,
    /// or [`ApiError::DependencyUnavailable`] under a fail-closed guard.
    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        let department = self.get(id).await?;
        self.guard.evaluate(id).await?;

        self.publisher
            .publish(DepartmentEvent::new(
                LifecycleAction::Deleted,
                &department,
                self.clock.now_utc(),
            ))
            .await;
        self.repository.remove(id).await?;
        info!(id, code = %department.code, "department deleted");

        metrics::counter!(DEPARTMENTS_DELETED_TOTAL).increment(1);
        record_total(DEPARTMENTS_TOTAL, self.repository.count().await);
        Ok(())
    }

    /// Department plus its roster; the roster is empty when the employee
    /// service cannot be reached.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] when no department has `id`.
    pub async fn employees_of(&self, id: i64) -> ApiResult<DepartmentEmployees> {
        let department = self.get(id).await?;
        let roster = self
            .employees_gateway
            .call_or_fallback(
                || self.employees.by_department(id),
                |err| fallback::employees_by_department(id, err),
            )
            .await;
        Ok(DepartmentEmployees::new(department.snapshot(), roster))
    }

    /// Locally projected employee count.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] when no department has `id`.
    pub async fn headcount(&self, id: i64) -> ApiResult<Headcount> {
        let department = self.get(id).await?;
        Ok(Headcount {
            department_id: department.id,
            employees: self.headcount.headcount(department.id),
        })
    }
}

fn duplicate_code(code: &str) -> ApiError {
    ApiError::conflict(format!("Department with code {code} already exists"))
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use orgmesh_core::clock::ManualClock;
    use orgmesh_core::{EmployeeSummary, Roster, Topic};
    use parking_lot::Mutex;

    use super::*;
    use crate::events::publisher::tests::RecordingChannel;
    use crate::resilience::{CallError, ResilienceConfig};
    use crate::service::delete_guard::DeleteGuardPolicy;
    use crate::storage::InMemoryDepartmentRepository;

    /// Employee lookup answering from a settable roster.
    #[derive(Default)]
    pub(crate) struct StubRoster {
        pub(crate) answer: Mutex<Option<Result<Roster, CallError>>>,
    }

    #[async_trait]
    impl EmployeeLookup for StubRoster {
        async fn by_department(&self, _id: i64) -> Result<Roster, CallError> {
            self.answer.lock().clone().unwrap_or(Ok(Roster::default()))
        }
    }

    struct Fixture {
        service: DepartmentService,
        repository: Arc<InMemoryDepartmentRepository>,
        channel: Arc<RecordingChannel>,
        roster: Arc<StubRoster>,
    }

    fn fixture(policy: DeleteGuardPolicy) -> Fixture {
        let repository = Arc::new(InMemoryDepartmentRepository::new());
        let channel = Arc::new(RecordingChannel::default());
        let roster = Arc::new(StubRoster::default());
        let gateway = Arc::new(ResilienceGateway::new(
            "employee-service",
            &ResilienceConfig::default(),
        ));
        let service = DepartmentService::new(DepartmentServiceParts {
            repository: repository.clone(),
            publisher: EventPublisher::new(channel.clone()),
            guard: DeleteGuard::new(gateway.clone(), roster.clone(), policy),
            employees_gateway: gateway,
            employees: roster.clone(),
            headcount: Arc::new(HeadcountProjection::new()),
            clock: Arc::new(ManualClock::new(1_700_000_000_000)),
        });
        Fixture {
            service,
            repository,
            channel,
            roster,
        }
    }

    fn new_department(code: &str, name: &str) -> NewDepartment {
        NewDepartment {
            code: code.to_string(),
            name: name.to_string(),
            description: None,
        }
    }

    fn summary(id: i64) -> EmployeeSummary {
        EmployeeSummary {
            id,
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            email: format!("{id}@example.com"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_publishes_one_matching_event() {
        let f = fixture(DeleteGuardPolicy::FailOpen);
        let created = f.service.create(new_department("ENG", "Engineering")).await.unwrap();

        let events = f.channel.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Topic::DepartmentCreated);
        assert_eq!(events[0].1["departmentId"], created.id);
        assert_eq!(events[0].1["code"], "ENG");
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_code_is_conflict_without_event() {
        let f = fixture(DeleteGuardPolicy::FailOpen);
        f.service.create(new_department("ENG", "Engineering")).await.unwrap();
        let err = f.service.create(new_department(" ENG ", "Other")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(f.channel.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn update_and_patch_each_publish_one_event() {
        let f = fixture(DeleteGuardPolicy::FailOpen);
        let d = f.service.create(new_department("ENG", "Engineering")).await.unwrap();
        let rename = DepartmentUpdate {
            name: Some("Platform".to_string()),
            ..DepartmentUpdate::default()
        };
        f.service.update(d.id, rename).await.unwrap();
        let describe = DepartmentUpdate {
            description: Some("Runs the platform".to_string()),
            ..DepartmentUpdate::default()
        };
        f.service.patch(d.id, describe).await.unwrap();

        let events = f.channel.events();
        let topics: Vec<Topic> = events.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            topics,
            vec![Topic::DepartmentCreated, Topic::DepartmentUpdated, Topic::DepartmentUpdated]
        );
        assert_eq!(events[2].1["name"], "Platform");
        assert_eq!(events[2].1["description"], "Runs the platform");
        assert_eq!(f.service.get(d.id).await.unwrap().name, "Platform");
    }

    #[tokio::test(start_paused = true)]
    async fn update_to_taken_code_conflicts() {
        let f = fixture(DeleteGuardPolicy::FailOpen);
        f.service.create(new_department("ENG", "Engineering")).await.unwrap();
        let ops = f.service.create(new_department("OPS", "Operations")).await.unwrap();
        let err = f
            .service
            .update(
                ops.id,
                DepartmentUpdate {
                    code: Some("ENG".to_string()),
                    ..DepartmentUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_delete_keeps_department() {
        let f = fixture(DeleteGuardPolicy::FailOpen);
        let d = f.service.create(new_department("ENG", "Engineering")).await.unwrap();
        *f.roster.answer.lock() = Some(Ok(vec![summary(1), summary(2)].into()));

        let err = f.service.delete(d.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m.contains("2 employee")));
        assert!(f.repository.get(d.id).await.is_some());
        assert_eq!(f.channel.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn allowed_delete_publishes_then_removes() {
        let f = fixture(DeleteGuardPolicy::FailOpen);
        let d = f.service.create(new_department("ENG", "Engineering")).await.unwrap();
        f.service.delete(d.id).await.unwrap();

        assert!(f.repository.get(d.id).await.is_none());
        let events = f.channel.events();
        assert_eq!(events[1].0, Topic::DepartmentDeleted);
        assert_eq!(events[1].1["departmentId"], d.id);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_closed_guard_refuses_when_roster_unavailable() {
        let f = fixture(DeleteGuardPolicy::FailClosed);
        let d = f.service.create(new_department("ENG", "Engineering")).await.unwrap();
        *f.roster.answer.lock() = Some(Err(CallError::Status(500)));

        let err = f.service.delete(d.id).await.unwrap_err();
        assert!(matches!(err, ApiError::DependencyUnavailable(_)));
        assert!(f.repository.get(d.id).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn roster_falls_back_to_empty() {
        let f = fixture(DeleteGuardPolicy::FailOpen);
        let d = f.service.create(new_department("ENG", "Engineering")).await.unwrap();
        *f.roster.answer.lock() = Some(Ok(vec![summary(4)].into()));
        assert_eq!(f.service.employees_of(d.id).await.unwrap().total_employees, 1);

        *f.roster.answer.lock() = Some(Ok(Roster {
            employees: vec![summary(4)],
            total: 640,
        }));
        let truncated = f.service.employees_of(d.id).await.unwrap();
        assert_eq!(truncated.employees.len(), 1);
        assert_eq!(truncated.total_employees, 640);

        *f.roster.answer.lock() = Some(Err(CallError::Status(502)));
        let reply = f.service.employees_of(d.id).await.unwrap();
        assert_eq!(reply.department.code, "ENG");
        assert!(reply.employees.is_empty());
        assert_eq!(reply.total_employees, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn list_uses_default_sort_for_unknown_field() {
        let f = fixture(DeleteGuardPolicy::FailOpen);
        f.service.create(new_department("B", "Beta")).await.unwrap();
        f.service.create(new_department("A", "Alpha")).await.unwrap();
        let page = f
            .service
            .list(
                &DepartmentFilter::default(),
                PageRequest::default(),
                &SortSpec::asc("budget"),
            )
            .await;
        assert_eq!(page.sort.property, "name");
        assert_eq!(page.content[0].name, "Alpha");
        assert_eq!(page.total_elements, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_department_is_not_found() {
        let f = fixture(DeleteGuardPolicy::FailOpen);
        assert!(matches!(f.service.get(9).await, Err(ApiError::NotFound(_))));
        assert!(matches!(f.service.delete(9).await, Err(ApiError::NotFound(_))));
        assert!(matches!(f.service.headcount(9).await, Err(ApiError::NotFound(_))));
        assert!(matches!(f.service.get_by_code("X").await, Err(ApiError::NotFound(_))));
    }
}
