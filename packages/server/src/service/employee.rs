//! Employee service: owns the employee store and enriches reads with
//! department data.

use std::sync::Arc;

use orgmesh_core::clock::ClockSource;
use orgmesh_core::paging::build_page;
use orgmesh_core::{
    BulkCreateRequest, BulkCreateResponse, BulkCreateResult, Employee, EmployeeEvent,
    EmployeeFilter, EmployeeStats, EmployeeUpdate, EmployeeView, LifecycleAction, NewEmployee,
    PageDescriptor, PageRequest, SortSpec, Validate, ValidationErrors,
};
use tracing::{debug, info};

use super::enrichment::EnrichmentResolver;
use super::record_total;
use crate::error::{ApiError, ApiResult};
use crate::events::EventPublisher;
use crate::telemetry::{
    EMPLOYEES_CREATED_TOTAL, EMPLOYEES_DELETED_TOTAL, EMPLOYEES_TOTAL, EMPLOYEES_UPDATED_TOTAL,
};
use crate::traits::EmployeeRepository;

/// Collaborators of an [`EmployeeService`].
pub struct EmployeeServiceParts {
    pub repository: Arc<dyn EmployeeRepository>,
    pub publisher: EventPublisher,
    pub enrichment: EnrichmentResolver,
    pub clock: Arc<dyn ClockSource>,
}

pub struct EmployeeService {
    repository: Arc<dyn EmployeeRepository>,
    publisher: EventPublisher,
    enrichment: EnrichmentResolver,
    clock: Arc<dyn ClockSource>,
}

impl EmployeeService {
    #[must_use]
    pub fn new(parts: EmployeeServiceParts) -> Self {
        Self {
            repository: parts.repository,
            publisher: parts.publisher,
            enrichment: parts.enrichment,
            clock: parts.clock,
        }
    }

    /// Sort applied when the request names none or an unsupported field.
    #[must_use]
    pub fn default_sort() -> SortSpec {
        SortSpec::asc("lastName")
    }

    /// One page of employees.
    ///
    /// `department_code` is resolved to an id through the department service
    /// first. An unresolvable code, or one that disagrees with an explicit
    /// `department_id` filter, yields an empty page.
    pub async fn list(
        &self,
        filter: &EmployeeFilter,
        department_code: Option<&str>,
        request: PageRequest,
        sort: &SortSpec,
        enrich: bool,
    ) -> PageDescriptor<EmployeeView> {
        let mut filter = filter.clone();
        let mut unsatisfiable = false;
        if let Some(code) = department_code.map(str::trim).filter(|c| !c.is_empty()) {
            match self.enrichment.department_by_code(code).await {
                Err(err) => {
                    debug!(code, error = %err, "department code did not resolve, empty page");
                    unsatisfiable = true;
                }
                Ok(department) if filter.department_id.is_some_and(|id| id != department.id) => {
                    unsatisfiable = true;
                }
                Ok(department) => filter.department_id = Some(department.id),
            }
        }

        let all = if unsatisfiable {
            Vec::new()
        } else {
            self.repository.all().await
        };
        let mut page = build_page(all, &filter, request, sort, &Self::default_sort());
        let content = std::mem::take(&mut page.content);
        let views = self.enrichment.resolve_many(content, enrich).await;
        page.with_content(views)
    }

    /// # Errors
    ///
    /// [`ApiError::NotFound`] when no employee has `id`.
    pub async fn get(&self, id: i64, enrich: bool) -> ApiResult<EmployeeView> {
        let employee = self.find(id).await?;
        Ok(self.enrichment.resolve(employee, enrich).await)
    }

    async fn find(&self, id: i64) -> ApiResult<Employee> {
        self.repository
            .get(id)
            .await
            .ok_or_else(|| ApiError::not_found(format!("Employee not found with id: {id}")))
    }

    /// # Errors
    ///
    /// [`ApiError::ValidationFailed`] for bad input and [`ApiError::Conflict`]
    /// when the email is taken.
    pub async fn create(&self, new: NewEmployee) -> ApiResult<EmployeeView> {
        new.validate()?;
        let email = new.email.trim();
        if self.repository.email_taken(email, None).await {
            return Err(duplicate_email(email));
        }
        let employee = self.insert(new).await?;
        record_total(EMPLOYEES_TOTAL, self.repository.count().await);
        Ok(employee.into_view())
    }

    async fn insert(&self, new: NewEmployee) -> ApiResult<Employee> {
        let now = self.clock.now_utc();
        let employee = self.repository.insert(new, now).await?;
        info!(id = employee.id, email = %employee.email, "employee created");

        metrics::counter!(EMPLOYEES_CREATED_TOTAL).increment(1);
        self.publisher
            .publish(EmployeeEvent::new(LifecycleAction::Created, &employee, now))
            .await;
        Ok(employee)
    }

    /// Applies every field of `update` and publishes `EMPLOYEE_UPDATED`.
    ///
    /// # Errors
    ///
    /// As [`patch`](Self::patch).
    pub async fn update(&self, id: i64, update: EmployeeUpdate) -> ApiResult<EmployeeView> {
        Ok(self.modify(id, update).await?.into_view())
    }

    /// Applies the fields present in `update` and publishes
    /// `EMPLOYEE_UPDATED`.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`], [`ApiError::ValidationFailed`], or
    /// [`ApiError::Conflict`] when the new email belongs to another employee.
    pub async fn patch(&self, id: i64, update: EmployeeUpdate) -> ApiResult<EmployeeView> {
        Ok(self.modify(id, update).await?.into_view())
    }

    async fn modify(&self, id: i64, update: EmployeeUpdate) -> ApiResult<Employee> {
        update.validate()?;
        let mut employee = self.find(id).await?;
        if let Some(email) = update.email.as_deref().map(str::trim) {
            if email != employee.email && self.repository.email_taken(email, Some(id)).await {
                return Err(duplicate_email(email));
            }
        }
        employee.apply(update, self.clock.now_utc());
        let employee = self.repository.replace(employee).await?;
        info!(id, email = %employee.email, "employee updated");
        metrics::counter!(EMPLOYEES_UPDATED_TOTAL).increment(1);

        self.publisher
            .publish(EmployeeEvent::new(
                LifecycleAction::Updated,
                &employee,
                employee.updated_at,
            ))
            .await;
        Ok(employee)
    }

    /// Removes an employee. `EMPLOYEE_DELETED` is published before the row
    /// is removed.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] when no employee has `id`.
    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        let employee = self.find(id).await?;
        self.publisher
            .publish(EmployeeEvent::new(
                LifecycleAction::Deleted,
                &employee,
                self.clock.now_utc(),
            ))
            .await;
        self.repository.remove(id).await?;
        info!(id, email = %employee.email, "employee deleted");

        metrics::counter!(EMPLOYEES_DELETED_TOTAL).increment(1);
        record_total(EMPLOYEES_TOTAL, self.repository.count().await);
        Ok(())
    }

    /// Employees whose first name, last name or email contains `query`,
    /// ignoring case, ordered by id.
    ///
    /// # Errors
    ///
    /// [`ApiError::ValidationFailed`] for a blank query.
    pub async fn search(&self, query: &str) -> ApiResult<Vec<EmployeeView>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationErrors::single("query", "query must not be blank").into());
        }
        let mut matches: Vec<Employee> = self
            .repository
            .all()
            .await
            .into_iter()
            .filter(|e| e.matches_query(query))
            .collect();
        matches.sort_by_key(|e| e.id);
        Ok(matches.into_iter().map(Employee::into_view).collect())
    }

    pub async fn stats(&self) -> EmployeeStats {
        EmployeeStats::collect(&self.repository.all().await)
    }

    /// Creates each element independently. Invalid elements and duplicate
    /// emails are reported per index and do not abort the batch.
    ///
    /// # Errors
    ///
    /// [`ApiError::ValidationFailed`] when the batch is empty or too large.
    pub async fn bulk_create(&self, request: BulkCreateRequest) -> ApiResult<BulkCreateResponse> {
        request.validate()?;
        let mut results = Vec::with_capacity(request.employees.len());
        for (index, new) in request.employees.into_iter().enumerate() {
            results.push(self.bulk_item(index, new).await);
        }
        record_total(EMPLOYEES_TOTAL, self.repository.count().await);

        let response = BulkCreateResponse::from(results);
        info!(
            processed = response.total_processed,
            successful = response.successful,
            failed = response.failed,
            "bulk create finished"
        );
        Ok(response)
    }

    async fn bulk_item(&self, index: usize, new: NewEmployee) -> BulkCreateResult {
        if let Err(errors) = new.validate() {
            return BulkCreateResult::failed(index, errors.to_string());
        }
        let email = new.email.trim().to_string();
        if self.repository.email_taken(&email, None).await {
            return BulkCreateResult::failed(index, format!("Email already exists: {email}"));
        }
        match self.insert(new).await {
            Ok(employee) => BulkCreateResult::created(index, employee.into_view()),
            Err(ApiError::Conflict(_)) => {
                BulkCreateResult::failed(index, format!("Email already exists: {email}"))
            }
            Err(err) => BulkCreateResult::failed(index, err.to_string()),
        }
    }
}

fn duplicate_email(email: &str) -> ApiError {
    ApiError::conflict(format!("Employee with email {email} already exists"))
}
