//! Roster lookups issued by the department service.

use std::time::Duration;

use async_trait::async_trait;
use orgmesh_core::paging::MAX_PAGE_SIZE;
use orgmesh_core::{EmployeeSummary, PageDescriptor, Roster};
use reqwest::Url;

use super::{endpoint, fetch_json};
use crate::resilience::CallError;
use crate::traits::EmployeeLookup;

/// Single-attempt client for `GET /api/v1/employees?departmentId=…`.
///
/// Only the first page of up to 500 employees is fetched; the roster's
/// `total` is the page's `totalElements`.
#[derive(Clone)]
pub struct HttpEmployeeClient {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl HttpEmployeeClient {
    #[must_use]
    pub fn new(client: reqwest::Client, base: Url, timeout: Duration) -> Self {
        Self {
            client,
            base,
            timeout,
        }
    }
}

#[async_trait]
impl EmployeeLookup for HttpEmployeeClient {
    async fn by_department(&self, department_id: i64) -> Result<Roster, CallError> {
        let mut url = endpoint(&self.base, &["api", "v1", "employees"])?;
        url.query_pairs_mut()
            .append_pair("departmentId", &department_id.to_string())
            .append_pair("size", &MAX_PAGE_SIZE.to_string());
        let page: PageDescriptor<EmployeeSummary> =
            fetch_json(self.client.get(url), self.timeout).await?;
        Ok(Roster {
            total: page.total_elements,
            employees: page.content,
        })
    }
}
