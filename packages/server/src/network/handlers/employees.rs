//! `/api/v1/employees` routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use orgmesh_core::{
    BulkCreateRequest, BulkCreateResponse, EmployeeFilter, EmployeeStats, EmployeeUpdate,
    EmployeeView, NewEmployee, PageDescriptor, PageRequest, SortSpec,
};
use serde::Deserialize;

use super::EmployeeState;
use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::service::EmployeeService;

type Service = State<Arc<EmployeeService>>;

/// Query string of `GET /api/v1/employees`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListQuery {
    pub email: Option<String>,
    pub last_name: Option<String>,
    pub department_id: Option<i64>,
    /// Resolved to an id through the department service.
    pub department_code: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
    /// Embed department snapshots; off unless asked for.
    #[serde(alias = "enrichWithDepartment")]
    pub enrich: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrichQuery {
    #[serde(alias = "enrichWithDepartment")]
    pub enrich: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

pub fn routes() -> Router<EmployeeState> {
    Router::new()
        .route("/api/v1/employees", get(list).post(create))
        .route("/api/v1/employees/search", get(search))
        .route("/api/v1/employees/stats", get(stats))
        .route("/api/v1/employees/bulk", post(bulk_create))
        .route(
            "/api/v1/employees/{id}",
            get(by_id).put(update).patch(patch).delete(remove),
        )
}

async fn list(
    State(service): Service,
    ApiQuery(query): ApiQuery<EmployeeListQuery>,
) -> ApiResult<Json<PageDescriptor<EmployeeView>>> {
    let request = PageRequest::new(query.page, query.size)?;
    let sort = SortSpec::parse(query.sort.as_deref(), &EmployeeService::default_sort());
    let filter = EmployeeFilter {
        email: query.email,
        last_name: query.last_name,
        department_id: query.department_id,
    };
    let page = service
        .list(
            &filter,
            query.department_code.as_deref(),
            request,
            &sort,
            query.enrich.unwrap_or(false),
        )
        .await;
    Ok(Json(page))
}

async fn by_id(
    State(service): Service,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<EnrichQuery>,
) -> ApiResult<Json<EmployeeView>> {
    service.get(id, query.enrich.unwrap_or(true)).await.map(Json)
}

async fn create(
    State(service): Service,
    ApiJson(new): ApiJson<NewEmployee>,
) -> ApiResult<(StatusCode, Json<EmployeeView>)> {
    let employee = service.create(new).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn update(
    State(service): Service,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<EmployeeUpdate>,
) -> ApiResult<Json<EmployeeView>> {
    service.update(id, update).await.map(Json)
}

async fn patch(
    State(service): Service,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<EmployeeUpdate>,
) -> ApiResult<Json<EmployeeView>> {
    service.patch(id, update).await.map(Json)
}

async fn remove(State(service): Service, ApiPath(id): ApiPath<i64>) -> ApiResult<StatusCode> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn search(
    State(service): Service,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Json<Vec<EmployeeView>>> {
    service.search(&query.query).await.map(Json)
}

async fn stats(State(service): Service) -> Json<EmployeeStats> {
    Json(service.stats().await)
}

async fn bulk_create(
    State(service): Service,
    ApiJson(request): ApiJson<BulkCreateRequest>,
) -> ApiResult<(StatusCode, Json<BulkCreateResponse>)> {
    let response = service.bulk_create(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
