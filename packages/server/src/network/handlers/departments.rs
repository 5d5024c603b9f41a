//! `/api/v1/departments` routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use orgmesh_core::{
    Department, DepartmentEmployees, DepartmentFilter, DepartmentUpdate, Headcount, NewDepartment,
    PageDescriptor, PageRequest, SortSpec,
};
use serde::Deserialize;

use super::DepartmentState;
use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::service::DepartmentService;

type Service = State<Arc<DepartmentService>>;

/// Query string of `GET /api/v1/departments`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentListQuery {
    pub name: Option<String>,
    pub code: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

pub fn routes() -> Router<DepartmentState> {
    Router::new()
        .route("/api/v1/departments", get(list).post(create))
        .route("/api/v1/departments/by-code/{code}", get(by_code))
        .route(
            "/api/v1/departments/{id}",
            get(by_id).put(update).patch(patch).delete(remove),
        )
        .route("/api/v1/departments/{id}/employees", get(employees))
        .route("/api/v1/departments/{id}/headcount", get(headcount))
}

async fn list(
    State(service): Service,
    ApiQuery(query): ApiQuery<DepartmentListQuery>,
) -> ApiResult<Json<PageDescriptor<Department>>> {
    let request = PageRequest::new(query.page, query.size)?;
    let sort = SortSpec::parse(query.sort.as_deref(), &DepartmentService::default_sort());
    let filter = DepartmentFilter {
        name: query.name,
        code: query.code,
    };
    Ok(Json(service.list(&filter, request, &sort).await))
}

async fn by_id(State(service): Service, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<Department>> {
    service.get(id).await.map(Json)
}

async fn by_code(
    State(service): Service,
    ApiPath(code): ApiPath<String>,
) -> ApiResult<Json<Department>> {
    service.get_by_code(&code).await.map(Json)
}

async fn create(
    State(service): Service,
    ApiJson(new): ApiJson<NewDepartment>,
) -> ApiResult<(StatusCode, Json<Department>)> {
    let department = service.create(new).await?;
    Ok((StatusCode::CREATED, Json(department)))
}

async fn update(
    State(service): Service,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<DepartmentUpdate>,
) -> ApiResult<Json<Department>> {
    service.update(id, update).await.map(Json)
}

async fn patch(
    State(service): Service,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<DepartmentUpdate>,
) -> ApiResult<Json<Department>> {
    service.patch(id, update).await.map(Json)
}

async fn remove(State(service): Service, ApiPath(id): ApiPath<i64>) -> ApiResult<StatusCode> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn employees(
    State(service): Service,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<DepartmentEmployees>> {
    service.employees_of(id).await.map(Json)
}

async fn headcount(State(service): Service, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<Headcount>> {
    service.headcount(id).await.map(Json)
}
