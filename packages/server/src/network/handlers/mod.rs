//! Axum handlers and the state they extract.
//!
//! Each service has its own router state ([`DepartmentState`],
//! [`EmployeeState`]) holding its domain service plus the [`NodeState`]
//! shared by the health and event ingress routes.

pub mod departments;
pub mod employees;
pub mod events;
pub mod health;

pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;

use super::ShutdownController;
use crate::events::EventSubscriber;
use crate::resilience::ResilienceGateway;
use crate::service::{DepartmentService, EmployeeService};

/// Per-process state shared by every route of a service.
#[derive(Clone)]
pub struct NodeState {
    /// `department-service` or `employee-service`.
    pub service_name: &'static str,
    pub shutdown: Arc<ShutdownController>,
    /// Receives the counterpart's lifecycle events.
    pub subscriber: Arc<EventSubscriber>,
    /// Gateway to the counterpart; its breaker is reported by `/health`.
    pub peer: Arc<ResilienceGateway>,
    /// Process start time, used for uptime.
    pub start_time: Instant,
}

#[derive(Clone, FromRef)]
pub struct DepartmentState {
    pub node: NodeState,
    pub service: Arc<DepartmentService>,
}

#[derive(Clone, FromRef)]
pub struct EmployeeState {
    pub node: NodeState,
    pub service: Arc<EmployeeService>,
}

/// Health probes and the event ingress, mounted by both services.
pub fn node_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    NodeState: FromRef<S>,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/internal/events/{topic}", post(events::ingest_handler))
}

/// Full department service router with state applied.
pub fn department_router(state: DepartmentState) -> Router {
    Router::new()
        .merge(departments::routes())
        .merge(node_routes())
        .with_state(state)
}

/// Full employee service router with state applied.
pub fn employee_router(state: EmployeeState) -> Router {
    Router::new()
        .merge(employees::routes())
        .merge(node_routes())
        .with_state(state)
}
