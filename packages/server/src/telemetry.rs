//! Logging and metrics bootstrap plus the metric names used across the crate.

use std::net::SocketAddr;

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Metric names
// ---------------------------------------------------------------------------

/// Circuit breaker state gauge (0 closed, 1 open, 2 half-open), labelled by `dependency`.
pub const BREAKER_STATE: &str = "orgmesh_circuit_breaker_state";

/// Calls rejected by an open or saturated breaker, labelled by `dependency`.
pub const BREAKER_REJECTED_TOTAL: &str = "orgmesh_circuit_breaker_rejected_total";

/// Gateway calls answered with a fallback value, labelled by `dependency`.
pub const FALLBACKS_TOTAL: &str = "orgmesh_fallbacks_total";

/// Lifecycle events handed to a channel, labelled by `topic`.
pub const EVENTS_PUBLISHED_TOTAL: &str = "orgmesh_events_published_total";

/// Lifecycle events that could not be serialized or sent, labelled by `topic`.
pub const EVENTS_FAILED_TOTAL: &str = "orgmesh_events_failed_total";

/// Lifecycle events received and dispatched, labelled by `topic`.
pub const EVENTS_RECEIVED_TOTAL: &str = "orgmesh_events_received_total";

pub const DEPARTMENTS_CREATED_TOTAL: &str = "orgmesh_departments_created_total";
pub const DEPARTMENTS_UPDATED_TOTAL: &str = "orgmesh_departments_updated_total";
pub const DEPARTMENTS_DELETED_TOTAL: &str = "orgmesh_departments_deleted_total";
pub const DEPARTMENTS_TOTAL: &str = "orgmesh_departments";

pub const EMPLOYEES_CREATED_TOTAL: &str = "orgmesh_employees_created_total";
pub const EMPLOYEES_UPDATED_TOTAL: &str = "orgmesh_employees_updated_total";
pub const EMPLOYEES_DELETED_TOTAL: &str = "orgmesh_employees_deleted_total";
pub const EMPLOYEES_TOTAL: &str = "orgmesh_employees";

fn describe_metrics() {
    describe_gauge!(BREAKER_STATE, "Circuit breaker state per dependency");
    describe_counter!(BREAKER_REJECTED_TOTAL, "Calls rejected by a circuit breaker");
    describe_counter!(FALLBACKS_TOTAL, "Lookups answered with a fallback value");
    describe_counter!(EVENTS_PUBLISHED_TOTAL, "Lifecycle events published");
    describe_counter!(EVENTS_FAILED_TOTAL, "Lifecycle events that failed to publish");
    describe_counter!(EVENTS_RECEIVED_TOTAL, "Lifecycle events received");
    describe_counter!(DEPARTMENTS_CREATED_TOTAL, "Departments created");
    describe_counter!(DEPARTMENTS_UPDATED_TOTAL, "Departments updated");
    describe_counter!(DEPARTMENTS_DELETED_TOTAL, "Departments deleted");
    describe_gauge!(DEPARTMENTS_TOTAL, "Departments currently stored");
    describe_counter!(EMPLOYEES_CREATED_TOTAL, "Employees created");
    describe_counter!(EMPLOYEES_UPDATED_TOTAL, "Employees updated");
    describe_counter!(EMPLOYEES_DELETED_TOTAL, "Employees deleted");
    describe_gauge!(EMPLOYEES_TOTAL, "Employees currently stored");
}

/// Installs the Prometheus recorder and serves `/metrics` on `addr`.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if the recorder is already installed or the listener
/// cannot be bound.
pub fn install_metrics_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info,orgmesh_server=debug`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,orgmesh_server=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()?,
    }
    Ok(())
}
