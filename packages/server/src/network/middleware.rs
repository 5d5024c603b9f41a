//! HTTP middleware stack shared by both services.
//!
//! Layers are listed outermost first: the first layer sees the request
//! first on the way in and the response last on the way out.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;
use super::shutdown::ShutdownController;
use crate::error::ApiError;
use crate::trace_id::TraceId;

/// Header carrying the per-request trace id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        TimeoutLayer,
        tower::layer::util::Stack<
            CorsLayer,
            tower::layer::util::Stack<
                CompressionLayer,
                tower::layer::util::Stack<
                    TraceLayer<
                        tower_http::classify::SharedClassifier<
                            tower_http::classify::ServerErrorsAsFailures,
                        >,
                    >,
                    tower::layer::util::Stack<
                        SetRequestIdLayer<MakeRequestUuid>,
                        tower::layer::util::Identity,
                    >,
                >,
            >,
        >,
    >,
>;

/// Transport-level layers applied to every route.
///
/// 1. `SetRequestId`: assigns a UUID `x-request-id` unless the caller sent one
/// 2. `Trace`: request/response spans
/// 3. `Compression`: gzip responses
/// 4. `CORS`
/// 5. `Timeout`: 408 after `request_timeout`
/// 6. `PropagateRequestId`: echoes `x-request-id` on the response
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any)
}

/// Runs the rest of the request inside a [`TraceId`] scope taken from
/// `x-request-id`, so error bodies and logs carry the same id.
pub async fn trace_id_middleware(request: Request, next: Next) -> Response {
    let trace_id = TraceId::from_header(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    TraceId::scope(trace_id, next.run(request)).await
}

/// Counts the request as in flight, refusing it once shutdown has begun.
///
/// Health probes are never refused, so orchestrators can watch the drain.
pub async fn in_flight_middleware(
    State(shutdown): State<Arc<ShutdownController>>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path().starts_with("/health") {
        return next.run(request).await;
    }
    if shutdown.health_state().is_shutting_down() {
        return ApiError::DependencyUnavailable("Service is shutting down".to_string())
            .into_response();
    }
    let _guard = shutdown.in_flight_guard();
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    fn echo_router(shutdown: Arc<ShutdownController>) -> Router {
        Router::new()
            .route(
                "/echo",
                get(|| async { TraceId::current().map(|t| t.to_string()).unwrap_or_default() }),
            )
            .route("/health", get(|| async { "draining" }))
            .layer(axum::middleware::from_fn_with_state(shutdown, in_flight_middleware))
            .layer(axum::middleware::from_fn(trace_id_middleware))
            .layer(build_http_layers(&NetworkConfig::default()))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn caller_request_id_becomes_trace_id() {
        let id = "6f1c0a52-4a4b-4d3e-9a77-0d4f6d1a2b3c";
        let response = echo_router(Arc::new(ShutdownController::new()))
            .oneshot(
                Request::builder()
                    .uri("/echo")
                    .header(REQUEST_ID_HEADER, id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], id);
        assert_eq!(body_text(response).await, id);
    }

    #[tokio::test]
    async fn generated_request_id_is_echoed() {
        let response = echo_router(Arc::new(ShutdownController::new()))
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        assert_eq!(body_text(response).await, header);
    }

    #[tokio::test]
    async fn draining_refuses_requests() {
        let shutdown = Arc::new(ShutdownController::new());
        shutdown.trigger_shutdown();
        let response = echo_router(shutdown.clone())
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(shutdown.in_flight_count(), 0);

        let health = echo_router(shutdown)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[test]
    fn cors_accepts_explicit_origins() {
        let _cors = build_cors_layer(&["http://localhost:3000".to_string()]);
    }
}
