//! HTTP-facing error taxonomy and the problem-details response body.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use orgmesh_core::{FieldError, ValidationErrors};
use serde::Serialize;
use tracing::error;

use crate::storage::StorageError;
use crate::trace_id::TraceId;

/// Result alias for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

/// Every failure a client can observe.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    ValidationFailed {
        message: String,
        errors: Vec<FieldError>,
    },

    /// A dependency needed to complete the request could not be consulted.
    #[error("{0}")]
    DependencyUnavailable(String),

    /// Unexpected failure. The cause is logged, never sent to the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Validation failure without field details.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            Self::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable category.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::ValidationFailed { .. } => "VALIDATION_FAILED",
            Self::DependencyUnavailable(_) => "DEPENDENCY_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Resource Not Found",
            Self::Conflict(_) => "Conflict",
            Self::ValidationFailed { .. } => "Validation Failed",
            Self::DependencyUnavailable(_) => "Dependency Unavailable",
            Self::Internal(_) => "Internal Server Error",
        }
    }
}

/// `application/problem+json` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemBody {
    pub category: &'static str,
    pub title: &'static str,
    pub status: u16,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let trace_id = TraceId::current().map(|id| id.to_string());
        let detail = match &self {
            Self::Internal(cause) => {
                error!(trace_id = trace_id.as_deref(), error = ?cause, "internal error");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };
        let body = ProblemBody {
            category: self.category(),
            title: self.title(),
            status: status.as_u16(),
            detail,
            timestamp: Utc::now(),
            trace_id,
            errors: match self {
                Self::ValidationFailed { errors, .. } => errors,
                _ => Vec::new(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        Self::ValidationFailed {
            message: format!("Validation failed: {err}"),
            errors: err.errors,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate { .. } => Self::Conflict(err.to_string()),
            StorageError::NotFound { .. } => Self::NotFound(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

/// JSON body extractor whose rejection is an [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejection is an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path extractor whose rejection is an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, Option<HeaderValue>, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn problem_body_shape() {
        let trace = TraceId::generate();
        let (status, content_type, body) =
            TraceId::scope(trace, body_of(ApiError::conflict("code already exists: HR"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(content_type.unwrap(), "application/problem+json");
        assert_eq!(body["category"], "CONFLICT");
        assert_eq!(body["status"], 409);
        assert_eq!(body["detail"], "code already exists: HR");
        assert_eq!(body["traceId"], trace.to_string());
        assert!(body.get("errors").is_none());
        assert!(body.get("timestamp").is_some());
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let err: ApiError = ValidationErrors::single("email", "must be a well-formed email address").into();
        let (status, _, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "VALIDATION_FAILED");
        assert_eq!(body["errors"][0]["field"], "email");
    }

    #[tokio::test]
    async fn internal_cause_is_hidden() {
        let (status, _, body) = body_of(anyhow::anyhow!("db password is hunter2").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["detail"].as_str().unwrap().contains("hunter2"));
        assert!(body.get("traceId").is_none());
    }

    #[test]
    fn storage_errors_map_to_client_categories() {
        let dup = ApiError::from(StorageError::Duplicate {
            field: "email",
            value: "a@b.c".to_string(),
        });
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(StorageError::NotFound { id: 1 }).category(),
            "NOT_FOUND"
        );
    }
}
