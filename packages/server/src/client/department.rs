//! Department lookups issued by the employee service.

use std::time::Duration;

use async_trait::async_trait;
use orgmesh_core::DepartmentSnapshot;
use reqwest::Url;

use super::{endpoint, fetch_json};
use crate::resilience::CallError;
use crate::traits::DepartmentLookup;

/// Single-attempt client for `GET /api/v1/departments/{id}` and `/by-code/{code}`.
#[derive(Clone)]
pub struct HttpDepartmentClient {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl HttpDepartmentClient {
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
impl DepartmentLookup for HttpDepartmentClient {
    async fn by_id(&self, id: i64) -> Result<DepartmentSnapshot, CallError> {
        let id = id.to_string();
        let url = endpoint(&self.base, &["api", "v1", "departments", &id])?;
        fetch_json(self.client.get(url), self.timeout).await
    }

    async fn by_code(&self, code: &str) -> Result<DepartmentSnapshot, CallError> {
        let url = endpoint(&self.base, &["api", "v1", "departments", "by-code", code])?;
        fetch_json(self.client.get(url), self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};

    use super::*;
    use crate::client::tests::spawn_server;

    fn snapshot(id: i64, code: &str) -> DepartmentSnapshot {
        DepartmentSnapshot {
            id,
            name: "Finance".to_string(),
            code: code.to_string(),
            description: Some("Money".to_string()),
        }
    }

    async fn client() -> HttpDepartmentClient {
        let app = Router::new()
            .route(
                "/api/v1/departments/{id}",
                get(|Path(id): Path<String>| async move {
                    match id.as_str() {
                        "1" => Ok(Json(snapshot(1, "FIN"))),
                        "2" => Err(StatusCode::INTERNAL_SERVER_ERROR),
                        _ => Err(StatusCode::NOT_FOUND),
                    }
                }),
            )
            .route(
                "/api/v1/departments/by-code/{code}",
                get(|Path(code): Path<String>| async move { Json(snapshot(9, &code)) }),
            );
        let base = spawn_server(app).await;
        HttpDepartmentClient::new(reqwest::Client::new(), base, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn maps_replies() {
        let client = client().await;
        assert_eq!(client.by_id(1).await.unwrap(), snapshot(1, "FIN"));
        assert_eq!(client.by_id(3).await, Err(CallError::NotFound));
        assert_eq!(client.by_id(2).await, Err(CallError::Status(500)));
    }

    #[tokio::test]
    async fn by_code_round_trips_reserved_characters() {
        let client = client().await;
        assert_eq!(client.by_code("R&D/EU").await.unwrap().code, "R&D/EU");
    }

    #[tokio::test]
    async fn unreachable_peer_is_a_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let client = HttpDepartmentClient::new(reqwest::Client::new(), base, Duration::from_secs(2));
        let err = client.by_id(1).await.unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }
}
