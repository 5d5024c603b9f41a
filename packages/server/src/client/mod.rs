//! `reqwest` clients for the counterpart service's lookup endpoints.
//!
//! Each client makes exactly one attempt per call and translates the outcome
//! into a [`CallError`]; timeouts, retries and circuit breaking are layered
//! on by a [`ResilienceGateway`](crate::resilience::ResilienceGateway).

pub mod department;
pub mod employee;

pub use department::HttpDepartmentClient;
pub use employee::HttpEmployeeClient;

use std::time::Duration;

use anyhow::Context;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::resilience::CallError;

/// Builds the shared HTTP client, bounding connection setup by `connect_timeout`.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client(connect_timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .context("failed to build HTTP client")
}

/// Parses a peer base URL such as `http://localhost:8081`.
///
/// # Errors
///
/// Returns an error for unparsable input or URLs that cannot carry a path.
pub fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("invalid peer URL: {raw}"))?;
    anyhow::ensure!(!url.cannot_be_a_base(), "peer URL cannot carry a path: {raw}");
    Ok(url)
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, CallError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| CallError::Connection(format!("peer URL cannot carry a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Maps a transport failure from `reqwest` onto the call taxonomy.
pub(crate) fn transport_error(err: &reqwest::Error, timeout: Duration) -> CallError {
    if err.is_timeout() {
        CallError::timeout(timeout)
    } else if err.is_decode() {
        CallError::Decode(err.to_string())
    } else {
        CallError::Connection(err.to_string())
    }
}

/// Sends `request` once, bounded by `timeout`, and decodes a successful JSON reply.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<T, CallError> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(&e, timeout))?;
    match response.status() {
        status if status.is_success() => response
            .json::<T>()
            .await
            .map_err(|e| CallError::Decode(e.to_string())),
        StatusCode::NOT_FOUND => Err(CallError::NotFound),
        status => Err(CallError::Status(status.as_u16())),
    }
}
