//! Shared HTTP client and response helpers

use crate::probes::traits::ProbeError;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Builds the HTTP client shared by every probe
///
/// # Arguments
///
/// * `user_agent` - User-Agent header sent with every request
/// * `timeout` - Whole-request timeout; the pipeline applies its own bound on top
///
/// # Example
///
/// ```no_run
/// use sitescout::probes::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("sitescout/1.0", Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Google API error envelope: `{"error": {"message": "..."}}`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Maps a non-success response to a `ProbeError`
///
/// | Status | Error |
/// |--------|-------|
/// | 401, 403 | `Unauthorized` |
/// | anything else | `Upstream` |
///
/// The API's own `error.message` is preferred over `fallback` when present.
pub(crate) async fn error_from_response(response: Response, fallback: &str) -> ProbeError {
    let status = response.status();
    let message = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error)
        .and_then(|detail| detail.message)
        .unwrap_or_else(|| format!("{} (HTTP {})", fallback, status.as_u16()));

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ProbeError::Unauthorized(message)
    } else {
        ProbeError::Upstream(message)
    }
}

/// Joins an endpoint origin and an API path without doubling slashes
pub(crate) fn join_endpoint(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
