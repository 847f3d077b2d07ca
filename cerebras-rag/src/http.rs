//! Shared HTTP plumbing for the hosted service clients

use crate::types::{RagError, RagResult};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 60;

const USER_AGENT: &str = concat!("cerebras-rag/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used by the service clients
pub(crate) fn create_http_client() -> RagResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| RagError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Describe a non-success response, including the body when there is one
pub(crate) async fn describe_error_response(response: reqwest::Response, operation: &str) -> String {
    let status = response.status();
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();

    let hint = match status.as_u16() {
        401 | 403 => " (check the API key)",
        404 => " (resource not found)",
        429 => " (rate limited)",
        _ => "",
    };

    format!(
        "{} failed: HTTP {} for {}{}: {}",
        operation,
        status.as_u16(),
        url,
        hint,
        if body.is_empty() {
            status.canonical_reason().unwrap_or("Unknown error")
        } else {
            body.as_str()
        }
    )
}
