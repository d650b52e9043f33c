//! Shared HTTP client construction, request headers, and status mapping.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::config::{ApiGroup, API_GROUP_HEADER};
use crate::error::{ErrorDetails, RelayError};

/// Build a reqwest client with a bounded per-request timeout.
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(4)
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a caller-supplied id for use as one URL path segment.
pub fn path_segment(id: &str) -> String {
    utf8_percent_encode(id, PATH_SEGMENT).to_string()
}

/// Headers for an authenticated REST call: bearer token, JSON, rate-limit group.
pub fn bearer_headers(access_token: &str, api_group: ApiGroup) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {access_token}")) {
        headers.insert(AUTHORIZATION, val);
    }
    if let Ok(val) = HeaderValue::from_str(&api_group.to_string()) {
        headers.insert(API_GROUP_HEADER, val);
    }
    headers
}

/// Map a non-success response to an API error carrying status and details.
pub fn status_to_error(status: u16, body: &str, action: &str) -> RelayError {
    let details = ErrorDetails::from_body(body);
    let mut message = format!("Failed to {action}, HTTP code: {status}");
    if let Some(remote) = details.as_ref().and_then(|d| d.message.as_deref()) {
        message.push_str(&format!(" ({remote})"));
    }
    RelayError::Api {
        status,
        message,
        details,
    }
}
