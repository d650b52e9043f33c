//! Unified error classification.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Validation,
    Configuration,
    Storage,
    Serialization,
}

/// Structured details returned by the REST API on failure.
///
/// The platform answers errors with `{"errorCode": "...", "message": "..."}`;
/// either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorDetails {
    /// Parse details out of a raw response body, if it is a JSON error payload.
    pub fn from_body(body: &str) -> Option<Self> {
        let details: Self = serde_json::from_str(body).ok()?;
        if details.error_code.is_none() && details.message.is_none() {
            return None;
        }
        Some(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_code_and_message() {
        let details =
            ErrorDetails::from_body(r#"{"errorCode":"CMN-102","message":"Resource not found"}"#)
                .unwrap();
        assert_eq!(details.error_code.as_deref(), Some("CMN-102"));
        assert_eq!(details.message.as_deref(), Some("Resource not found"));
    }

    #[test]
    fn non_error_bodies_yield_none() {
        assert!(ErrorDetails::from_body("<html>bad gateway</html>").is_none());
        assert!(ErrorDetails::from_body(r#"{"records":[]}"#).is_none());
    }
}
