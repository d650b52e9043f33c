use thiserror::Error;

/// Failures while obtaining or caching a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No valid authentication method available")]
    NoAuthMethodAvailable,
    #[error("Token request rejected (status {status}): {}", describe(.code, .description))]
    Rejected {
        status: u16,
        code: Option<String>,
        description: Option<String>,
    },
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Token storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Remote error code (`error` field of the token response), if any.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Remote error description (`error_description`), if any.
    pub fn remote_description(&self) -> Option<&str> {
        match self {
            Self::Rejected { description, .. } => description.as_deref(),
            _ => None,
        }
    }
}

fn describe(code: &Option<String>, description: &Option<String>) -> String {
    match (code, description) {
        (_, Some(description)) => description.clone(),
        (Some(code), None) => code.clone(),
        (None, None) => "Unknown error".to_string(),
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_message_prefers_description() {
        let err = AuthError::Rejected {
            status: 400,
            code: Some("invalid_grant".into()),
            description: Some("Token is expired".into()),
        };
        assert_eq!(
            err.to_string(),
            "Token request rejected (status 400): Token is expired"
        );
        assert_eq!(err.remote_code(), Some("invalid_grant"));
    }

    #[test]
    fn rejected_message_falls_back_to_code_then_unknown() {
        let with_code = AuthError::Rejected {
            status: 401,
            code: Some("unauthorized_client".into()),
            description: None,
        };
        assert!(with_code.to_string().ends_with("unauthorized_client"));

        let bare = AuthError::Rejected {
            status: 502,
            code: None,
            description: None,
        };
        assert!(bare.to_string().ends_with("Unknown error"));
    }
}
