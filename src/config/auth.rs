//! Immutable authentication settings.

use std::fmt;

use serde::Deserialize;

pub const DEFAULT_SERVER_URL: &str = "https://platform.ringcentral.com";

/// How the relay authenticates against the platform's OAuth endpoint.
///
/// Built once and handed to the [`Authenticator`](crate::auth::Authenticator);
/// there is no ambient global copy.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub server_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub jwt_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub extension: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            jwt_token: None,
            username: None,
            password: None,
            extension: None,
        }
    }
}

impl AuthConfig {
    pub fn new(
        server_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    pub fn with_jwt(mut self, assertion: impl Into<String>) -> Self {
        self.jwt_token = Some(assertion.into());
        self
    }

    pub fn with_password(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        extension: Option<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self.extension = extension;
        self
    }

    pub fn jwt(&self) -> Option<&str> {
        non_empty(&self.jwt_token)
    }

    /// Username and password, only when both are present.
    pub fn password_credentials(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.username)?, non_empty(&self.password)?))
    }

    pub fn extension(&self) -> Option<&str> {
        non_empty(&self.extension)
    }

    /// `{server}/restapi/oauth/token`.
    pub fn token_endpoint(&self) -> String {
        format!("{}/restapi/oauth/token", self.server_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("server_url", &self.server_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(Some(&self.client_secret)))
            .field("jwt_token", &redact(self.jwt_token.as_ref()))
            .field("username", &self.username)
            .field("password", &redact(self.password.as_ref()))
            .field("extension", &self.extension)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn redact(value: Option<&String>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "<redacted>",
        _ => "<unset>",
    }
}
