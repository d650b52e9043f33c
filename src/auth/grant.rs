//! OAuth grant selection and request bodies.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use strum::{Display, EnumString};

use super::error::AuthError;
use super::token::Credential;
use crate::config::AuthConfig;

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Grant mechanism used for one token exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GrantKind {
    JwtBearer,
    Password,
    RefreshToken,
}

/// A fully resolved grant, ready to be form-encoded.
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    JwtBearer {
        assertion: String,
    },
    Password {
        username: String,
        password: String,
        extension: Option<String>,
    },
    RefreshToken {
        refresh_token: String,
    },
}

impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Grant::{}", self.kind())
    }
}

impl Grant {
    /// Pick the grant by fixed priority: JWT → password → refresh token.
    pub fn select(config: &AuthConfig, cached: Option<&Credential>) -> Result<Self, AuthError> {
        if let Some(assertion) = config.jwt() {
            return Ok(Self::JwtBearer {
                assertion: assertion.to_string(),
            });
        }
        if let Some((username, password)) = config.password_credentials() {
            return Ok(Self::Password {
                username: username.to_string(),
                password: password.to_string(),
                extension: config.extension().map(str::to_string),
            });
        }
        if let Some(refresh_token) = cached
            .and_then(|c| c.refresh_token.as_deref())
            .filter(|t| !t.is_empty())
        {
            return Ok(Self::RefreshToken {
                refresh_token: refresh_token.to_string(),
            });
        }
        Err(AuthError::NoAuthMethodAvailable)
    }

    pub fn kind(&self) -> GrantKind {
        match self {
            Self::JwtBearer { .. } => GrantKind::JwtBearer,
            Self::Password { .. } => GrantKind::Password,
            Self::RefreshToken { .. } => GrantKind::RefreshToken,
        }
    }

    /// Form fields for the token endpoint.
    pub fn form(&self, config: &AuthConfig) -> Vec<(&'static str, String)> {
        match self {
            Self::JwtBearer { assertion } => vec![
                ("grant_type", JWT_BEARER_GRANT.to_string()),
                ("assertion", assertion.clone()),
            ],
            Self::Password {
                username,
                password,
                extension,
            } => {
                let mut form = vec![
                    ("grant_type", "password".to_string()),
                    ("username", username.clone()),
                    ("password", password.clone()),
                ];
                if let Some(extension) = extension {
                    form.push(("extension", extension.clone()));
                }
                form.push(("client_id", config.client_id.clone()));
                form.push(("client_secret", config.client_secret.clone()));
                form
            }
            Self::RefreshToken { refresh_token } => vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token.clone()),
                ("client_id", config.client_id.clone()),
                ("client_secret", config.client_secret.clone()),
            ],
        }
    }
}

/// `Basic base64(client_id:client_secret)`.
pub fn basic_auth_header(config: &AuthConfig) -> String {
    let raw = format!("{}:{}", config.client_id, config.client_secret);
    format!("Basic {}", STANDARD.encode(raw))
}
