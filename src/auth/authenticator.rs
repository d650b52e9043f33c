use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::grant::{basic_auth_header, Grant, GrantKind};
use super::store::TokenStore;
use super::token::Credential;
use crate::client::http::build_client;
use crate::config::{ApiGroup, AuthConfig, API_GROUP_HEADER};

pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_HISTORY: usize = 50;

/// One recorded authentication failure, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthFailure {
    pub at: DateTime<Utc>,
    pub grant: Option<GrantKind>,
    pub http_status: Option<u16>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub message: String,
}

/// Exchanges configured credentials for bearer tokens.
///
/// A cached credential that is still valid is returned without any network
/// call. Otherwise one grant is attempted, chosen by [`Grant::select`]; a
/// failed refresh-token grant is reported as-is and does not fall through to
/// another grant type within the same call.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use chatrelay::auth::{Authenticator, FileTokenStore};
/// use chatrelay::config::AuthConfig;
///
/// # async fn run() -> Result<(), chatrelay::auth::AuthError> {
/// let config = AuthConfig::new("https://platform.ringcentral.com", "id", "secret").with_jwt("eyJ...");
/// let auth = Authenticator::new(config, Arc::new(FileTokenStore::new_default()));
/// let credential = auth.ensure_authenticated().await?;
/// println!("token valid until {}", credential.expires_at);
/// # Ok(())
/// # }
/// ```
pub struct Authenticator {
    config: AuthConfig,
    store: Arc<dyn TokenStore>,
    http: reqwest::Client,
    api_group: ApiGroup,
    history: Mutex<VecDeque<AuthFailure>>,
}

impl Authenticator {
    pub fn new(config: AuthConfig, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            store,
            http: build_client(DEFAULT_AUTH_TIMEOUT),
            api_group: ApiGroup::default(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = build_client(timeout);
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn with_api_group(mut self, api_group: ApiGroup) -> Self {
        self.api_group = api_group;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Load the cached credential and authenticate against it.
    pub async fn ensure_authenticated(&self) -> Result<Credential, AuthError> {
        let cached = self.store.load();
        self.authenticate(cached.as_ref()).await
    }

    /// Return `cached` if still valid, otherwise perform one grant exchange.
    pub async fn authenticate(&self, cached: Option<&Credential>) -> Result<Credential, AuthError> {
        if let Some(credential) = cached.filter(|c| self.store.is_valid(c)) {
            tracing::debug!(expires_at = %credential.expires_at, "Reusing cached credential");
            return Ok(credential.clone());
        }

        let grant = match Grant::select(&self.config, cached) {
            Ok(grant) => grant,
            Err(err) => {
                self.record(None, &err);
                return Err(err);
            }
        };
        let kind = grant.kind();
        tracing::debug!(grant = %kind, "Requesting access token");

        match self.exchange(&grant).await {
            Ok(credential) => {
                if !self.store.save(&credential) {
                    tracing::warn!("Token cache not updated; next call will re-authenticate");
                }
                tracing::info!(grant = %kind, expires_at = %credential.expires_at, "Authenticated");
                Ok(credential)
            }
            Err(err) => {
                tracing::warn!(grant = %kind, error = %err, "Authentication failed");
                self.record(Some(kind), &err);
                Err(err)
            }
        }
    }

    /// Whether a valid credential is cached or can be obtained now.
    pub async fn is_authenticated(&self) -> bool {
        self.ensure_authenticated().await.is_ok()
    }

    /// Most recent failure, if any.
    pub fn last_error(&self) -> Option<AuthFailure> {
        self.history.lock().ok()?.back().cloned()
    }

    /// Recorded failures, oldest first (bounded to the most recent 50).
    pub fn auth_error_history(&self) -> Vec<AuthFailure> {
        self.history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn exchange(&self, grant: &Grant) -> Result<Credential, AuthError> {
        let resp = self
            .http
            .post(self.config.token_endpoint())
            .header(AUTHORIZATION, basic_auth_header(&self.config))
            .header(ACCEPT, "application/json")
            .header(API_GROUP_HEADER, self.api_group.to_string())
            .form(&grant.form(&self.config))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        let issued_at = Utc::now();

        let payload: Option<TokenResponse> = serde_json::from_str(&body).ok();
        match payload {
            Some(TokenResponse {
                access_token: Some(access_token),
                refresh_token,
                expires_in,
                ..
            }) if status == 200 && !access_token.is_empty() => {
                let expires_in = expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
                Credential::issued(access_token, refresh_token, expires_in, issued_at).ok_or_else(
                    || AuthError::InvalidResponse(format!("expires_in out of range: {expires_in}")),
                )
            }
            Some(payload) => Err(AuthError::Rejected {
                status,
                code: payload.error,
                description: payload.error_description,
            }),
            None if status == 200 => Err(AuthError::InvalidResponse(
                "token endpoint returned a non-JSON body".to_string(),
            )),
            None => Err(AuthError::Rejected {
                status,
                code: None,
                description: None,
            }),
        }
    }

    fn record(&self, grant: Option<GrantKind>, err: &AuthError) {
        let (http_status, code, description) = match err {
            AuthError::Rejected {
                status,
                code,
                description,
            } => (Some(*status), code.clone(), description.clone()),
            _ => (None, None, None),
        };
        let failure = AuthFailure {
            at: Utc::now(),
            grant,
            http_status,
            code,
            description,
            message: err.to_string(),
        };
        if let Ok(mut history) = self.history.lock() {
            if history.len() == MAX_HISTORY {
                history.pop_front();
            }
            history.push_back(failure);
        }
    }
}

const DEFAULT_EXPIRES_IN: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}
