//! Configuration system (layered: defaults > TOML file > environment).

pub mod auth;

pub use auth::{AuthConfig, DEFAULT_SERVER_URL};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::auth::store::default_token_path;
use crate::error::RelayError;

/// Header selecting the platform's rate-limit group for a request.
pub const API_GROUP_HEADER: &str = "X-RingCentral-API-Group";

pub const DEFAULT_SYSTEM_MARKER: &str = "[SYSTEM_MESSAGE]";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Named rate-limit tier attached to every request.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ApiGroup {
    Light,
    #[default]
    Medium,
    Heavy,
    Auth,
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub auth: AuthConfig,
    pub token_path: PathBuf,
    pub default_chat_id: Option<String>,
    pub api_group: ApiGroup,
    pub request_timeout: Duration,
    pub auth_timeout: Duration,
    pub self_user_id: Option<String>,
    pub system_marker: String,
    pub database_path: Option<PathBuf>,
    pub webhook_address: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            token_path: default_token_path(),
            default_chat_id: None,
            api_group: ApiGroup::default(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            auth_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            self_user_id: None,
            system_marker: DEFAULT_SYSTEM_MARKER.to_string(),
            database_path: None,
            webhook_address: None,
        }
    }
}

/// On-disk TOML shape; every field is optional and overlays the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    auth: Option<AuthConfig>,
    token_path: Option<PathBuf>,
    default_chat_id: Option<String>,
    api_group: Option<ApiGroup>,
    request_timeout_secs: Option<u64>,
    auth_timeout_secs: Option<u64>,
    self_user_id: Option<String>,
    system_marker: Option<String>,
    database_path: Option<PathBuf>,
    webhook_address: Option<String>,
}

impl RelayConfig {
    /// Defaults overlaid with environment variables (and `.env`, if present).
    pub fn from_env() -> Result<Self, RelayError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults, then the optional TOML file, then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, RelayError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Some(path) = path {
            let raw = fs::read_to_string(path).map_err(|err| {
                RelayError::Configuration(format!("Cannot read {}: {err}", path.display()))
            })?;
            config.apply_toml(&raw)?;
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from a TOML document.
    pub fn apply_toml(&mut self, raw: &str) -> Result<(), RelayError> {
        let file: FileConfig = toml::from_str(raw)
            .map_err(|err| RelayError::Configuration(format!("Invalid config file: {err}")))?;
        if let Some(auth) = file.auth {
            self.auth = auth;
        }
        if let Some(path) = file.token_path {
            self.token_path = path;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.auth_timeout_secs {
            self.auth_timeout = Duration::from_secs(secs);
        }
        if let Some(group) = file.api_group {
            self.api_group = group;
        }
        if let Some(marker) = file.system_marker {
            self.system_marker = marker;
        }
        self.default_chat_id = file.default_chat_id.or(self.default_chat_id.take());
        self.self_user_id = file.self_user_id.or(self.self_user_id.take());
        self.database_path = file.database_path.or(self.database_path.take());
        self.webhook_address = file.webhook_address.or(self.webhook_address.take());
        Ok(())
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("RINGCENTRAL_SERVER") {
            self.auth.server_url = url;
        }
        if let Some(id) = get("RINGCENTRAL_CLIENT_ID") {
            self.auth.client_id = id;
        }
        if let Some(secret) = get("RINGCENTRAL_CLIENT_SECRET") {
            self.auth.client_secret = secret;
        }
        if let Some(jwt) = get("RINGCENTRAL_JWT_TOKEN") {
            self.auth.jwt_token = Some(jwt);
        }
        if let Some(username) = get("RINGCENTRAL_USERNAME") {
            self.auth.username = Some(username);
        }
        if let Some(password) = get("RINGCENTRAL_PASSWORD") {
            self.auth.password = Some(password);
        }
        if let Some(extension) = get("RINGCENTRAL_EXTENSION") {
            self.auth.extension = Some(extension);
        }
        if let Some(chat_id) = get("RINGCENTRAL_TEAM_CHAT_ID") {
            self.default_chat_id = Some(chat_id);
        }
        if let Some(group) = get("RINGCENTRAL_API_GROUP") {
            self.api_group = group.parse().map_err(|_| {
                RelayError::Configuration(format!(
                    "Unknown API group '{group}' (expected light, medium, heavy or auth)"
                ))
            })?;
        }
        if let Some(path) = get("RINGCENTRAL_TOKEN_PATH") {
            self.token_path = PathBuf::from(path);
        }
        if let Some(user_id) = get("RINGCENTRAL_SELF_USER_ID") {
            self.self_user_id = Some(user_id);
        }
        if let Some(path) = get("CHATRELAY_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(address) = get("CHATRELAY_WEBHOOK_ADDRESS") {
            self.webhook_address = Some(address);
        }
        if let Some(marker) = get("CHATRELAY_SYSTEM_MARKER") {
            self.system_marker = marker;
        }
        Ok(())
    }
}
