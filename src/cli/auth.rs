//! `chatrelay auth` handlers.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::{Authenticator, FileTokenStore, TokenStore};
use crate::config::RelayConfig;
use crate::error::RelayError;

fn authenticator(config: &RelayConfig) -> Authenticator {
    Authenticator::new(
        config.auth.clone(),
        Arc::new(FileTokenStore::new(config.token_path.clone())),
    )
    .with_timeout(config.auth_timeout)
    .with_api_group(config.api_group)
}

/// Handle `chatrelay auth status`.
pub fn handle_status(config: &RelayConfig) -> Result<(), RelayError> {
    let store = FileTokenStore::new(config.token_path.clone());
    println!("🔐 Authentication Status\n");
    println!("  Server: {}", config.auth.server_url);
    println!("  Cache:  {}", store.path().display());

    let status = match store.read()? {
        Some(credential) if store.is_valid(&credential) => format!(
            "✅ Valid (expires {})",
            credential.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        Some(credential) if credential.has_refresh_token() => {
            "⚠️  Expired (refresh token available)".to_string()
        }
        Some(_) => "⚠️  Expired".to_string(),
        None => "❌ No cached credential".to_string(),
    };
    println!("  Token:  {status}");

    let method = if config.auth.jwt().is_some() {
        "JWT bearer"
    } else if config.auth.password_credentials().is_some() {
        "password"
    } else {
        "none configured"
    };
    println!("  Grant:  {method}");
    Ok(())
}

/// Handle `chatrelay auth login`.
pub async fn handle_login(config: &RelayConfig) -> Result<(), RelayError> {
    let credential = authenticator(config).ensure_authenticated().await?;
    let remaining = (credential.expires_at - Utc::now()).num_minutes();
    println!("✅ Authenticated (token valid for {remaining} more minutes)");
    Ok(())
}

/// Handle `chatrelay auth logout`.
pub fn handle_logout(config: &RelayConfig) -> Result<(), RelayError> {
    let store = FileTokenStore::new(config.token_path.clone());
    if !store.clear() {
        return Err(RelayError::Storage(format!(
            "Cannot remove {}",
            store.path().display()
        )));
    }
    println!("✅ Cached credential removed");
    Ok(())
}

/// Handle `chatrelay auth errors`.
pub async fn handle_errors(config: &RelayConfig) -> Result<(), RelayError> {
    let auth = authenticator(config);
    if auth.ensure_authenticated().await.is_ok() {
        println!("✅ Authenticated; no failures recorded");
        return Ok(());
    }
    let history = auth.auth_error_history();
    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}
