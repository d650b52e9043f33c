mod common;

use std::sync::Arc;

use chatrelay::auth::{AuthError, Credential, FileTokenStore, GrantKind, InMemoryTokenStore, TokenStore};
use chatrelay::config::AuthConfig;
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{any, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{authenticator, jwt_config, mount_jwt_token, token_body, CLIENT_ID, CLIENT_SECRET};

#[tokio::test]
async fn jwt_grant_wins_over_password() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("POST"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("WRONG", 3600)))
        .expect(0)
        .mount(&server)
        .await;

    let config = jwt_config(&server).with_password("agent@example.com", "pw", None);
    let store = Arc::new(InMemoryTokenStore::new());
    let auth = authenticator(config, store.clone());

    let before = Utc::now();
    let credential = auth.authenticate(None).await.expect("jwt grant");

    assert_eq!(credential.access_token, "T1");
    assert_eq!(credential.refresh_token.as_deref(), Some("T1-refresh"));
    let lifetime = (credential.expires_at - before).num_seconds();
    assert!((3535..=3541).contains(&lifetime), "lifetime {lifetime}");
    assert_eq!(store.load(), Some(credential));
}

#[tokio::test]
async fn password_grant_sends_extension_and_client_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/restapi/oauth/token"))
        .and(header("x-ringcentral-api-group", "medium"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=%2B16505550100"))
        .and(body_string_contains("extension=101"))
        .and(body_string_contains("client_id=cid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("P1", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let config = AuthConfig::new(server.uri(), CLIENT_ID, CLIENT_SECRET).with_password(
        "+16505550100",
        "secret",
        Some("101".to_string()),
    );
    let auth = authenticator(config, Arc::new(InMemoryTokenStore::new()));
    let credential = auth.ensure_authenticated().await.expect("password grant");
    assert_eq!(credential.access_token, "P1");
}

#[tokio::test]
async fn ok_status_without_access_token_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/restapi/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token is expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryTokenStore::new());
    let auth = authenticator(jwt_config(&server), store.clone());
    let err = auth.authenticate(None).await.unwrap_err();

    assert_eq!(
        err,
        AuthError::Rejected {
            status: 200,
            code: Some("invalid_grant".into()),
            description: Some("Token is expired".into()),
        }
    );
    assert!(store.load().is_none());

    let last = auth.last_error().expect("failure recorded");
    assert_eq!(last.grant, Some(GrantKind::JwtBearer));
    assert_eq!(last.http_status, Some(200));
    assert_eq!(last.description.as_deref(), Some("Token is expired"));
}

#[tokio::test]
async fn refresh_grant_uses_cached_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/restapi/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T2", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let stale = Credential::new("T0", Some("R0".into()), Utc::now() - Duration::minutes(5));
    let store = Arc::new(InMemoryTokenStore::with_credential(stale));
    let config = AuthConfig::new(server.uri(), CLIENT_ID, CLIENT_SECRET);
    let auth = authenticator(config, store.clone());

    let credential = auth.ensure_authenticated().await.expect("refresh grant");
    assert_eq!(credential.access_token, "T2");
    assert_eq!(store.load().unwrap().refresh_token.as_deref(), Some("T2-refresh"));
}

#[tokio::test]
async fn refresh_failure_is_reported_once_without_retry() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Refresh token has expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stale = Credential::new("T0", Some("R0".into()), Utc::now() - Duration::minutes(5));
    let auth = authenticator(
        AuthConfig::new(server.uri(), CLIENT_ID, CLIENT_SECRET),
        Arc::new(InMemoryTokenStore::new()),
    );
    let err = auth.authenticate(Some(&stale)).await.unwrap_err();

    assert_eq!(err.remote_description(), Some("Refresh token has expired"));
    let history = auth.auth_error_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].grant, Some(GrantKind::RefreshToken));
}

#[tokio::test]
async fn transport_failure_is_recorded() {
    // Nothing listens on port 1.
    let config = AuthConfig::new("http://127.0.0.1:1", CLIENT_ID, CLIENT_SECRET).with_jwt("JWT");
    let auth = authenticator(config, Arc::new(InMemoryTokenStore::new()));
    let err = auth.authenticate(None).await.unwrap_err();
    assert!(matches!(err, AuthError::Transport(_)));
    assert_eq!(auth.last_error().unwrap().http_status, None);
}

#[tokio::test]
async fn file_cache_is_shared_between_authenticators() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("ringcentral_token.json");

    let first = authenticator(jwt_config(&server), Arc::new(FileTokenStore::new(&path)));
    assert_eq!(first.ensure_authenticated().await.unwrap().access_token, "T1");

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["access_token"], "T1");
    assert!(raw["expires_at"].is_i64());

    // Second process reuses the cached token; the mock's expect(1) enforces no new grant.
    let second = authenticator(jwt_config(&server), Arc::new(FileTokenStore::new(&path)));
    assert_eq!(second.ensure_authenticated().await.unwrap().access_token, "T1");
}

#[tokio::test]
async fn is_authenticated_reports_missing_method() {
    let auth = authenticator(
        AuthConfig::new("http://127.0.0.1:1", CLIENT_ID, CLIENT_SECRET),
        Arc::new(InMemoryTokenStore::new()),
    );
    assert!(!auth.is_authenticated().await);
    assert_eq!(
        auth.last_error().unwrap().message,
        AuthError::NoAuthMethodAvailable.to_string()
    );
}

#[tokio::test]
async fn failed_cache_write_still_returns_credential() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 2).await;

    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "file, not a directory").unwrap();
    let store = Arc::new(FileTokenStore::new(blocker.join("ringcentral_token.json")));
    let auth = authenticator(jwt_config(&server), store.clone());

    let credential = auth.authenticate(None).await.expect("fresh credential");
    assert_eq!(credential.access_token, "T1");
    assert!(store.load().is_none());
    assert!(auth.auth_error_history().is_empty());

    // Nothing was cached, so the next call goes back to the token endpoint.
    assert_eq!(auth.ensure_authenticated().await.unwrap().access_token, "T1");
}
