//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chatrelay::auth::{Authenticator, InMemoryTokenStore, TokenStore};
use chatrelay::client::MessagingClient;
use chatrelay::config::AuthConfig;
use chatrelay::types::RemoteMessage;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "cid";
pub const CLIENT_SECRET: &str = "csecret";
/// `base64("cid:csecret")`.
pub const BASIC_AUTH: &str = "Basic Y2lkOmNzZWNyZXQ=";
pub const TEAM_CHAT_ID: &str = "147193044998";

pub fn jwt_config(server: &MockServer) -> AuthConfig {
    AuthConfig::new(server.uri(), CLIENT_ID, CLIENT_SECRET).with_jwt("JWT-ASSERTION")
}

pub fn authenticator(config: AuthConfig, store: Arc<dyn TokenStore>) -> Arc<Authenticator> {
    Arc::new(Authenticator::new(config, store))
}

/// Client authenticated by JWT against `server`, backed by `store`.
pub fn jwt_client(server: &MockServer, store: Arc<InMemoryTokenStore>) -> MessagingClient {
    MessagingClient::new(authenticator(jwt_config(server), store))
}

pub fn token_body(access_token: &str, expires_in: i64) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "refresh_token": format!("{access_token}-refresh"),
        "refresh_token_expires_in": 604800,
        "scope": "TeamMessaging WebhookSubscriptions"
    })
}

/// Token endpoint accepting only the JWT-bearer grant, expected `times` times.
pub async fn mount_jwt_token(server: &MockServer, access_token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/restapi/oauth/token"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_string_contains("assertion=JWT-ASSERTION"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token, 3600)))
        .expect(times)
        .mount(server)
        .await;
}

pub fn post(id: &str, text: &str, creator: &str) -> RemoteMessage {
    RemoteMessage::new(id, text, creator)
}

pub fn posts_page(posts: &[serde_json::Value]) -> serde_json::Value {
    json!({ "records": posts, "navigation": {} })
}

pub fn post_json(id: &str, text: &str, creator: &str) -> serde_json::Value {
    json!({
        "id": id,
        "groupId": TEAM_CHAT_ID,
        "type": "TextMessage",
        "text": text,
        "creatorId": creator,
        "creationTime": "2025-05-20T14:03:11.123Z"
    })
}
