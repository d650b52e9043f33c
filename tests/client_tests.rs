mod common;

use std::sync::Arc;

use chatrelay::auth::{InMemoryTokenStore, TokenStore};
use chatrelay::client::{
    DeliveryMode, MessagingClient, SubscriptionOutcome, SubscriptionSpec, POSTS_EVENT_FILTER,
};
use chatrelay::config::{ApiGroup, AuthConfig};
use chatrelay::error::RelayError;
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    authenticator, jwt_client, mount_jwt_token, post_json, posts_page, CLIENT_ID, CLIENT_SECRET,
    TEAM_CHAT_ID,
};

const HOOK: &str = "https://relay.example.com/chat/api/webhook.php";

fn subscription_json(id: &str, address: &str) -> serde_json::Value {
    json!({
        "id": id,
        "status": "Active",
        "eventFilters": [POSTS_EVENT_FILTER],
        "deliveryMode": {"transportType": "WebHook", "address": address},
        "expiresIn": 7776000,
        "expirationTime": "2025-08-18T14:03:11.000Z"
    })
}

#[tokio::test]
async fn second_call_reuses_cached_token() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("GET"))
        .and(path("/restapi/v1.0/glip/teams"))
        .and(header("authorization", "Bearer T1"))
        .and(header("x-ringcentral-api-group", "medium"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": TEAM_CHAT_ID, "type": "Team", "name": "Website Chat"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryTokenStore::new());
    let client = jwt_client(&server, store.clone());

    let chats = client.list_chats(None).await.expect("first call");
    assert_eq!(chats.records[0].id, TEAM_CHAT_ID);
    assert_eq!(chats.records[0].name.as_deref(), Some("Website Chat"));

    let cached = store.load().expect("token cached");
    let remaining = (cached.expires_at - Utc::now()).num_seconds();
    assert!((3530..=3540).contains(&remaining), "remaining {remaining}");

    client.list_chats(None).await.expect("second call");
}

#[tokio::test]
async fn list_chats_passes_type_filter() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("GET"))
        .and(path("/restapi/v1.0/glip/teams"))
        .and(query_param("type", "Team"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    assert!(client.list_chats(Some("Team")).await.unwrap().records.is_empty());
}

#[tokio::test]
async fn empty_chat_id_posts_to_default_chat() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("POST"))
        .and(path(format!("/restapi/v1.0/glip/chats/{TEAM_CHAT_ID}/posts")))
        .and(body_json(json!({"text": "hello"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(post_json("5852056583", "hello", "63395585031")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()))
        .with_default_chat_id(Some(TEAM_CHAT_ID.to_string()));
    let post = client.post_message("", "hello", None).await.expect("posted");
    assert_eq!(post.remote_id(), Some("5852056583"));
}

#[tokio::test]
async fn missing_chat_id_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    let err = client.post_message("", "hello", None).await.unwrap_err();
    assert!(matches!(err, RelayError::MissingChatId));
    assert!(matches!(
        client.get_messages("", 10).await,
        Err(RelayError::MissingChatId)
    ));
}

#[tokio::test]
async fn get_messages_sends_record_count() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("GET"))
        .and(path("/restapi/v1.0/glip/chats/42/posts"))
        .and(query_param("recordCount", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_page(&[
            post_json("p2", "second", "agent-1"),
            post_json("p1", "first", "agent-1"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    let posts = client.get_messages("42", 25).await.unwrap();
    let ids: Vec<_> = posts.iter().filter_map(|p| p.remote_id()).collect();
    assert_eq!(ids, vec!["p2", "p1"]);
}

#[tokio::test]
async fn non_success_status_is_structured_error() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("GET"))
        .and(path("/restapi/v1.0/glip/teams"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "errorCode": "CMN-211",
            "message": "Service temporary unavailable"
        })))
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    let err = client.list_chats(None).await.unwrap_err();
    assert_eq!(err.http_status(), Some(503));
    assert!(err.is_retryable());
    match err {
        RelayError::Api { details, .. } => {
            assert_eq!(details.unwrap().error_code.as_deref(), Some("CMN-211"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn auth_rejection_skips_rest_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/restapi/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Invalid client"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/restapi/v1.0/glip/teams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(0)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    let err = client.list_chats(None).await.unwrap_err();
    assert_eq!(err.http_status(), Some(401));
    assert!(!err.is_retryable());
    assert!(matches!(err, RelayError::Authentication(_)));
}

#[tokio::test]
async fn configured_api_group_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/restapi/oauth/token"))
        .and(header("x-ringcentral-api-group", "heavy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::token_body("T1", 3600)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/restapi/v1.0/subscription"))
        .and(header("x-ringcentral-api-group", "heavy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(1)
        .mount(&server)
        .await;

    let config = AuthConfig::new(server.uri(), CLIENT_ID, CLIENT_SECRET).with_jwt("JWT-ASSERTION");
    let auth = chatrelay::auth::Authenticator::new(config, Arc::new(InMemoryTokenStore::new()))
        .with_api_group(ApiGroup::Heavy);
    let client = MessagingClient::new(Arc::new(auth)).with_api_group(ApiGroup::Heavy);
    assert!(client.list_subscriptions().await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_subscription_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    let spec = SubscriptionSpec {
        event_filters: None,
        delivery_mode: Some(DeliveryMode {
            transport_type: Some("WebHook".into()),
            address: None,
        }),
        expires_in: None,
    };
    let err = client.create_subscription(&spec).await.unwrap_err();
    assert!(matches!(err, RelayError::Validation(msg) if msg.contains("eventFilters")));

    let spec = SubscriptionSpec {
        event_filters: Some(vec![POSTS_EVENT_FILTER.into()]),
        ..spec
    };
    let err = client.create_subscription(&spec).await.unwrap_err();
    assert!(
        matches!(err, RelayError::Validation(msg) if msg == "deliveryMode.address is required for WebHook transport")
    );
}

#[tokio::test]
async fn delete_subscription_accepts_204() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("DELETE"))
        .and(path("/restapi/v1.0/subscription/sub-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/restapi/v1.0/subscription/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorCode": "SUB-104",
            "message": "Subscription not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    assert!(client.delete_subscription("sub-1").await.unwrap());
    let err = client.delete_subscription("missing").await.unwrap_err();
    assert_eq!(err.http_status(), Some(404));
}

#[tokio::test]
async fn ensure_webhook_renews_matching_subscription() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("GET"))
        .and(path("/restapi/v1.0/subscription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                subscription_json("other", "https://elsewhere.example.com/hook"),
                subscription_json("sub-1", HOOK)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/restapi/v1.0/subscription/sub-1"))
        .and(body_json(json!({
            "eventFilters": [POSTS_EVENT_FILTER],
            "expiresIn": 7776000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscription_json("sub-1", HOOK)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/restapi/v1.0/subscription"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    let outcome = client
        .ensure_webhook_subscription(HOOK, &[POSTS_EVENT_FILTER.to_string()])
        .await
        .unwrap();
    assert!(matches!(&outcome, SubscriptionOutcome::Renewed(s) if s.id == "sub-1"));
}

#[tokio::test]
async fn ensure_webhook_creates_when_renewal_fails() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("GET"))
        .and(path("/restapi/v1.0/subscription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [subscription_json("sub-1", HOOK)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/restapi/v1.0/subscription/sub-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/restapi/v1.0/subscription"))
        .and(body_json(json!({
            "eventFilters": [POSTS_EVENT_FILTER],
            "deliveryMode": {"transportType": "WebHook", "address": HOOK},
            "expiresIn": 7776000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscription_json("sub-2", HOOK)))
        .expect(1)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    let outcome = client
        .ensure_webhook_subscription(HOOK, &[POSTS_EVENT_FILTER.to_string()])
        .await
        .unwrap();
    assert!(matches!(&outcome, SubscriptionOutcome::Created(s) if s.id == "sub-2"));
    assert_eq!(outcome.subscription().delivery_mode.address.as_deref(), Some(HOOK));
}

#[tokio::test]
async fn create_team_and_get_team() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("POST"))
        .and(path("/restapi/v1.0/glip/teams"))
        .and(body_json(json!({
            "name": "Support",
            "description": "Website visitors",
            "members": [{"email": "agent@example.com"}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "900", "type": "Team", "name": "Support"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/restapi/v1.0/glip/teams/900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "900", "type": "Team", "name": "Support", "status": "Active"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()))
        .with_default_chat_id(Some("900".into()));
    let team = client
        .create_team(
            "Support",
            "Website visitors",
            &[chatrelay::client::TeamMember::email("agent@example.com")],
        )
        .await
        .unwrap();
    assert_eq!(team.id, "900");
    let fetched = client.get_team("").await.unwrap();
    assert_eq!(fetched.status.as_deref(), Some("Active"));
}

#[tokio::test]
async fn access_token_authenticates_lazily() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T9", 1).await;
    let store = Arc::new(InMemoryTokenStore::new());
    let client = MessagingClient::new(authenticator(common::jwt_config(&server), store));
    assert!(client.is_authenticated().await);
    assert_eq!(client.access_token().await.unwrap(), "T9");
}

#[tokio::test]
async fn out_of_range_expires_in_is_an_error_not_a_panic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/restapi/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T1",
            "expires_in": 9_000_000_000_000_000_000_i64
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryTokenStore::new());
    let client = jwt_client(&server, store.clone());
    let err = client.access_token().await.unwrap_err();

    assert!(matches!(
        err,
        RelayError::Authentication(chatrelay::auth::AuthError::InvalidResponse(_))
    ));
    assert!(store.load().is_none());
    assert!(client.authenticator().last_error().is_some());
}

#[tokio::test]
async fn chat_id_is_escaped_as_a_single_path_segment() {
    let server = MockServer::start().await;
    mount_jwt_token(&server, "T1", 1).await;
    Mock::given(method("POST"))
        .and(path("/restapi/v1.0/glip/chats/..%2Fteams%3Fx%3D1/posts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(post_json("p1", "hi", "me")))
        .expect(1)
        .mount(&server)
        .await;

    let client = jwt_client(&server, Arc::new(InMemoryTokenStore::new()));
    let post = client.post_message("../teams?x=1", "hi", None).await.unwrap();
    assert_eq!(post.id.as_deref(), Some("p1"));
}
