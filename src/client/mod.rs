//! Authenticated REST client for the team-messaging API.

pub mod http;
pub mod types;

pub use types::{
    Chat, ChatList, DeliveryMode, Subscription, SubscriptionOutcome, SubscriptionSpec, TeamMember,
    MAX_SUBSCRIPTION_EXPIRES_IN, POSTS_EVENT_FILTER, WEBHOOK_TRANSPORT,
};

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::auth::{Authenticator, FileTokenStore};
use crate::config::{ApiGroup, RelayConfig};
use crate::error::{RelayError, Result};
use crate::types::RemoteMessage;

use self::http::{bearer_headers, build_client, path_segment, status_to_error};
use self::types::{NewPost, NewTeam, Records, RenewSubscription};

const API_PREFIX: &str = "/restapi/v1.0";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin REST facade that attaches a valid bearer token to every call.
///
/// Each operation authenticates first and returns an
/// [`RelayError::Authentication`] without touching the REST endpoint when
/// that fails.
pub struct MessagingClient {
    auth: Arc<Authenticator>,
    http: reqwest::Client,
    server_url: String,
    default_chat_id: Option<String>,
    api_group: ApiGroup,
}

impl MessagingClient {
    pub fn new(auth: Arc<Authenticator>) -> Self {
        let server_url = auth.config().server_url.trim_end_matches('/').to_string();
        Self {
            auth,
            http: build_client(DEFAULT_REQUEST_TIMEOUT),
            server_url,
            default_chat_id: None,
            api_group: ApiGroup::default(),
        }
    }

    /// Wire up an authenticator, file token cache, and client from configuration.
    pub fn from_config(config: &RelayConfig) -> Self {
        let store = Arc::new(FileTokenStore::new(config.token_path.clone()));
        let auth = Authenticator::new(config.auth.clone(), store)
            .with_timeout(config.auth_timeout)
            .with_api_group(config.api_group);
        Self::new(Arc::new(auth))
            .with_timeout(config.request_timeout)
            .with_api_group(config.api_group)
            .with_default_chat_id(config.default_chat_id.clone())
    }

    pub fn with_default_chat_id(mut self, chat_id: Option<String>) -> Self {
        self.default_chat_id = chat_id.filter(|id| !id.is_empty());
        self
    }

    pub fn with_api_group(mut self, api_group: ApiGroup) -> Self {
        self.api_group = api_group;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = build_client(timeout);
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    pub fn default_chat_id(&self) -> Option<&str> {
        self.default_chat_id.as_deref()
    }

    /// Current bearer token, authenticating if the cached one is stale.
    pub async fn access_token(&self) -> Result<String> {
        Ok(self.auth.ensure_authenticated().await?.access_token)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated().await
    }

    /// List teams and chats, optionally filtered by type (`Team`, `Group`, ...).
    pub async fn list_chats(&self, type_filter: Option<&str>) -> Result<ChatList> {
        let query: Vec<(&str, &str)> = type_filter
            .filter(|t| !t.is_empty())
            .map(|t| vec![("type", t)])
            .unwrap_or_default();
        self.call(Method::GET, "/glip/teams", &query, None::<&()>, &[200], "retrieve chats")
            .await
    }

    /// Post `text` to `chat_id`, or to the default chat when `chat_id` is empty.
    pub async fn post_message(
        &self,
        chat_id: &str,
        text: &str,
        attachments: Option<&[serde_json::Value]>,
    ) -> Result<RemoteMessage> {
        let chat_id = self.resolve_chat_id(chat_id)?;
        let body = NewPost { text, attachments };
        self.call(
            Method::POST,
            &format!("/glip/chats/{}/posts", path_segment(chat_id)),
            &[],
            Some(&body),
            &[200, 201],
            "post message",
        )
        .await
    }

    /// Fetch up to `limit` recent posts from a chat.
    pub async fn get_messages(&self, chat_id: &str, limit: u32) -> Result<Vec<RemoteMessage>> {
        let chat_id = self.resolve_chat_id(chat_id)?;
        let limit = limit.to_string();
        let page: Records<RemoteMessage> = self
            .call(
                Method::GET,
                &format!("/glip/chats/{}/posts", path_segment(chat_id)),
                &[("recordCount", limit.as_str())],
                None::<&()>,
                &[200],
                "retrieve messages",
            )
            .await?;
        Ok(page.records)
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let page: Records<Subscription> = self
            .call(
                Method::GET,
                "/subscription",
                &[],
                None::<&()>,
                &[200],
                "list subscriptions",
            )
            .await?;
        Ok(page.records)
    }

    /// Create a subscription. The request is validated locally first.
    pub async fn create_subscription(&self, spec: &SubscriptionSpec) -> Result<Subscription> {
        spec.validate()?;
        self.call(
            Method::POST,
            "/subscription",
            &[],
            Some(spec),
            &[200, 201],
            "create subscription",
        )
        .await
    }

    pub async fn renew_subscription(
        &self,
        id: &str,
        event_filters: &[String],
        expires_in: u64,
    ) -> Result<Subscription> {
        if id.is_empty() {
            return Err(RelayError::Validation("subscription id is required".to_string()));
        }
        let body = RenewSubscription {
            event_filters,
            expires_in: expires_in.min(MAX_SUBSCRIPTION_EXPIRES_IN),
        };
        self.call(
            Method::PUT,
            &format!("/subscription/{}", path_segment(id)),
            &[],
            Some(&body),
            &[200],
            "renew subscription",
        )
        .await
    }

    /// Renew the webhook subscription delivering to `address`, or create one.
    pub async fn ensure_webhook_subscription(
        &self,
        address: &str,
        event_filters: &[String],
    ) -> Result<SubscriptionOutcome> {
        let spec = SubscriptionSpec::webhook(event_filters.to_vec(), address);
        spec.validate()?;

        let existing = self
            .list_subscriptions()
            .await?
            .into_iter()
            .find(|s| s.delivery_mode.address.as_deref() == Some(address));

        if let Some(existing) = existing {
            match self
                .renew_subscription(&existing.id, event_filters, MAX_SUBSCRIPTION_EXPIRES_IN)
                .await
            {
                Ok(renewed) => {
                    tracing::info!(subscription = %renewed.id, "Renewed webhook subscription");
                    return Ok(SubscriptionOutcome::Renewed(renewed));
                }
                Err(err @ RelayError::Authentication(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        subscription = %existing.id,
                        error = %err,
                        "Renewal failed; creating a new subscription"
                    );
                }
            }
        }

        let created = self.create_subscription(&spec).await?;
        tracing::info!(subscription = %created.id, "Created webhook subscription");
        Ok(SubscriptionOutcome::Created(created))
    }

    /// Delete a subscription. Both 200 and 204 count as success.
    pub async fn delete_subscription(&self, id: &str) -> Result<bool> {
        if id.is_empty() {
            return Err(RelayError::Validation("subscription id is required".to_string()));
        }
        let resp = self
            .send(Method::DELETE, &format!("/subscription/{}", path_segment(id)), &[], None::<&()>)
            .await?;
        let status = resp.status().as_u16();
        if matches!(status, 200 | 204) {
            return Ok(true);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(status_to_error(status, &body, "delete subscription"))
    }

    pub async fn create_team(
        &self,
        name: &str,
        description: &str,
        members: &[TeamMember],
    ) -> Result<Chat> {
        if name.trim().is_empty() {
            return Err(RelayError::Validation("team name is required".to_string()));
        }
        let body = NewTeam {
            name,
            description,
            members,
        };
        self.call(
            Method::POST,
            "/glip/teams",
            &[],
            Some(&body),
            &[200, 201],
            "create team",
        )
        .await
    }

    pub async fn get_team(&self, team_id: &str) -> Result<Chat> {
        let team_id = self.resolve_chat_id(team_id)?;
        self.call(
            Method::GET,
            &format!("/glip/teams/{}", path_segment(team_id)),
            &[],
            None::<&()>,
            &[200],
            "retrieve team",
        )
        .await
    }

    fn resolve_chat_id<'a>(&'a self, chat_id: &'a str) -> Result<&'a str> {
        if !chat_id.is_empty() {
            return Ok(chat_id);
        }
        self.default_chat_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(RelayError::MissingChatId)
    }

    async fn call<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        accepted: &[u16],
        action: &str,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.send(method, path, query, body).await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        if !accepted.contains(&status) {
            return Err(status_to_error(status, &text, action));
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let credential = self.auth.ensure_authenticated().await?;
        let url = format!("{}{API_PREFIX}{path}", self.server_url);
        debug!(%method, %url, "REST request");

        let mut request = self
            .http
            .request(method, &url)
            .headers(bearer_headers(&credential.access_token, self.api_group));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}
