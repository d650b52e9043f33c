//! Request and response payloads of the chat REST endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Longest subscription lifetime the platform accepts (90 days).
pub const MAX_SUBSCRIPTION_EXPIRES_IN: u64 = 7_776_000;

pub const WEBHOOK_TRANSPORT: &str = "WebHook";

/// Event filter for team-messaging posts.
pub const POSTS_EVENT_FILTER: &str = "/restapi/v1.0/glip/posts";

/// A team, group, or direct chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatList {
    #[serde(default)]
    pub records: Vec<Chat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Records<T> {
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

/// Body of a new post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct NewPost<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<&'a [serde_json::Value]>,
}

/// Member reference for a new team, by person id or email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl TeamMember {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            id: None,
            email: Some(email.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewTeam<'a> {
    pub name: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "<[TeamMember]>::is_empty")]
    pub members: &'a [TeamMember],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryMode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Subscription request as supplied by the caller, validated before sending.
///
/// # Example
/// ```
/// use chatrelay::client::SubscriptionSpec;
///
/// let spec = SubscriptionSpec::webhook(
///     vec!["/restapi/v1.0/glip/posts".to_string()],
///     "https://example.com/chat/webhook",
/// );
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_filters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<DeliveryMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl SubscriptionSpec {
    pub fn webhook(event_filters: Vec<String>, address: impl Into<String>) -> Self {
        Self {
            event_filters: Some(event_filters),
            delivery_mode: Some(DeliveryMode {
                transport_type: Some(WEBHOOK_TRANSPORT.to_string()),
                address: Some(address.into()),
            }),
            expires_in: Some(MAX_SUBSCRIPTION_EXPIRES_IN),
        }
    }

    /// Check the request shape; the message names the offending field.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.event_filters.as_ref().map_or(true, Vec::is_empty) {
            return Err(RelayError::Validation(
                "eventFilters is required and must be a non-empty list".to_string(),
            ));
        }
        let delivery_mode = self.delivery_mode.as_ref().ok_or_else(|| {
            RelayError::Validation("deliveryMode is required and must be an object".to_string())
        })?;
        let transport_type = delivery_mode
            .transport_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                RelayError::Validation("deliveryMode.transportType is required".to_string())
            })?;
        if transport_type == WEBHOOK_TRANSPORT
            && delivery_mode.address.as_deref().map_or(true, str::is_empty)
        {
            return Err(RelayError::Validation(
                "deliveryMode.address is required for WebHook transport".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub event_filters: Vec<String>,
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenewSubscription<'a> {
    pub event_filters: &'a [String],
    pub expires_in: u64,
}

/// Result of [`MessagingClient::ensure_webhook_subscription`](super::MessagingClient::ensure_webhook_subscription).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    Renewed(Subscription),
    Created(Subscription),
}

impl SubscriptionOutcome {
    pub fn subscription(&self) -> &Subscription {
        match self {
            Self::Renewed(s) | Self::Created(s) => s,
        }
    }
}
