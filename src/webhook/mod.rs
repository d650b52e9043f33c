//! Inbound webhook handling, independent of any HTTP server.
//!
//! A host server passes request headers to [`validation_token`] and, when it
//! returns a value, echoes it back in the response and stops. Otherwise the
//! body is parsed with [`Notification::parse`] and handed to [`dispatch`].

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::error::{RelayError, Result};
use crate::reconcile::{MessageStore, ReconcileReport, Reconciler};
use crate::types::RemoteMessage;

pub const VALIDATION_TOKEN_HEADER: &str = "Validation-Token";

/// Subscription handshake token to echo back verbatim, if this is a handshake.
pub fn validation_token(headers: &HeaderMap) -> Option<HeaderValue> {
    headers
        .get(VALIDATION_TOKEN_HEADER)
        .filter(|v| !v.is_empty())
        .cloned()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBody {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Push notification envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub body: NotificationBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PostAdded {
        chat_id: String,
        message: RemoteMessage,
    },
    ChatClosed {
        chat_id: String,
    },
    /// Any event type not handled here.
    Ignored(String),
}

impl Notification {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(RelayError::Validation("empty webhook payload".to_string()));
        }
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn event_type(&self) -> &str {
        self.body.event_type.as_deref().unwrap_or("")
    }

    /// Classify the notification. A post missing its id, chat, or creator is invalid.
    pub fn into_event(self) -> Result<WebhookEvent> {
        let event_type = self.event_type().to_string();
        let body = self.body;
        match event_type.as_str() {
            "PostAdded" => {
                let (Some(id), Some(chat_id), Some(creator_id)) =
                    (body.id, body.group_id, body.creator_id)
                else {
                    return Err(RelayError::Validation(
                        "PostAdded notification is missing id, groupId, or creatorId".to_string(),
                    ));
                };
                let message = RemoteMessage {
                    id: Some(id),
                    group_id: Some(chat_id.clone()),
                    text: body.text.unwrap_or_default(),
                    creator_id: Some(creator_id),
                    creation_time: body.creation_time,
                    kind: body.kind,
                };
                Ok(WebhookEvent::PostAdded { chat_id, message })
            }
            "GroupLeft" | "GroupDeleted" => match body.group_id.or(body.id) {
                Some(chat_id) => Ok(WebhookEvent::ChatClosed { chat_id }),
                None => Err(RelayError::Validation(format!(
                    "{event_type} notification is missing the chat id"
                ))),
            },
            _ => Ok(WebhookEvent::Ignored(event_type)),
        }
    }
}

/// What [`dispatch`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Reconciled(ReconcileReport),
    Closed(usize),
    Ignored,
}

/// Apply a webhook event to the local store.
pub fn dispatch<S: MessageStore>(
    reconciler: &Reconciler<S>,
    event: WebhookEvent,
) -> Result<DispatchOutcome> {
    match event {
        WebhookEvent::PostAdded { chat_id, message } => {
            let report = reconciler.reconcile(&chat_id, std::slice::from_ref(&message))?;
            Ok(DispatchOutcome::Reconciled(report))
        }
        WebhookEvent::ChatClosed { chat_id } => {
            Ok(DispatchOutcome::Closed(reconciler.close_chat(&chat_id)?))
        }
        WebhookEvent::Ignored(event_type) => {
            tracing::warn!(event_type = %event_type, "Unhandled webhook event");
            Ok(DispatchOutcome::Ignored)
        }
    }
}
