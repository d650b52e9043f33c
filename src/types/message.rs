//! Remote posts and locally persisted chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

/// A post fetched from (or pushed by) the remote chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl RemoteMessage {
    pub fn new(id: impl Into<String>, text: impl Into<String>, creator_id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            group_id: None,
            text: text.into(),
            creator_id: Some(creator_id.into()),
            creation_time: None,
            kind: None,
        }
    }

    pub fn with_creation_time(mut self, at: DateTime<Utc>) -> Self {
        self.creation_time = Some(at);
        self
    }

    /// Remote id, treating an empty string as absent.
    pub fn remote_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Who authored a local message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SenderType {
    Visitor,
    Agent,
    System,
}

/// A message persisted in the local store. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMessage {
    pub id: i64,
    pub session_id: String,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub text: String,
    pub remote_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a [`LocalMessage`]; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub session_id: String,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub text: String,
    pub remote_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// A message typed locally by a visitor (no remote id yet).
    pub fn visitor(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            sender_type: SenderType::Visitor,
            sender_id: None,
            text: text.into(),
            remote_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn into_local(self, id: i64) -> LocalMessage {
        LocalMessage {
            id,
            session_id: self.session_id,
            sender_type: self.sender_type,
            sender_id: self.sender_id,
            text: self.text,
            remote_id: self.remote_id,
            created_at: self.created_at,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
