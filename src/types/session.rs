//! Local conversation sessions bound to a remote chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// A visitor conversation and the remote chat it is routed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub remote_chat_id: Option<String>,
    pub status: SessionStatus,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn active(session_id: impl Into<String>, remote_chat_id: Option<String>) -> Self {
        Self {
            session_id: session_id.into(),
            remote_chat_id,
            status: SessionStatus::Active,
            updated_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Bind this session to a remote chat. Once set, the binding is fixed.
    pub fn bind_remote_chat(&mut self, chat_id: impl Into<String>) -> Result<(), RelayError> {
        let chat_id = chat_id.into();
        match &self.remote_chat_id {
            Some(existing) if *existing == chat_id => Ok(()),
            Some(existing) => Err(RelayError::Validation(format!(
                "session {} is already bound to chat {existing}",
                self.session_id
            ))),
            None => {
                self.remote_chat_id = Some(chat_id);
                self.updated_at = Utc::now();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_is_set_once() {
        let mut session = Session::active("s1", None);
        session.bind_remote_chat("chat-a").unwrap();
        session.bind_remote_chat("chat-a").unwrap();
        let err = session.bind_remote_chat("chat-b").unwrap_err();
        assert!(matches!(err, RelayError::Validation(msg) if msg.contains("chat-a")));
        assert_eq!(session.remote_chat_id.as_deref(), Some("chat-a"));
    }
}
