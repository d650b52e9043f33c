//! Local message and session persistence used by the reconciler.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::{RelayError, Result};
use crate::types::{LocalMessage, NewMessage, Session, SessionStatus};

/// Result of inserting a message that carries a remote id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(LocalMessage),
    /// A message with the same remote id already exists.
    Duplicate,
}

/// Storage seam for reconciliation.
///
/// Implementations must enforce remote-id uniqueness themselves: `insert`
/// reports [`InsertOutcome::Duplicate`] instead of writing a second row, even
/// when two writers race between lookup and insert.
pub trait MessageStore: Send + Sync {
    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<LocalMessage>>;

    /// Most recent message in `session_id` with exactly this text, created at or after `since`.
    fn find_recent_by_text(
        &self,
        session_id: &str,
        text: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<LocalMessage>>;

    fn insert(&self, message: NewMessage) -> Result<InsertOutcome>;

    fn messages_for_session(&self, session_id: &str) -> Result<Vec<LocalMessage>>;

    fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Sessions bound to `chat_id`, in any status.
    fn sessions_for_chat(&self, chat_id: &str) -> Result<Vec<Session>>;

    fn upsert_session(&self, session: &Session) -> Result<()>;

    fn touch_session(&self, session_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Close every active session bound to `chat_id`; returns how many changed.
    fn close_sessions_for_chat(&self, chat_id: &str) -> Result<usize>;
}

impl<T: MessageStore + ?Sized> MessageStore for Arc<T> {
    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<LocalMessage>> {
        (**self).find_by_remote_id(remote_id)
    }

    fn find_recent_by_text(
        &self,
        session_id: &str,
        text: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<LocalMessage>> {
        (**self).find_recent_by_text(session_id, text, since)
    }

    fn insert(&self, message: NewMessage) -> Result<InsertOutcome> {
        (**self).insert(message)
    }

    fn messages_for_session(&self, session_id: &str) -> Result<Vec<LocalMessage>> {
        (**self).messages_for_session(session_id)
    }

    fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        (**self).get_session(session_id)
    }

    fn sessions_for_chat(&self, chat_id: &str) -> Result<Vec<Session>> {
        (**self).sessions_for_chat(chat_id)
    }

    fn upsert_session(&self, session: &Session) -> Result<()> {
        (**self).upsert_session(session)
    }

    fn touch_session(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        (**self).touch_session(session_id, at)
    }

    fn close_sessions_for_chat(&self, chat_id: &str) -> Result<usize> {
        (**self).close_sessions_for_chat(chat_id)
    }
}

#[derive(Debug, Default)]
struct Inner {
    messages: Vec<LocalMessage>,
    sessions: Vec<Session>,
}

/// Process-local store; the uniqueness check and insert share one lock.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    inner: Mutex<Inner>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.sessions.extend(sessions);
        }
        store
    }

    /// Total number of persisted messages.
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.messages.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| RelayError::Storage("message store lock poisoned".to_string()))
    }
}

impl MessageStore for InMemoryMessageStore {
    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<LocalMessage>> {
        Ok(self
            .lock()?
            .messages
            .iter()
            .find(|m| m.remote_id.as_deref() == Some(remote_id))
            .cloned())
    }

    fn find_recent_by_text(
        &self,
        session_id: &str,
        text: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<LocalMessage>> {
        Ok(self
            .lock()?
            .messages
            .iter()
            .rev()
            .find(|m| m.session_id == session_id && m.text == text && m.created_at >= since)
            .cloned())
    }

    fn insert(&self, message: NewMessage) -> Result<InsertOutcome> {
        let mut inner = self.lock()?;
        if let Some(remote_id) = message.remote_id.as_deref() {
            if inner
                .messages
                .iter()
                .any(|m| m.remote_id.as_deref() == Some(remote_id))
            {
                return Ok(InsertOutcome::Duplicate);
            }
        }
        let local = message.into_local(inner.messages.len() as i64 + 1);
        inner.messages.push(local.clone());
        Ok(InsertOutcome::Inserted(local))
    }

    fn messages_for_session(&self, session_id: &str) -> Result<Vec<LocalMessage>> {
        Ok(self
            .lock()?
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned())
    }

    fn sessions_for_chat(&self, chat_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .filter(|s| s.remote_chat_id.as_deref() == Some(chat_id))
            .cloned()
            .collect())
    }

    fn upsert_session(&self, session: &Session) -> Result<()> {
        let mut inner = self.lock()?;
        match inner
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session.session_id)
        {
            Some(existing) => *existing = session.clone(),
            None => inner.sessions.push(session.clone()),
        }
        Ok(())
    }

    fn touch_session(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        if let Some(session) = self
            .lock()?
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
        {
            session.updated_at = at;
        }
        Ok(())
    }

    fn close_sessions_for_chat(&self, chat_id: &str) -> Result<usize> {
        let now = Utc::now();
        let mut closed = 0;
        for session in self.lock()?.sessions.iter_mut().filter(|s| {
            s.remote_chat_id.as_deref() == Some(chat_id) && s.status == SessionStatus::Active
        }) {
            session.status = SessionStatus::Closed;
            session.updated_at = now;
            closed += 1;
        }
        Ok(closed)
    }
}
