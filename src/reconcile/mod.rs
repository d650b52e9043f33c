//! Merge fetched remote posts into the local message store.

pub mod poll;
pub mod sqlite;
pub mod store;

pub use poll::poll_chat;
pub use sqlite::SqliteMessageStore;
pub use store::{InMemoryMessageStore, InsertOutcome, MessageStore};

use std::sync::LazyLock;

use bon::Builder;
use chrono::{Duration, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{RelayConfig, DEFAULT_SYSTEM_MARKER};
use crate::error::Result;
use crate::types::{NewMessage, RemoteMessage, SenderType, Session};

static SESSION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Session:\s*([a-zA-Z0-9_]+)\]").expect("session tag regex must compile")
});

/// Reconciliation policy.
///
/// ```
/// use chatrelay::reconcile::ReconcileOptions;
///
/// let options = ReconcileOptions::builder()
///     .self_user_id("63395585031".to_string())
///     .triage_chat_id("147193044998".to_string())
///     .build();
/// assert!(options.require_remote_id);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ReconcileOptions {
    /// Posts containing this marker are relay-generated and never ingested.
    #[builder(default = DEFAULT_SYSTEM_MARKER.to_string())]
    pub system_marker: String,
    /// Creator id the relay itself posts as; its posts are visitor messages.
    pub self_user_id: Option<String>,
    #[builder(default = true)]
    pub require_remote_id: bool,
    /// How far back the text match looks when a post has no remote id.
    #[builder(default = Duration::minutes(10))]
    pub heuristic_window: Duration,
    /// Shared chat where a `[Session: id]` tag selects the target session.
    pub triage_chat_id: Option<String>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&RelayConfig> for ReconcileOptions {
    /// The configured default chat doubles as the triage chat.
    fn from(config: &RelayConfig) -> Self {
        Self::builder()
            .system_marker(config.system_marker.clone())
            .maybe_self_user_id(config.self_user_id.clone())
            .maybe_triage_chat_id(config.default_chat_id.clone())
            .build()
    }
}

/// Per-batch tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: usize,
    pub existing: usize,
    pub system_skipped: usize,
    /// Posts without a remote id while one is required.
    pub rejected: usize,
    /// Posts with no active session to attach to.
    pub unrouted: usize,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.added + self.existing + self.system_skipped + self.rejected + self.unrouted
    }

    pub fn merge(&mut self, other: ReconcileReport) {
        self.added += other.added;
        self.existing += other.existing;
        self.system_skipped += other.system_skipped;
        self.rejected += other.rejected;
        self.unrouted += other.unrouted;
    }
}

enum Disposition {
    Added,
    Existing,
    System,
    Rejected,
    Unrouted,
}

/// Deduplicating ingester over a [`MessageStore`].
///
/// Running the same batch twice leaves the store unchanged the second time:
/// deduplication is keyed on remote id against the full store history.
pub struct Reconciler<S> {
    store: S,
    options: ReconcileOptions,
}

impl<S: MessageStore> Reconciler<S> {
    pub fn new(store: S, options: ReconcileOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Ingest `batch` (fetched from `chat_id`) in order.
    pub fn reconcile(&self, chat_id: &str, batch: &[RemoteMessage]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for message in batch {
            match self.ingest(chat_id, message)? {
                Disposition::Added => report.added += 1,
                Disposition::Existing => report.existing += 1,
                Disposition::System => report.system_skipped += 1,
                Disposition::Rejected => report.rejected += 1,
                Disposition::Unrouted => report.unrouted += 1,
            }
        }
        info!(
            chat_id,
            added = report.added,
            existing = report.existing,
            system_skipped = report.system_skipped,
            rejected = report.rejected,
            unrouted = report.unrouted,
            "Reconciled batch"
        );
        Ok(report)
    }

    /// Close the active sessions bound to `chat_id`.
    pub fn close_chat(&self, chat_id: &str) -> Result<usize> {
        let closed = self.store.close_sessions_for_chat(chat_id)?;
        info!(chat_id, closed, "Closed sessions for chat");
        Ok(closed)
    }

    fn ingest(&self, chat_id: &str, message: &RemoteMessage) -> Result<Disposition> {
        if !self.options.system_marker.is_empty()
            && message.text.contains(&self.options.system_marker)
        {
            debug!(remote_id = ?message.id, "Skipping system message");
            return Ok(Disposition::System);
        }

        let remote_id = message.remote_id();
        match remote_id {
            Some(id) => {
                if self.store.find_by_remote_id(id)?.is_some() {
                    return Ok(Disposition::Existing);
                }
            }
            None if self.options.require_remote_id => {
                warn!(chat_id, "Rejecting post without remote id");
                return Ok(Disposition::Rejected);
            }
            None => {}
        }

        let Some(session) = self.resolve_session(chat_id, &message.text)? else {
            warn!(chat_id, remote_id, "No active session for post");
            return Ok(Disposition::Unrouted);
        };

        let created_at = message.creation_time.unwrap_or_else(Utc::now);
        if remote_id.is_none() {
            // Window is anchored on the post's own time, which is what gets stored.
            let since = created_at - self.options.heuristic_window;
            if self
                .store
                .find_recent_by_text(&session.session_id, &message.text, since)?
                .is_some()
            {
                return Ok(Disposition::Existing);
            }
        }

        let new_message = NewMessage {
            session_id: session.session_id.clone(),
            sender_type: self.classify(message.creator_id.as_deref()),
            sender_id: message.creator_id.clone(),
            text: message.text.clone(),
            remote_id: remote_id.map(str::to_string),
            created_at,
        };

        match self.store.insert(new_message)? {
            InsertOutcome::Inserted(local) => {
                self.store.touch_session(&session.session_id, Utc::now())?;
                debug!(
                    session_id = %local.session_id,
                    local_id = local.id,
                    sender = %local.sender_type,
                    "Ingested post"
                );
                Ok(Disposition::Added)
            }
            InsertOutcome::Duplicate => Ok(Disposition::Existing),
        }
    }

    fn classify(&self, creator_id: Option<&str>) -> SenderType {
        match (&self.options.self_user_id, creator_id) {
            (Some(me), Some(creator)) if me == creator => SenderType::Visitor,
            _ => SenderType::Agent,
        }
    }

    fn resolve_session(&self, chat_id: &str, text: &str) -> Result<Option<Session>> {
        let bound = self
            .store
            .sessions_for_chat(chat_id)?
            .into_iter()
            .filter(Session::is_active)
            .max_by_key(|s| s.updated_at);
        if bound.is_some() || self.options.triage_chat_id.as_deref() != Some(chat_id) {
            return Ok(bound);
        }

        match session_tag(text) {
            Some(tagged) => Ok(self.store.get_session(tagged)?.filter(Session::is_active)),
            None => Ok(None),
        }
    }
}

/// Session id named by a `[Session: id]` tag, if present.
pub fn session_tag(text: &str) -> Option<&str> {
    SESSION_TAG
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
