//! Fetch-then-reconcile for cron-style polling.

use crate::client::MessagingClient;
use crate::error::Result;

use super::{MessageStore, ReconcileReport, Reconciler};

/// Fetch the latest `limit` posts from `chat_id` and reconcile them.
///
/// An empty `chat_id` polls the client's default chat.
pub async fn poll_chat<S: MessageStore>(
    client: &MessagingClient,
    reconciler: &Reconciler<S>,
    chat_id: &str,
    limit: u32,
) -> Result<ReconcileReport> {
    let chat_id = match chat_id {
        "" => client
            .default_chat_id()
            .ok_or(crate::error::RelayError::MissingChatId)?
            .to_string(),
        id => id.to_string(),
    };
    let posts = client.get_messages(&chat_id, limit).await?;
    tracing::debug!(chat_id = %chat_id, fetched = posts.len(), "Polled chat");
    reconciler.reconcile(&chat_id, &posts)
}
