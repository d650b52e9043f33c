//! Messaging, sync, and subscription command handlers.

use crate::client::{MessagingClient, SubscriptionOutcome, POSTS_EVENT_FILTER};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::reconcile::{poll_chat, ReconcileOptions, Reconciler, SqliteMessageStore};

/// Handle `chatrelay chats`.
pub async fn handle_chats(config: &RelayConfig, kind: Option<&str>) -> Result<(), RelayError> {
    let client = MessagingClient::from_config(config);
    let chats = client.list_chats(kind).await?;
    if chats.records.is_empty() {
        println!("No chats found");
        return Ok(());
    }
    for chat in &chats.records {
        println!(
            "{:<16} {:<8} {}",
            chat.id,
            chat.kind.as_deref().unwrap_or("-"),
            chat.name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Handle `chatrelay post`.
pub async fn handle_post(config: &RelayConfig, chat_id: &str, text: &str) -> Result<(), RelayError> {
    let client = MessagingClient::from_config(config);
    let post = client.post_message(chat_id, text, None).await?;
    println!(
        "✅ Posted message {} to chat {}",
        post.id.as_deref().unwrap_or("?"),
        post.group_id.as_deref().unwrap_or(chat_id)
    );
    Ok(())
}

/// Handle `chatrelay sync`.
pub async fn handle_sync(config: &RelayConfig, chat_id: &str, limit: u32) -> Result<(), RelayError> {
    let path = config.database_path.as_ref().ok_or_else(|| {
        RelayError::Configuration("CHATRELAY_DATABASE is required for sync".to_string())
    })?;
    let store = SqliteMessageStore::open(path)?;
    let reconciler = Reconciler::new(store, ReconcileOptions::from(config));
    let client = MessagingClient::from_config(config);

    let report = poll_chat(&client, &reconciler, chat_id, limit).await?;
    println!(
        "added {}, existing {}, system skipped {}, rejected {}, unrouted {}",
        report.added, report.existing, report.system_skipped, report.rejected, report.unrouted
    );
    Ok(())
}

/// Handle `chatrelay subscriptions list`.
pub async fn handle_subscriptions_list(config: &RelayConfig) -> Result<(), RelayError> {
    let client = MessagingClient::from_config(config);
    let subscriptions = client.list_subscriptions().await?;
    if subscriptions.is_empty() {
        println!("No subscriptions");
    }
    for sub in subscriptions {
        println!(
            "{}  {:<8} {}  expires {}",
            sub.id,
            sub.status.as_deref().unwrap_or("-"),
            sub.delivery_mode.address.as_deref().unwrap_or("-"),
            sub.expiration_time
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

/// Handle `chatrelay subscriptions ensure`.
pub async fn handle_subscriptions_ensure(
    config: &RelayConfig,
    address: Option<&str>,
) -> Result<(), RelayError> {
    let address = address
        .or(config.webhook_address.as_deref())
        .ok_or_else(|| {
            RelayError::Configuration(
                "webhook address required (--address or CHATRELAY_WEBHOOK_ADDRESS)".to_string(),
            )
        })?;
    let client = MessagingClient::from_config(config);
    let outcome = client
        .ensure_webhook_subscription(address, &[POSTS_EVENT_FILTER.to_string()])
        .await?;
    let verb = match &outcome {
        SubscriptionOutcome::Renewed(_) => "Renewed",
        SubscriptionOutcome::Created(_) => "Created",
    };
    println!("✅ {verb} subscription {}", outcome.subscription().id);
    Ok(())
}

/// Handle `chatrelay subscriptions delete`.
pub async fn handle_subscriptions_delete(config: &RelayConfig, id: &str) -> Result<(), RelayError> {
    let client = MessagingClient::from_config(config);
    client.delete_subscription(id).await?;
    println!("✅ Deleted subscription {id}");
    Ok(())
}
