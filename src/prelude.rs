//! Convenience re-exports for common use.

pub use crate::auth::{AuthError, Authenticator, Credential, FileTokenStore, TokenStore};
pub use crate::client::{ChatList, MessagingClient, Subscription, SubscriptionSpec};
pub use crate::config::{ApiGroup, AuthConfig, RelayConfig};
pub use crate::error::{RelayError, Result};
pub use crate::reconcile::{
    MessageStore, ReconcileOptions, ReconcileReport, Reconciler, SqliteMessageStore,
};
pub use crate::types::{LocalMessage, RemoteMessage, SenderType, Session, SessionStatus};
pub use crate::webhook::{Notification, WebhookEvent};
