//! chatrelay: a relay between local visitor sessions and RingCentral Team Messaging.
//!
//! Provides a cached OAuth credential lifecycle ([`auth`]), an authenticated
//! REST client ([`client`]), and deduplicating ingestion of remote posts into
//! a local store ([`reconcile`], [`webhook`]).
//!
//! # Quick Start
//!
//! ```no_run
//! use chatrelay::prelude::*;
//!
//! # async fn example() -> chatrelay::error::Result<()> {
//! let config = RelayConfig::from_env()?;
//! let client = MessagingClient::from_config(&config);
//! let chats = client.list_chats(Some("Team")).await?;
//! for chat in chats.records {
//!     println!("{} {}", chat.id, chat.name.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod prelude;
pub mod reconcile;
pub mod types;
pub mod util;
pub mod webhook;

#[cfg(feature = "cli")]
pub mod cli;
