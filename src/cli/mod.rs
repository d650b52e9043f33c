//! Command-line interface for chatrelay.

pub mod auth;
pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::RelayConfig;
use crate::error::RelayError;

/// Chat relay for RingCentral Team Messaging
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about = "RingCentral Team Messaging relay")]
pub struct Cli {
    /// TOML config file (environment variables still override it)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Credential cache management
    Auth(AuthArgs),
    /// List teams and chats
    Chats(ChatsArgs),
    /// Post a message to a chat
    Post(PostArgs),
    /// Fetch recent posts and reconcile them into the local database
    Sync(SyncArgs),
    /// Webhook subscription management
    Subscriptions(SubscriptionArgs),
}

#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Show the cached credential without contacting the server
    Status,
    /// Authenticate now and cache the credential
    Login,
    /// Remove the cached credential
    Logout,
    /// Attempt authentication and print the failure history
    Errors,
}

#[derive(Parser, Debug)]
pub struct ChatsArgs {
    /// Chat type filter (Team, Group, Direct, Everyone, Personal)
    #[arg(long = "type")]
    pub kind: Option<String>,
}

#[derive(Parser, Debug)]
pub struct PostArgs {
    /// Target chat id (defaults to RINGCENTRAL_TEAM_CHAT_ID)
    #[arg(long)]
    pub chat: Option<String>,

    /// Message text
    pub text: String,
}

#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Chat id to poll
    #[arg(long)]
    pub chat: String,

    /// Number of recent posts to fetch
    #[arg(long, default_value_t = 50)]
    pub limit: u32,
}

#[derive(Parser, Debug)]
pub struct SubscriptionArgs {
    #[command(subcommand)]
    pub command: SubscriptionCommands,
}

#[derive(Subcommand, Debug)]
pub enum SubscriptionCommands {
    /// List active subscriptions
    List,
    /// Renew or create the webhook subscription for an address
    Ensure(EnsureArgs),
    /// Delete a subscription by id
    Delete(DeleteArgs),
}

#[derive(Parser, Debug)]
pub struct EnsureArgs {
    /// Webhook URL (defaults to CHATRELAY_WEBHOOK_ADDRESS)
    #[arg(long)]
    pub address: Option<String>,
}

#[derive(Parser, Debug)]
pub struct DeleteArgs {
    pub id: String,
}

impl Cli {
    /// Resolve configuration for this invocation.
    pub fn load_config(&self) -> Result<RelayConfig, RelayError> {
        RelayConfig::load(self.config.as_deref())
    }

    /// Run the selected command.
    pub async fn run(self) -> Result<(), RelayError> {
        let config = self.load_config()?;
        match self.command {
            Commands::Auth(args) => match args.command {
                AuthCommands::Status => auth::handle_status(&config),
                AuthCommands::Login => auth::handle_login(&config).await,
                AuthCommands::Logout => auth::handle_logout(&config),
                AuthCommands::Errors => auth::handle_errors(&config).await,
            },
            Commands::Chats(args) => commands::handle_chats(&config, args.kind.as_deref()).await,
            Commands::Post(args) => {
                commands::handle_post(&config, args.chat.as_deref().unwrap_or(""), &args.text)
                    .await
            }
            Commands::Sync(args) => commands::handle_sync(&config, &args.chat, args.limit).await,
            Commands::Subscriptions(args) => match args.command {
                SubscriptionCommands::List => commands::handle_subscriptions_list(&config).await,
                SubscriptionCommands::Ensure(ensure) => {
                    commands::handle_subscriptions_ensure(&config, ensure.address.as_deref())
                        .await
                }
                SubscriptionCommands::Delete(delete) => {
                    commands::handle_subscriptions_delete(&config, &delete.id).await
                }
            },
        }
    }
}
