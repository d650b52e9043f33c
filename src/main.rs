//! chatrelay CLI binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatrelay::cli::Cli;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("CHATRELAY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = Cli::parse().run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
