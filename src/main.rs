use clap::Parser;
use tracing_subscriber::EnvFilter;

use brokerlink_api::cli::Cli;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = brokerlink_api::cli::run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
