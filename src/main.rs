use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;

mod api;
mod config;
mod db;
mod valuation;

use api::AppState;
use config::Config;
use db::Database;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database (creates tables on first run)
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let app = api::router(AppState { db });
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("League API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve until shutdown; recompute tasks run detached on the same runtime
    axum::serve(listener, app).await?;

    Ok(())
}
