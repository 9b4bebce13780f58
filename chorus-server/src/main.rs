use anyhow::{Context, Result};
use chorus_server::{RelayService, ServerConfig, build_router};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Rendezvous relay for the chorus conferencing client.
#[derive(Parser)]
#[command(name = "chorus-server")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0")]
    address: String,

    /// Bind port.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Maximum members per room.
    #[arg(long, default_value_t = chorus_server::MAX_CLIENTS)]
    max_clients: usize,

    /// Document root for the static asset fallback.
    #[arg(long, default_value = "./public")]
    assets: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        address: args.address,
        port: args.port,
        max_clients: args.max_clients,
        assets_dir: args.assets,
    };

    let bind = format!("{}:{}", config.address, config.port);
    let relay = RelayService::new(config);
    let app = build_router(relay);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!("Rendezvous relay listening on {bind}...");

    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
