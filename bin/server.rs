// Account Categorizer - Web Server
// POST /categorize over axum

use anyhow::{Context, Result};
use clap::Parser;
use account_categorizer::api::{build_router, AppState};
use account_categorizer::logging::init_tracing;
use account_categorizer::ServerConfig;
use tracing::info;

#[derive(Parser)]
#[command(name = "categorizer-server", version, about = "Account categorization API")]
struct Cli {
    #[command(flatten)]
    server: ServerConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.server;

    // Model handle is created once here and shared by every request
    let resolver = config.classifier.build_resolver()?;
    info!(classifier = resolver.classifier_name(), "resolver ready");

    let app = build_router(AppState::new(resolver), &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;

    info!(addr = %config.addr, origins = ?config.allowed_origins, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
