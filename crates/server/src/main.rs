use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use spandsl_server::{create_router, AppState};

/// HTTP server compiling Span queries to SQL
#[derive(Parser, Debug)]
#[command(name = "spandsl-server")]
#[command(about = "HTTP server compiling Span queries to SQL", long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    let args = Args::parse();

    let config = config::Config::load(args.config.as_deref())?;
    config.validate().context("Invalid configuration")?;

    let state = AppState::new(config.compiler.sql_options())
        .context("Failed to create server state")?;
    let router = create_router(Arc::new(state), config.server.static_dir.as_deref());

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!(
        address = %address,
        data_path = %config.compiler.data_path,
        default_year = ?config.compiler.default_year,
        static_dir = ?config.server.static_dir,
        "Span server started"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Span server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
