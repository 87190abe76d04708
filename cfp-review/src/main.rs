//! Review service (cfp-review) - Main entry point
//!
//! Reviewer-facing microservice of the CFP portal: hands out assignments,
//! records scores and refusals, and serves the aggregated committee views.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cfp_common::config::resolve_db_path;
use cfp_common::db::init_database;
use cfp_common::session::SessionStore;
use cfp_review::server::{router, AppContext};

/// Command-line arguments for cfp-review
#[derive(Parser, Debug)]
#[command(name = "cfp-review")]
#[command(about = "Review service for the CFP portal")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3010", env = "CFP_REVIEW_PORT")]
    port: u16,

    /// Path to the shared SQLite database
    #[arg(short, long, env = "CFP_DB_PATH")]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cfp_review=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting CFP review service on port {}", args.port);

    let db_path = resolve_db_path(args.db_path, "CFP_DB_PATH");
    info!("Database: {}", db_path.display());

    let db_pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let ctx = AppContext {
        db_pool,
        sessions: Arc::new(SessionStore::new()),
    };

    let app = router(ctx);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
