//! # Orchestrator Server
//!
//! Standalone deployment target: task store migrations, the expiry sweeper
//! and the HTTP API in one process.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin orchestra-server
//!
//! # Run against a specific store and bind address
//! DATABASE_URL=postgresql://localhost/orchestra \
//!   ORCHESTRA_BIND_ADDRESS=0.0.0.0:3008 cargo run --bin orchestra-server
//! ```

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use orchestra_core::config::OrchestraConfig;
use orchestra_core::events::EventNotifier;
use orchestra_core::logging;
use orchestra_core::scheduler::{ExpirySweeper, Scheduler};
use orchestra_core::web::{self, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    info!("🚀 Starting Orchestrator Server...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = OrchestraConfig::load().context("failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_millis(config.database.connect_timeout_ms))
        .connect(&config.database.url)
        .await
        .context("failed to connect to the task store")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("   Task store ready");

    let scheduler = Scheduler::new(pool, EventNotifier::default());

    let sweeper = ExpirySweeper::new(scheduler.clone(), config.sweeper.clone());
    let sweeper_handle = sweeper.start();

    let app = web::create_app(AppState::new(scheduler, config.server.clone()));
    let listener = TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;

    info!("🎉 Orchestrator Server listening on {}", config.server.bind_address);
    info!("   Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("🛑 Shutdown signal received, stopping background work...");
    sweeper.stop();
    if let Err(e) = sweeper_handle.await {
        error!(error = %e, "expiry sweeper did not stop cleanly");
    }

    info!("👋 Orchestrator Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
