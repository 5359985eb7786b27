//! txnwatch server: pushes PostgreSQL change notifications to WebSocket
//! subscribers.
//!
//! Main entry point that wires all crates together and starts the server.

use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use txnwatch_core::config::AppConfig;
use txnwatch_core::error::AppError;
use txnwatch_database::PgNotificationSource;
use txnwatch_database::connection::mask_password;
use txnwatch_realtime::RealtimeEngine;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("TXNWATCH_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting txnwatch v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Realtime engine ──────────────────────────────────
    let engine = RealtimeEngine::start(config.realtime.clone());

    // ── Step 2: Notification bridge ──────────────────────────────
    tracing::info!(
        database = %mask_password(&config.database.url),
        channel = %config.bridge.channel,
        "Starting notification bridge..."
    );
    let source = PgNotificationSource::new(config.database.clone(), config.bridge.channel.clone());
    let mut bridge = engine.spawn_bridge(source, &config.bridge);

    // ── Step 3: HTTP server ──────────────────────────────────────
    let addr = config.server.bind_address();
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let app = txnwatch_api::build_router(txnwatch_api::AppState::new(engine.clone()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("txnwatch server listening on {}", addr);

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    // ── Step 4: Wait for a signal or a fatal failure ─────────────
    let outcome = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
            Ok(())
        }
        result = &mut bridge => match result {
            Ok(Ok(())) => Err(AppError::internal("Notification bridge stopped unexpectedly")),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(AppError::internal(format!("Notification bridge task failed: {}", e))),
        },
        result = &mut server => match result {
            Ok(Ok(())) => Err(AppError::internal("HTTP server stopped unexpectedly")),
            Ok(Err(e)) => Err(AppError::from(e)),
            Err(e) => Err(AppError::internal(format!("HTTP server task failed: {}", e))),
        },
    };

    // ── Step 5: Graceful shutdown ────────────────────────────────
    let _ = stop_tx.send(true);
    engine.shutdown().await;

    if !server.is_finished() && tokio::time::timeout(grace, &mut server).await.is_err() {
        tracing::warn!("HTTP server did not stop within {:?}", grace);
        server.abort();
    }
    if !bridge.is_finished() && tokio::time::timeout(grace, &mut bridge).await.is_err() {
        tracing::warn!("Notification bridge did not stop within {:?}", grace);
        bridge.abort();
    }

    if outcome.is_ok() {
        tracing::info!("txnwatch server shut down gracefully");
    }
    outcome
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
