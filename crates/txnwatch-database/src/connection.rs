//! PostgreSQL connection management for `LISTEN/NOTIFY`.

use std::time::Duration;

use sqlx::postgres::PgListener;
use tracing::info;

use txnwatch_core::config::DatabaseConfig;
use txnwatch_core::error::{AppError, ErrorKind};

/// Open a dedicated listener connection and `LISTEN` on `channel`.
pub async fn connect_listener(config: &DatabaseConfig, channel: &str) -> Result<PgListener, AppError> {
    info!(
        url = %mask_password(&config.url),
        channel = %channel,
        "Connecting notification listener to PostgreSQL"
    );

    let timeout = Duration::from_secs(config.connect_timeout_seconds);
    let mut listener = tokio::time::timeout(timeout, PgListener::connect(&config.url))
        .await
        .map_err(|_| {
            AppError::database(format!(
                "Timed out connecting to database after {}s",
                config.connect_timeout_seconds
            ))
        })?
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to connect to database: {e}"),
                e,
            )
        })?;

    listener.listen(channel).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to LISTEN on channel '{channel}': {e}"),
            e,
        )
    })?;

    info!(channel = %channel, "Listening for notifications");
    Ok(listener)
}

/// Mask the password portion of a database URL for safe logging.
pub fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
