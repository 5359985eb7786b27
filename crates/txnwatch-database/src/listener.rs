//! Raw notification sources.
//!
//! The bridge only needs "subscribe" and "next payload"; everything about
//! how the database delivers notifications stays behind this trait.

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use tracing::{debug, warn};

use txnwatch_core::config::DatabaseConfig;
use txnwatch_core::error::{AppError, ErrorKind};
use txnwatch_core::AppResult;

use crate::connection::connect_listener;

/// A stream of raw notification payloads from an external publisher.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Establishes the subscription, replacing any previous one.
    async fn subscribe(&mut self) -> AppResult<()>;

    /// Waits for the next raw payload.
    ///
    /// An error means the subscription is gone; callers resubscribe.
    async fn next_payload(&mut self) -> AppResult<String>;

    /// Human-readable description used in logs.
    fn describe(&self) -> String;
}

/// PostgreSQL `LISTEN` source.
pub struct PgNotificationSource {
    config: DatabaseConfig,
    channel: String,
    listener: Option<PgListener>,
}

impl PgNotificationSource {
    /// Creates an unsubscribed source for `channel`.
    pub fn new(config: DatabaseConfig, channel: impl Into<String>) -> Self {
        Self {
            config,
            channel: channel.into(),
            listener: None,
        }
    }
}

impl std::fmt::Debug for PgNotificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgNotificationSource")
            .field("channel", &self.channel)
            .field("subscribed", &self.listener.is_some())
            .finish()
    }
}

#[async_trait]
impl NotificationSource for PgNotificationSource {
    async fn subscribe(&mut self) -> AppResult<()> {
        self.listener = None;
        let listener = connect_listener(&self.config, &self.channel).await?;
        self.listener = Some(listener);
        Ok(())
    }

    async fn next_payload(&mut self) -> AppResult<String> {
        let listener = self
            .listener
            .as_mut()
            .ok_or_else(|| AppError::database("Notification listener is not subscribed"))?;

        // try_recv surfaces connection loss as Ok(None) instead of silently
        // reconnecting, so the supervisor sees every drop.
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                debug!(
                    channel = %notification.channel(),
                    pid = notification.process_id(),
                    "Received notification"
                );
                Ok(notification.payload().to_string())
            }
            Ok(None) => {
                warn!(channel = %self.channel, "Notification listener connection lost");
                self.listener = None;
                Err(AppError::database("Notification listener connection lost"))
            }
            Err(e) => {
                self.listener = None;
                Err(AppError::with_source(
                    ErrorKind::Database,
                    format!("Notification listener failed: {e}"),
                    e,
                ))
            }
        }
    }

    fn describe(&self) -> String {
        format!("postgres channel '{}'", self.channel)
    }
}
