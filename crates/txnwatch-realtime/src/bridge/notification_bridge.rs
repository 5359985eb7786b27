//! Supervised notification bridge.
//!
//! Subscribes to a [`NotificationSource`], parses each payload and hands the
//! result to the hub. A lost subscription is re-established with
//! exponential backoff; only more than `max_retries` consecutive failed
//! subscribe attempts end the bridge with an error.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

use txnwatch_core::config::BridgeConfig;
use txnwatch_core::error::{AppError, ErrorKind};
use txnwatch_core::AppResult;
use txnwatch_database::NotificationSource;

use crate::hub::HubHandle;
use crate::metrics::EngineMetrics;

use super::backoff::BackoffPolicy;
use super::payload::parse_payload;

/// Moves notifications from a source into the hub.
#[derive(Debug)]
pub struct NotificationBridge<S> {
    source: S,
    hub: HubHandle,
    backoff: BackoffPolicy,
    max_retries: u32,
    metrics: Arc<EngineMetrics>,
}

/// Resolves once shutdown is requested or the shutdown sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

impl<S: NotificationSource> NotificationBridge<S> {
    /// Creates a bridge from `source` to `hub`.
    pub fn new(
        source: S,
        hub: HubHandle,
        config: &BridgeConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            source,
            hub,
            backoff: BackoffPolicy::from(config),
            max_retries: config.max_retries,
            metrics,
        }
    }

    /// Run until shutdown (returns `Ok`) or until resubscribing has failed
    /// too many times in a row, or the hub is gone (returns `Err`).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> AppResult<()> {
        let source = self.source.describe();
        let mut failures: u32 = 0;

        'supervise: loop {
            let subscribed = tokio::select! {
                result = self.source.subscribe() => result,
                _ = stopped(&mut shutdown) => break 'supervise,
            };

            if let Err(e) = subscribed {
                failures += 1;
                if failures > self.max_retries {
                    error!(
                        source = %source,
                        attempts = failures,
                        error = %e,
                        "Giving up on notification source"
                    );
                    return Err(AppError::with_source(
                        ErrorKind::ServiceUnavailable,
                        format!("Notification source {source} unavailable after {failures} attempts"),
                        e,
                    ));
                }

                let delay = self.backoff.next(failures - 1);
                warn!(
                    source = %source,
                    attempt = failures,
                    max_retries = self.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Subscribe failed, retrying"
                );
                tokio::select! {
                    _ = time::sleep(delay) => continue 'supervise,
                    _ = stopped(&mut shutdown) => break 'supervise,
                }
            }

            failures = 0;
            info!(source = %source, "Listening for notifications");

            let lost = loop {
                let next = tokio::select! {
                    result = self.source.next_payload() => result,
                    _ = stopped(&mut shutdown) => break 'supervise,
                };
                match next {
                    Ok(raw) => self.forward(&raw).await?,
                    Err(e) => break e,
                }
            };

            self.metrics.bridge_resubscribed();
            let delay = self.backoff.next(0);
            warn!(
                source = %source,
                delay_ms = delay.as_millis() as u64,
                error = %lost,
                "Notification subscription lost, resubscribing"
            );
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = stopped(&mut shutdown) => break 'supervise,
            }
        }

        info!(source = %source, "Notification bridge stopped");
        Ok(())
    }

    /// Parse one payload and broadcast it. Malformed payloads are logged and
    /// skipped; only a stopped hub is an error.
    async fn forward(&self, raw: &str) -> AppResult<()> {
        self.metrics.notification_received();

        let event = match parse_payload(raw) {
            Ok(event) => event,
            Err(e) => {
                self.metrics.payload_rejected();
                warn!(payload = %raw, error = %e, "Discarding malformed notification payload");
                return Ok(());
            }
        };

        debug!(subject_id = %event.subject_id, status = %event.status, "Forwarding notification");
        self.hub.broadcast(event).await
    }
}
