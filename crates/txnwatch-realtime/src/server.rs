//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use txnwatch_core::config::{BridgeConfig, RealtimeConfig};
use txnwatch_core::types::EntityId;
use txnwatch_core::AppResult;
use txnwatch_database::NotificationSource;

use crate::bridge::NotificationBridge;
use crate::connection::pump::PumpSettings;
use crate::connection::session::serve_connection;
use crate::hub::{Hub, HubHandle};
use crate::metrics::{EngineMetrics, MetricsSnapshot};

/// Central real-time engine: the hub, its metrics, and shutdown signalling.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Handle to the hub loop.
    pub hub: HubHandle,
    /// Metrics collector.
    pub metrics: Arc<EngineMetrics>,
    /// Configuration.
    config: RealtimeConfig,
    /// Shutdown signal sender.
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine").finish()
    }
}

impl RealtimeEngine {
    /// Creates the engine and spawns the hub loop.
    pub fn start(config: RealtimeConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let metrics = Arc::new(EngineMetrics::new());
        let (hub, handle) = Hub::new(&config, metrics.clone());
        tokio::spawn(hub.run());

        info!(
            outbox_capacity = config.outbox_capacity,
            max_dropped_messages = config.max_dropped_messages,
            "Real-time engine initialized"
        );

        Self {
            hub: handle,
            metrics,
            config,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Spawns a notification bridge fed by `source`.
    ///
    /// The returned task finishes with `Ok` after [`shutdown`](Self::shutdown)
    /// and with `Err` if the source is lost for good.
    pub fn spawn_bridge<S>(&self, source: S, config: &BridgeConfig) -> JoinHandle<AppResult<()>>
    where
        S: NotificationSource + 'static,
    {
        let bridge = NotificationBridge::new(source, self.hub.clone(), config, self.metrics.clone());
        tokio::spawn(bridge.run(self.shutdown_receiver()))
    }

    /// Serves an upgraded WebSocket subscribed to `subscription` until it
    /// closes.
    pub async fn serve(&self, socket: axum::extract::ws::WebSocket, subscription: EntityId) {
        serve_connection(
            socket,
            subscription,
            self.hub.clone(),
            PumpSettings::from(&self.config),
            self.config.outbox_capacity,
        )
        .await;
    }

    /// Live connection count.
    pub async fn connection_count(&self) -> AppResult<usize> {
        self.hub.connection_count().await
    }

    /// Current metrics.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Returns a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stops the bridge and the hub. Every connection receives a close frame.
    pub async fn shutdown(&self) {
        info!("Shutting down real-time engine");

        // Stored even when no bridge is listening yet.
        self.shutdown_tx.send_replace(true);
        self.hub.shutdown().await;

        info!(metrics = ?self.metrics.snapshot(), "Real-time engine shut down");
    }
}
