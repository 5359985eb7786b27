//! Hub loop and its cloneable client handle.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use txnwatch_core::config::{MessageFormat, RealtimeConfig};
use txnwatch_core::types::{ConnectionId, EntityId};
use txnwatch_core::{AppError, AppResult};

use crate::connection::handle::{ConnectionHandle, Delivery};
use crate::message::event::NotificationEvent;
use crate::message::types::render;
use crate::metrics::EngineMetrics;

use super::command::HubCommand;
use super::registry::Registry;

/// Owns the registry and applies [`HubCommand`]s in arrival order.
#[derive(Debug)]
pub struct Hub {
    registry: Registry,
    commands: mpsc::Receiver<HubCommand>,
    format: MessageFormat,
    max_dropped_messages: u64,
    metrics: Arc<EngineMetrics>,
}

/// Cloneable front door to a running [`Hub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

impl Hub {
    /// Creates a hub and the handle used to talk to it.
    pub fn new(config: &RealtimeConfig, metrics: Arc<EngineMetrics>) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.hub_queue_capacity.max(1));
        let hub = Self {
            registry: Registry::new(),
            commands: rx,
            format: config.message_format,
            max_dropped_messages: config.max_dropped_messages,
            metrics,
        };
        (hub, HubHandle { commands: tx })
    }

    /// Process commands until [`HubCommand::Shutdown`] arrives or every
    /// handle is dropped. All remaining connections are then released,
    /// which closes their outboxes.
    pub async fn run(mut self) {
        info!(format = ?self.format, "Hub started");

        while let Some(command) = self.commands.recv().await {
            if !self.apply(command) {
                break;
            }
        }

        let remaining = self.registry.drain();
        for _ in &remaining {
            self.metrics.connection_closed();
        }
        info!(count = remaining.len(), "Hub stopped, all connections released");
    }

    /// Applies one command. Returns `false` when the loop should stop.
    fn apply(&mut self, command: HubCommand) -> bool {
        match command {
            HubCommand::Register(handle) => self.register(handle),
            HubCommand::Unregister(id) => self.unregister(&id),
            HubCommand::Broadcast(event) => self.broadcast(&event),
            HubCommand::ConnectionCount(reply) => {
                let _ = reply.send(self.registry.len());
            }
            HubCommand::SubscriberCount(subject, reply) => {
                let _ = reply.send(self.registry.subscriber_count(subject));
            }
            HubCommand::Shutdown => return false,
        }
        true
    }

    fn register(&mut self, handle: ConnectionHandle) {
        let id = handle.id;
        let subscription = handle.subscription;
        if self.registry.insert(handle) {
            self.metrics.connection_opened();
            info!(conn_id = %id, subscription_id = %subscription, "Connection registered");
        } else {
            warn!(conn_id = %id, "Connection already registered, ignoring");
        }
    }

    fn unregister(&mut self, id: &ConnectionId) {
        if let Some(handle) = self.registry.remove(id) {
            self.metrics.connection_closed();
            info!(
                conn_id = %id,
                subscription_id = %handle.subscription,
                dropped = handle.dropped(),
                duration_ms = handle.connected_for().num_milliseconds(),
                "Connection unregistered"
            );
            // Dropping the handle closes the outbox.
        }
    }

    fn broadcast(&mut self, event: &NotificationEvent) {
        if self.registry.subscriber_count(event.subject_id) == 0 {
            debug!(subject_id = %event.subject_id, "No subscribers for notification");
            return;
        }

        let message = match render(event, self.format) {
            Ok(m) => m,
            Err(e) => {
                error!(subject_id = %event.subject_id, error = %e, "Failed to render notification");
                return;
            }
        };

        let max_dropped = self.max_dropped_messages;
        let mut delivered = 0u64;
        let mut evict = Vec::new();

        for handle in self.registry.subscribers_mut(event.subject_id) {
            match handle.offer(message.clone()) {
                Delivery::Queued => delivered += 1,
                Delivery::Dropped(total) => {
                    self.metrics.dropped();
                    if max_dropped > 0 && total >= max_dropped {
                        warn!(conn_id = %handle.id, dropped = total, "Disconnecting slow consumer");
                        self.metrics.slow_consumer_disconnected();
                        evict.push(handle.id);
                    } else {
                        warn!(conn_id = %handle.id, dropped = total, "Outbox full, dropping message");
                    }
                }
                Delivery::Closed => {
                    debug!(conn_id = %handle.id, "Outbox already closed, removing stale connection");
                    evict.push(handle.id);
                }
            }
        }

        self.metrics.delivered(delivered);
        debug!(
            subject_id = %event.subject_id,
            status = %event.status,
            delivered,
            "Notification broadcast"
        );

        for id in &evict {
            self.unregister(id);
        }
    }
}

impl HubHandle {
    async fn submit(&self, command: HubCommand) -> AppResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::service_unavailable("Hub is not running"))
    }

    /// Adds a connection to the registry.
    pub async fn register(&self, handle: ConnectionHandle) -> AppResult<()> {
        self.submit(HubCommand::Register(handle)).await
    }

    /// Removes a connection if present. Never fails; a stopped hub has
    /// already released every connection.
    pub async fn unregister(&self, id: ConnectionId) {
        if self.submit(HubCommand::Unregister(id)).await.is_err() {
            debug!(conn_id = %id, "Hub stopped before unregister");
        }
    }

    /// Delivers `event` to every connection subscribed to its subject.
    pub async fn broadcast(&self, event: NotificationEvent) -> AppResult<()> {
        self.submit(HubCommand::Broadcast(event)).await
    }

    /// Number of live connections, observed after all earlier commands.
    pub async fn connection_count(&self) -> AppResult<usize> {
        let (tx, rx) = oneshot::channel();
        self.submit(HubCommand::ConnectionCount(tx)).await?;
        rx.await
            .map_err(|_| AppError::service_unavailable("Hub stopped before replying"))
    }

    /// Number of live connections subscribed to `subject`.
    pub async fn subscriber_count(&self, subject: EntityId) -> AppResult<usize> {
        let (tx, rx) = oneshot::channel();
        self.submit(HubCommand::SubscriberCount(subject, tx)).await?;
        rx.await
            .map_err(|_| AppError::service_unavailable("Hub stopped before replying"))
    }

    /// Asks the hub to release all connections and stop.
    pub async fn shutdown(&self) {
        let _ = self.submit(HubCommand::Shutdown).await;
    }

    /// Whether the hub loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::connection::handle::{open, Outbox};

    fn config(outbox_capacity: usize, max_dropped_messages: u64) -> RealtimeConfig {
        RealtimeConfig {
            outbox_capacity,
            max_dropped_messages,
            ..RealtimeConfig::default()
        }
    }

    fn start(config: &RealtimeConfig) -> (HubHandle, Arc<EngineMetrics>, tokio::task::JoinHandle<()>) {
        let metrics = Arc::new(EngineMetrics::new());
        let (hub, handle) = Hub::new(config, metrics.clone());
        let task = tokio::spawn(hub.run());
        (handle, metrics, task)
    }

    async fn connect(hub: &HubHandle, subject: i64, capacity: usize) -> (ConnectionId, Outbox) {
        let (handle, outbox) = open(EntityId(subject), capacity);
        let id = handle.id;
        hub.register(handle).await.expect("register");
        (id, outbox)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_matching_connections() {
        let cfg = config(8, 0);
        let (hub, metrics, _task) = start(&cfg);

        let (_a, mut outbox_a) = connect(&hub, 42, 8).await;
        let (_b, mut outbox_b) = connect(&hub, 42, 8).await;
        let (_c, mut outbox_c) = connect(&hub, 7, 8).await;

        hub.broadcast(NotificationEvent::new(42, "confirmed")).await.expect("broadcast");
        hub.broadcast(NotificationEvent::new(99, "ignored")).await.expect("broadcast");
        // Queries are ordered after earlier commands.
        assert_eq!(hub.connection_count().await.expect("count"), 3);

        let expected = "Transaction 42 status changed to confirmed";
        assert_eq!(outbox_a.recv().await.as_deref(), Some(expected));
        assert_eq!(outbox_b.recv().await.as_deref(), Some(expected));

        hub.shutdown().await;
        assert_eq!(outbox_a.recv().await, None);
        assert_eq!(outbox_c.recv().await, None);
        assert_eq!(metrics.snapshot().messages_delivered, 2);
    }

    #[tokio::test]
    async fn test_per_connection_order_is_broadcast_order() {
        let cfg = config(64, 0);
        let (hub, _metrics, _task) = start(&cfg);
        let (id, mut outbox) = connect(&hub, 5, 64).await;

        for n in 0..20 {
            hub.broadcast(NotificationEvent::new(5, format!("step-{n}")))
                .await
                .expect("broadcast");
        }
        hub.unregister(id).await;

        let mut received = Vec::new();
        while let Some(msg) = outbox.recv().await {
            received.push(msg);
        }
        let expected: Vec<String> = (0..20)
            .map(|n| format!("Transaction 5 status changed to step-{n}"))
            .collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_unregister_closes_outbox_and_is_idempotent() {
        let cfg = config(8, 0);
        let (hub, metrics, _task) = start(&cfg);
        let (id, mut outbox) = connect(&hub, 1, 8).await;

        hub.unregister(id).await;
        hub.unregister(id).await;
        hub.unregister(ConnectionId::new()).await;

        assert_eq!(outbox.recv().await, None);
        assert_eq!(hub.connection_count().await.expect("count"), 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 1);
        assert_eq!(snapshot.connections_active, 0);
    }

    #[tokio::test]
    async fn test_slow_consumer_does_not_stall_others() {
        let cfg = config(1, 0);
        let (hub, metrics, _task) = start(&cfg);

        let (_slow, mut slow_outbox) = connect(&hub, 9, 1).await;
        let (_fast, mut fast_outbox) = connect(&hub, 9, 16).await;

        for n in 0..5 {
            hub.broadcast(NotificationEvent::new(9, format!("s{n}")))
                .await
                .expect("broadcast");
            // Keep the fast consumer drained.
            assert_eq!(
                fast_outbox.recv().await,
                Some(format!("Transaction 9 status changed to s{n}"))
            );
        }

        // Only the first message fit; the rest were dropped.
        assert_eq!(
            slow_outbox.recv().await.as_deref(),
            Some("Transaction 9 status changed to s0")
        );
        assert_eq!(metrics.snapshot().messages_dropped, 4);
        assert_eq!(hub.subscriber_count(EntityId(9)).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn test_slow_consumer_is_disconnected_after_limit() {
        let cfg = config(1, 2);
        let (hub, metrics, _task) = start(&cfg);
        let (_slow, mut slow_outbox) = connect(&hub, 4, 1).await;

        for n in 0..3 {
            hub.broadcast(NotificationEvent::new(4, format!("s{n}")))
                .await
                .expect("broadcast");
        }

        assert_eq!(hub.connection_count().await.expect("count"), 0);
        assert_eq!(
            slow_outbox.recv().await.as_deref(),
            Some("Transaction 4 status changed to s0")
        );
        assert_eq!(slow_outbox.recv().await, None);
        assert_eq!(metrics.snapshot().slow_consumer_disconnects, 1);
    }

    #[tokio::test]
    async fn test_closed_outbox_is_evicted_on_broadcast() {
        let cfg = config(8, 0);
        let (hub, _metrics, _task) = start(&cfg);
        let (_id, outbox) = connect(&hub, 11, 8).await;
        drop(outbox);

        hub.broadcast(NotificationEvent::new(11, "gone")).await.expect("broadcast");
        assert_eq!(hub.connection_count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let cfg = config(4, 0);
        let (hub, _metrics, _task) = start(&cfg);

        let mut tasks = Vec::new();
        let mut outboxes = Vec::new();
        for n in 0..64 {
            let (handle, outbox) = open(EntityId(n % 4), 4);
            outboxes.push(outbox);
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move { hub.register(handle).await }));
        }
        for task in tasks {
            task.await.expect("join").expect("register");
        }

        assert_eq!(hub.connection_count().await.expect("count"), 64);
        for key in 0..4 {
            assert_eq!(hub.subscriber_count(EntityId(key)).await.expect("count"), 16);
        }
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_hub() {
        let cfg = config(4, 0);
        let (hub, _metrics, task) = start(&cfg);
        hub.shutdown().await;
        task.await.expect("hub task");

        assert!(hub.is_closed());
        assert!(hub.broadcast(NotificationEvent::new(1, "x")).await.is_err());
        let (handle, _outbox) = open(EntityId(1), 4);
        assert!(hub.register(handle).await.is_err());
        hub.unregister(ConnectionId::new()).await;
    }

    #[tokio::test]
    async fn test_json_format() {
        let cfg = RealtimeConfig {
            message_format: MessageFormat::Json,
            ..RealtimeConfig::default()
        };
        let (hub, _metrics, _task) = start(&cfg);
        let (_id, mut outbox) = connect(&hub, 42, 4).await;

        hub.broadcast(NotificationEvent::new(42, "confirmed")).await.expect("broadcast");
        let msg = outbox.recv().await.expect("message");
        let value: serde_json::Value = serde_json::from_str(&msg).expect("json");
        assert_eq!(value["subject_id"], 42);
        assert_eq!(value["status"], "confirmed");
    }
}
