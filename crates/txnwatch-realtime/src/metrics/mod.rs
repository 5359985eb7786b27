//! Realtime engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Total connections ever registered
    pub connections_total: AtomicU64,
    /// Connections currently registered
    pub connections_active: AtomicU64,
    /// Messages enqueued onto an outbox
    pub messages_delivered: AtomicU64,
    /// Messages dropped because an outbox was full
    pub messages_dropped: AtomicU64,
    /// Connections evicted for falling too far behind
    pub slow_consumer_disconnects: AtomicU64,
    /// Raw payloads received from the notification source
    pub notifications_received: AtomicU64,
    /// Raw payloads discarded as malformed
    pub payloads_rejected: AtomicU64,
    /// Times the bridge lost its subscription and resubscribed
    pub bridge_resubscribes: AtomicU64,
}

impl EngineMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly registered connection
    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an unregistered connection
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record `count` delivered messages
    pub fn delivered(&self, count: u64) {
        self.messages_delivered.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a dropped message
    pub fn dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a slow consumer eviction
    pub fn slow_consumer_disconnected(&self) {
        self.slow_consumer_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a raw payload from the source
    pub fn notification_received(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a malformed payload
    pub fn payload_rejected(&self) {
        self.payloads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lost subscription
    pub fn bridge_resubscribed(&self) {
        self.bridge_resubscribes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            slow_consumer_disconnects: self.slow_consumer_disconnects.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            payloads_rejected: self.payloads_rejected.load(Ordering::Relaxed),
            bridge_resubscribes: self.bridge_resubscribes.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total connections ever registered
    pub connections_total: u64,
    /// Connections currently registered
    pub connections_active: u64,
    /// Messages enqueued onto an outbox
    pub messages_delivered: u64,
    /// Messages dropped because an outbox was full
    pub messages_dropped: u64,
    /// Connections evicted for falling too far behind
    pub slow_consumer_disconnects: u64,
    /// Raw payloads received from the notification source
    pub notifications_received: u64,
    /// Raw payloads discarded as malformed
    pub payloads_rejected: u64,
    /// Times the bridge lost its subscription and resubscribed
    pub bridge_resubscribes: u64,
}
