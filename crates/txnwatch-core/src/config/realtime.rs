//! Real-time WebSocket engine configuration.

use serde::{Deserialize, Serialize};

/// Wire encoding for messages pushed to subscribers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// `Transaction <id> status changed to <status>`.
    #[default]
    Text,
    /// Versioned JSON envelope.
    Json,
}

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbox.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
    /// Capacity of the hub's command queue.
    #[serde(default = "default_hub_queue_capacity")]
    pub hub_queue_capacity: usize,
    /// Cumulative dropped messages after which a slow connection is
    /// disconnected. `0` never disconnects.
    #[serde(default = "default_max_dropped")]
    pub max_dropped_messages: u64,
    /// WebSocket ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Seconds without any inbound frame before a connection is torn down.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// Seconds teardown waits for the close frame to flush.
    #[serde(default = "default_close_grace")]
    pub close_grace_seconds: u64,
    /// Encoding of pushed messages.
    #[serde(default)]
    pub message_format: MessageFormat,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: default_outbox_capacity(),
            hub_queue_capacity: default_hub_queue_capacity(),
            max_dropped_messages: default_max_dropped(),
            ping_interval_seconds: default_ping_interval(),
            idle_timeout_seconds: default_idle_timeout(),
            close_grace_seconds: default_close_grace(),
            message_format: MessageFormat::default(),
        }
    }
}

fn default_outbox_capacity() -> usize {
    256
}

fn default_hub_queue_capacity() -> usize {
    1024
}

fn default_max_dropped() -> u64 {
    100
}

fn default_ping_interval() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    90
}

fn default_close_grace() -> u64 {
    5
}
