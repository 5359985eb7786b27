//! Notification bridge configuration.

use serde::{Deserialize, Serialize};

/// Settings for the `LISTEN/NOTIFY` bridge and its reconnect supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Notification channel name to `LISTEN` on.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Delay before the first resubscribe attempt, in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Upper bound for the resubscribe delay, in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Multiplicative growth factor between attempts.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Consecutive failed subscribe attempts tolerated before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_factor: default_backoff_factor(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_channel() -> String {
    "transaction_status_changed".to_string()
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_retries() -> u32 {
    10
}
