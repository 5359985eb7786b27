//! Bridges the database notification stream into hub broadcasts.

pub mod backoff;
pub mod memory_source;
pub mod notification_bridge;
pub mod payload;

pub use backoff::BackoffPolicy;
pub use memory_source::{MemoryNotificationSource, MemoryPublisher};
pub use notification_bridge::NotificationBridge;
pub use payload::{parse_payload, PayloadError};
