//! # txnwatch-realtime
//!
//! Real-time fan-out engine for txnwatch. Provides:
//!
//! - The connection registry and the hub that serializes register,
//!   unregister and broadcast against it
//! - Per-connection inbound/outbound pumps with heartbeat and idle timeout
//! - The notification bridge that turns `LISTEN/NOTIFY` payloads into
//!   broadcasts, with supervised resubscription
//! - Engine-level metrics counters

pub mod bridge;
pub mod connection;
pub mod hub;
pub mod message;
pub mod metrics;
pub mod server;

pub use bridge::NotificationBridge;
pub use hub::{Hub, HubHandle};
pub use message::NotificationEvent;
pub use server::RealtimeEngine;
