//! Notification events and the messages rendered from them.

pub mod event;
pub mod types;

pub use event::NotificationEvent;
pub use types::{render, OutboundMessage};
