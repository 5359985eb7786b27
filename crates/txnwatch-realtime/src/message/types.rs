//! Outbound message rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use txnwatch_core::config::MessageFormat;
use txnwatch_core::types::EntityId;
use txnwatch_core::AppResult;

use super::event::NotificationEvent;

/// Current version of the JSON envelope.
pub const MESSAGE_VERSION: u32 = 1;

/// Structured messages sent by the server when `message_format = "json"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// An entity's status changed.
    StatusChanged {
        /// Envelope version.
        version: u32,
        /// Entity ID.
        subject_id: EntityId,
        /// New status.
        status: String,
        /// Time the server relayed the change.
        timestamp: DateTime<Utc>,
    },
}

impl OutboundMessage {
    /// Builds a status-changed message stamped with the current time.
    pub fn status_changed(event: &NotificationEvent) -> Self {
        Self::StatusChanged {
            version: MESSAGE_VERSION,
            subject_id: event.subject_id,
            status: event.status.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Render `event` as the text pushed to subscribers.
pub fn render(event: &NotificationEvent, format: MessageFormat) -> AppResult<String> {
    match format {
        MessageFormat::Text => Ok(format!(
            "Transaction {} status changed to {}",
            event.subject_id, event.status
        )),
        MessageFormat::Json => Ok(serde_json::to_string(&OutboundMessage::status_changed(event))?),
    }
}
