//! Structured change notification.

use serde::{Deserialize, Serialize};

use txnwatch_core::types::EntityId;

/// One parsed change notification: entity `subject_id` moved to `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Entity the notification concerns.
    pub subject_id: EntityId,
    /// New status, passed through verbatim.
    pub status: String,
}

impl NotificationEvent {
    /// Creates a new event.
    pub fn new(subject_id: impl Into<EntityId>, status: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            status: status.into(),
        }
    }
}
