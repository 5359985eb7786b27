//! Requests processed by the hub loop.

use tokio::sync::oneshot;

use txnwatch_core::types::{ConnectionId, EntityId};

use crate::connection::handle::ConnectionHandle;
use crate::message::event::NotificationEvent;

/// A single serialized operation against the registry.
#[derive(Debug)]
pub enum HubCommand {
    /// Add a connection.
    Register(ConnectionHandle),
    /// Remove a connection and close its outbox.
    Unregister(ConnectionId),
    /// Deliver an event to matching connections.
    Broadcast(NotificationEvent),
    /// Report the number of live connections.
    ConnectionCount(oneshot::Sender<usize>),
    /// Report the number of live connections subscribed to an entity.
    SubscriberCount(EntityId, oneshot::Sender<usize>),
    /// Drop every connection and stop the loop.
    Shutdown,
}
