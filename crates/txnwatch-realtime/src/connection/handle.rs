//! Individual connection handle and its outbox.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use txnwatch_core::types::{ConnectionId, EntityId};

/// Outcome of offering a message to a connection's outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was queued.
    Queued,
    /// The outbox was full; the message was dropped. Carries the
    /// connection's cumulative drop count.
    Dropped(u64),
    /// The consumer side is gone.
    Closed,
}

/// The hub's side of a connection.
///
/// Holds the only sender for the connection's outbox, so dropping the
/// handle closes the outbox and tells the outbound pump to finish.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Entity this connection wants notifications for
    pub subscription: EntityId,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<String>,
    dropped: u64,
}

impl ConnectionHandle {
    /// Offer a message without waiting. A full outbox drops the new message.
    pub fn offer(&mut self, msg: String) -> Delivery {
        match self.sender.try_send(msg) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped += 1;
                Delivery::Dropped(self.dropped)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Messages dropped so far because the outbox was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Time since the connection was established.
    pub fn connected_for(&self) -> chrono::Duration {
        Utc::now() - self.connected_at
    }
}

/// The pump's side of a connection: a FIFO of rendered messages.
#[derive(Debug)]
pub struct Outbox {
    /// Owning connection
    pub id: ConnectionId,
    receiver: mpsc::Receiver<String>,
}

impl Outbox {
    /// Next queued message, or `None` once the hub has let go of the
    /// connection and the queue is drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

/// Create a new connection subscribed to `subscription` with an outbox of
/// `capacity` messages.
pub fn open(subscription: EntityId, capacity: usize) -> (ConnectionHandle, Outbox) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let id = ConnectionId::new();
    let handle = ConnectionHandle {
        id,
        subscription,
        connected_at: Utc::now(),
        sender,
        dropped: 0,
    };
    (handle, Outbox { id, receiver })
}
