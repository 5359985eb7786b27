//! Live connection registry, indexed by connection and by subscription.

use std::collections::HashMap;

use txnwatch_core::types::{ConnectionId, EntityId};

use crate::connection::handle::ConnectionHandle;

/// Set of live connections.
///
/// Plain data: the hub loop owns it exclusively, so no locking is needed.
#[derive(Debug, Default)]
pub struct Registry {
    /// Subscription → connections subscribed to it.
    by_subscription: HashMap<EntityId, HashMap<ConnectionId, ConnectionHandle>>,
    /// Connection → its subscription, for removal by ID.
    subscriptions: HashMap<ConnectionId, EntityId>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection. Returns `false` (and drops `handle`) if a
    /// connection with the same ID is already present.
    pub fn insert(&mut self, handle: ConnectionHandle) -> bool {
        if self.subscriptions.contains_key(&handle.id) {
            return false;
        }
        self.subscriptions.insert(handle.id, handle.subscription);
        self.by_subscription
            .entry(handle.subscription)
            .or_default()
            .insert(handle.id, handle);
        true
    }

    /// Removes a connection, returning its handle if it was present.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionHandle> {
        let subscription = self.subscriptions.remove(id)?;
        let bucket = self.by_subscription.get_mut(&subscription)?;
        let handle = bucket.remove(id);
        if bucket.is_empty() {
            self.by_subscription.remove(&subscription);
        }
        handle
    }

    /// Connections subscribed to `subject`.
    pub fn subscribers_mut(
        &mut self,
        subject: EntityId,
    ) -> impl Iterator<Item = &mut ConnectionHandle> {
        self.by_subscription
            .get_mut(&subject)
            .into_iter()
            .flat_map(|bucket| bucket.values_mut())
    }

    /// Number of connections subscribed to `subject`.
    pub fn subscriber_count(&self, subject: EntityId) -> usize {
        self.by_subscription.get(&subject).map_or(0, HashMap::len)
    }

    /// Total live connections.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no connections are live.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Removes and returns every connection.
    pub fn drain(&mut self) -> Vec<ConnectionHandle> {
        self.subscriptions.clear();
        self.by_subscription
            .drain()
            .flat_map(|(_, bucket)| bucket.into_values())
            .collect()
    }
}
