//! Connection registry: at most one live connection per client ID.

use crate::actors::ConnectionActorHandle;

use common::types::{ClientId, ConnectionId, RoomId};
use std::collections::{BTreeSet, HashMap};

/// A registered connection and the rooms it is subscribed to.
#[derive(Debug)]
pub struct RegisteredConnection {
    pub handle: ConnectionActorHandle,
    pub subscriptions: BTreeSet<RoomId>,
}

/// Client ID to live connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: HashMap<ClientId, RegisteredConnection>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handle` under its client ID, returning whatever it displaced.
    ///
    /// Callers that care about the displaced connection's rooms must clean
    /// them up before calling this.
    pub fn insert(&mut self, handle: ConnectionActorHandle) -> Option<RegisteredConnection> {
        self.entries.insert(
            handle.client_id().clone(),
            RegisteredConnection {
                handle,
                subscriptions: BTreeSet::new(),
            },
        )
    }

    #[must_use]
    pub fn lookup(&self, client_id: &ClientId) -> Option<&ConnectionActorHandle> {
        self.entries.get(client_id).map(|entry| &entry.handle)
    }

    pub fn lookup_mut(&mut self, client_id: &ClientId) -> Option<&mut RegisteredConnection> {
        self.entries.get_mut(client_id)
    }

    /// Whether `connection_id` is the registered connection for `client_id`.
    #[must_use]
    pub fn is_current(&self, client_id: &ClientId, connection_id: ConnectionId) -> bool {
        self.lookup(client_id)
            .is_some_and(|handle| handle.connection_id() == connection_id)
    }

    /// Remove the entry for `client_id`. No-op if absent.
    pub fn unregister(&mut self, client_id: &ClientId) -> Option<RegisteredConnection> {
        self.entries.remove(client_id)
    }

    /// Rooms the client is subscribed to.
    #[must_use]
    pub fn subscriptions_of(&self, client_id: &ClientId) -> Option<&BTreeSet<RoomId>> {
        self.entries.get(client_id).map(|entry| &entry.subscriptions)
    }

    pub fn handles(&self) -> impl Iterator<Item = &ConnectionActorHandle> {
        self.entries.values().map(|entry| &entry.handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = ConnectionRegistry::new();
        let (handle, _rx) = ConnectionActorHandle::detached("alice", 4);
        let connection_id = handle.connection_id();

        assert!(registry.insert(handle).is_none());

        let alice = ClientId::from("alice");
        assert_eq!(
            registry.lookup(&alice).map(ConnectionActorHandle::connection_id),
            Some(connection_id)
        );
        assert!(registry.is_current(&alice, connection_id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_insert_displaces_previous_connection() {
        let mut registry = ConnectionRegistry::new();
        let (first, _rx1) = ConnectionActorHandle::detached("alice", 4);
        let (second, _rx2) = ConnectionActorHandle::detached("alice", 4);
        let first_id = first.connection_id();
        let second_id = second.connection_id();

        registry.insert(first);
        let displaced = registry.insert(second).expect("first should be displaced");

        let alice = ClientId::from("alice");
        assert_eq!(displaced.handle.connection_id(), first_id);
        assert!(!registry.is_current(&alice, first_id));
        assert!(registry.is_current(&alice, second_id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.unregister(&ClientId::from("ghost")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_subscriptions_tracked_per_entry() {
        let mut registry = ConnectionRegistry::new();
        let (handle, _rx) = ConnectionActorHandle::detached("alice", 4);
        registry.insert(handle);

        let alice = ClientId::from("alice");
        registry
            .lookup_mut(&alice)
            .expect("registered")
            .subscriptions
            .insert(RoomId::from("lobby"));

        let rooms = registry.subscriptions_of(&alice).expect("registered");
        assert!(rooms.contains(&RoomId::from("lobby")));
        assert!(registry.subscriptions_of(&ClientId::from("bob")).is_none());
    }
}
