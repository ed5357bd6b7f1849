use std::sync::Arc;

use dashmap::DashMap;

use super::{ConnectionHandle, ConnectionId};

/// Every open transport session, identified or anonymous.
///
/// This is the transport-level "all" used by broadcasts and heartbeats;
/// identity routing lives in the presence registry.
pub struct ConnectionTable {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn insert(&self, handle: Arc<ConnectionHandle>) {
        self.connections.insert(handle.id, handle);
    }

    pub fn remove(&self, connection_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(&connection_id).map(|(_, handle)| handle)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    /// Snapshot of all open connections
    pub fn all(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn clear(&self) {
        self.connections.clear();
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}
