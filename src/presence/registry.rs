use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::ConnectionHandle;

use super::{Identity, PresenceSet};

/// Authoritative map from identity to its live connection.
///
/// One handle per identity; a later `register` for the same identity
/// replaces the earlier handle. All operations take the lock briefly and
/// never wait on I/O, so register/unregister/list are linearizable.
pub struct ConnectionRegistry {
    entries: RwLock<BTreeMap<Identity, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Map `identity` to `handle`, overwriting any previous mapping.
    pub fn register(&self, identity: Identity, handle: Arc<ConnectionHandle>) {
        let connection_id = handle.id;
        let replaced = self.entries.write().insert(identity.clone(), handle);

        match replaced {
            Some(previous) if previous.id != connection_id => {
                tracing::info!(
                    user_id = %identity,
                    connection_id = %connection_id,
                    replaced_connection_id = %previous.id,
                    "Identity re-registered, previous connection no longer routable"
                );
            }
            _ => {
                tracing::debug!(user_id = %identity, connection_id = %connection_id, "Identity registered");
            }
        }
    }

    /// Current handle for `identity`, or `None` when offline
    pub fn lookup(&self, identity: &str) -> Option<Arc<ConnectionHandle>> {
        self.entries.read().get(identity).cloned()
    }

    /// Remove the mapping for `identity`. No-op when absent.
    pub fn unregister(&self, identity: &str) {
        if let Some(handle) = self.entries.write().remove(identity) {
            tracing::debug!(user_id = %identity, connection_id = %handle.id, "Identity unregistered");
        }
    }

    /// Snapshot of the identities currently present
    pub fn list_identities(&self) -> PresenceSet {
        self.entries.read().keys().cloned().collect()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.read().contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
