//! Owned entry point for the real-time layer.

use std::sync::Arc;

use serde::Serialize;

use crate::config::PresenceConfig;
use crate::connection::ConnectionTable;
use crate::events::{EventRouter, RouterStatsSnapshot};
use crate::presence::{
    ConnectionLifecycleHandler, ConnectionRegistry, PresenceBroadcaster, PresenceSet,
};

/// Wires the registry, connection table, router, broadcaster and lifecycle
/// handler together. Created once at startup and shared through `Arc`.
pub struct RealtimeHub {
    registry: Arc<ConnectionRegistry>,
    connections: Arc<ConnectionTable>,
    router: Arc<EventRouter>,
    broadcaster: Arc<PresenceBroadcaster>,
    lifecycle: Arc<ConnectionLifecycleHandler>,
}

/// Connection and delivery statistics
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub open_connections: usize,
    pub identified_users: usize,
    /// Sessions opened without an identity
    pub anonymous_connections: usize,
    pub presence_announcements: u64,
    pub events: RouterStatsSnapshot,
}

impl RealtimeHub {
    pub fn new(config: &PresenceConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let connections = Arc::new(ConnectionTable::new());
        let router = Arc::new(EventRouter::new(registry.clone()));
        let broadcaster = Arc::new(PresenceBroadcaster::new(
            registry.clone(),
            connections.clone(),
            config.presence_event.clone(),
        ));
        let lifecycle = Arc::new(ConnectionLifecycleHandler::new(
            registry.clone(),
            connections.clone(),
            broadcaster.clone(),
        ));

        tracing::debug!(presence_event = %config.presence_event, "Realtime hub created");

        Self {
            registry,
            connections,
            router,
            broadcaster,
            lifecycle,
        }
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn lifecycle(&self) -> &Arc<ConnectionLifecycleHandler> {
        &self.lifecycle
    }

    pub fn broadcaster(&self) -> &Arc<PresenceBroadcaster> {
        &self.broadcaster
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn connections(&self) -> &Arc<ConnectionTable> {
        &self.connections
    }

    /// Identities currently online
    pub fn online_users(&self) -> PresenceSet {
        self.registry.list_identities()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            open_connections: self.connections.len(),
            identified_users: self.registry.len(),
            anonymous_connections: self.lifecycle.anonymous_connections(),
            presence_announcements: self.broadcaster.announcements(),
            events: self.router.stats(),
        }
    }

    /// Drop all in-memory presence state. Called once at process shutdown.
    pub fn shutdown(&self) {
        let open = self.connections.len();
        self.registry.clear();
        self.connections.clear();
        self.lifecycle.reset();
        tracing::info!(dropped_connections = open, "Realtime hub cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionHandle;
    use crate::presence::Identity;
    use tokio::sync::mpsc;

    #[test]
    fn test_shutdown_clears_state() {
        let hub = RealtimeHub::new(&PresenceConfig::default());
        let (tx, _rx) = mpsc::channel(8);
        let handle = Arc::new(ConnectionHandle::new(tx));
        hub.lifecycle().on_open(handle, Identity::parse("u1"));
        let (tx, _anon_rx) = mpsc::channel(8);
        hub.lifecycle()
            .on_open(Arc::new(ConnectionHandle::new(tx)), None);

        assert_eq!(hub.stats().identified_users, 1);

        hub.shutdown();

        let stats = hub.stats();
        assert_eq!(stats.open_connections, 0);
        assert_eq!(stats.identified_users, 0);
        assert_eq!(stats.anonymous_connections, 0);
        assert!(hub.online_users().is_empty());
    }
}
