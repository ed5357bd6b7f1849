use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::{ConnectionHandle, ConnectionTable};
use crate::metrics::ConnectionMetrics;

use super::{ConnectionRegistry, Identity, PresenceBroadcaster};

/// Presence state of one transport session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No identity in the handshake; invisible to presence and routing
    Unidentified,
    /// Registered under the identity captured at open time
    Identified(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Unidentified => None,
            Self::Identified(identity) => Some(identity),
        }
    }
}

/// Binds transport open/close events to registry mutations and presence announcements.
pub struct ConnectionLifecycleHandler {
    registry: Arc<ConnectionRegistry>,
    connections: Arc<ConnectionTable>,
    broadcaster: Arc<PresenceBroadcaster>,
    /// Serializes mutation + announce pairs so broadcasts follow mutation order
    transitions: Mutex<()>,
    /// Open sessions that carried no identity
    anonymous: AtomicUsize,
}

impl ConnectionLifecycleHandler {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        connections: Arc<ConnectionTable>,
        broadcaster: Arc<PresenceBroadcaster>,
    ) -> Self {
        Self {
            registry,
            connections,
            broadcaster,
            transitions: Mutex::new(()),
            anonymous: AtomicUsize::new(0),
        }
    }

    /// Open sessions without an identity. Extra tabs of a registered
    /// identity are not counted here.
    pub fn anonymous_connections(&self) -> usize {
        self.anonymous.load(Ordering::Relaxed)
    }

    /// Forget session counters; used when the hub is torn down
    pub fn reset(&self) {
        self.anonymous.store(0, Ordering::Relaxed);
    }

    /// Handle a newly opened session.
    ///
    /// The session joins the connection table first so it receives the
    /// announcement its own registration triggers.
    pub fn on_open(&self, handle: Arc<ConnectionHandle>, identity: Option<Identity>) -> SessionState {
        self.connections.insert(handle.clone());
        ConnectionMetrics::record_opened();

        let Some(identity) = identity else {
            self.anonymous.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(connection_id = %handle.id, "Anonymous connection opened");
            return SessionState::Unidentified;
        };

        {
            let _guard = self.transitions.lock();
            self.registry.register(identity.clone(), handle.clone());
            self.broadcaster.announce();
            ConnectionMetrics::set_identified(self.registry.len());
        }

        tracing::info!(connection_id = %handle.id, user_id = %identity, "User connected");
        SessionState::Identified(identity)
    }

    /// Handle a closed session using the state captured at open time.
    pub fn on_close(&self, handle: &ConnectionHandle, state: SessionState) {
        self.connections.remove(handle.id);
        ConnectionMetrics::record_closed();

        match state {
            SessionState::Identified(identity) => {
                {
                    let _guard = self.transitions.lock();
                    self.registry.unregister(identity.as_str());
                    self.broadcaster.announce();
                    ConnectionMetrics::set_identified(self.registry.len());
                }

                tracing::info!(connection_id = %handle.id, user_id = %identity, "User disconnected");
            }
            SessionState::Unidentified => {
                // Saturating: a reset during shutdown may race a late close
                let _ = self
                    .anonymous
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
                tracing::debug!(connection_id = %handle.id, "Anonymous connection closed");
            }
        }
    }
}
