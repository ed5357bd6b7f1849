use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::connection::{ConnectionTable, SendFailure};
use crate::metrics::PresenceMetrics;
use crate::websocket::{OutboundMessage, ServerMessage};

use super::ConnectionRegistry;

/// Default event name carrying the online set
pub const DEFAULT_PRESENCE_EVENT: &str = "getOnlineUsers";

/// Pushes the global online set to every open connection.
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    connections: Arc<ConnectionTable>,
    event_name: String,
    announcements: AtomicU64,
}

impl PresenceBroadcaster {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        connections: Arc<ConnectionTable>,
        event_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            connections,
            event_name: event_name.into(),
            announcements: AtomicU64::new(0),
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Total announcements made since startup
    pub fn announcements(&self) -> u64 {
        self.announcements.load(Ordering::Relaxed)
    }

    /// Send the current presence set to every open connection, identified or not.
    ///
    /// Sends are fire-and-forget: a full or closed connection is skipped.
    #[tracing::instrument(name = "presence.announce", skip(self))]
    pub fn announce(&self) {
        let online = self.registry.list_identities();
        let message = ServerMessage::presence(&self.event_name, &online);

        let outbound = match OutboundMessage::preserialized(&message) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to pre-serialize presence frame");
                OutboundMessage::Raw(message)
            }
        };

        let connections = self.connections.all();
        let mut sent = 0usize;
        let mut skipped = 0usize;

        for conn in &connections {
            match conn.try_send_outbound(outbound.clone()) {
                Ok(()) => sent += 1,
                Err(SendFailure::Full) => {
                    skipped += 1;
                    tracing::debug!(connection_id = %conn.id, "Outbound queue full, presence frame dropped");
                }
                Err(SendFailure::Closed) => skipped += 1,
            }
        }

        self.announcements.fetch_add(1, Ordering::Relaxed);
        PresenceMetrics::record_announcement(online.len());

        tracing::debug!(
            online = online.len(),
            sent = sent,
            skipped = skipped,
            "Presence announced"
        );
    }
}
