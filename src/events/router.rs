use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::connection::SendFailure;
use crate::metrics::DeliveryMetrics;
use crate::presence::ConnectionRegistry;
use crate::websocket::ServerMessage;

/// Counters for the event router
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Events handed to a live connection
    pub delivered: AtomicU64,
    /// Events discarded because the recipient was offline
    pub offline: AtomicU64,
    /// Events dropped by a full or already closed connection
    pub dropped: AtomicU64,
}

impl RouterStats {
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            offline: self.offline.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of router statistics
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatsSnapshot {
    pub delivered: u64,
    pub offline: u64,
    pub dropped: u64,
}

/// Best-effort delivery of application events to one recipient.
///
/// Fire-and-forget and at-most-once: callers are never told whether the
/// event arrived, so durable state must be persisted before calling
/// [`EventRouter::deliver`].
pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    stats: RouterStats,
}

impl EventRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            stats: RouterStats::default(),
        }
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Push `payload` tagged with `event_name` to the live connection of `target`.
    ///
    /// Offline recipients and connections that closed after lookup are
    /// silently skipped.
    #[tracing::instrument(name = "router.deliver", skip(self, payload))]
    pub fn deliver(&self, target: &str, event_name: &str, payload: serde_json::Value) {
        let Some(handle) = self.registry.lookup(target) else {
            self.stats.offline.fetch_add(1, Ordering::Relaxed);
            DeliveryMetrics::record_offline(event_name);
            tracing::debug!(user_id = %target, event = %event_name, "Recipient offline, event discarded");
            return;
        };

        match handle.try_send(ServerMessage::new(event_name, payload)) {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                DeliveryMetrics::record_delivered(event_name);
                tracing::debug!(
                    user_id = %target,
                    connection_id = %handle.id,
                    event = %event_name,
                    "Event delivered"
                );
            }
            Err(failure) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                DeliveryMetrics::record_dropped(event_name);
                match failure {
                    SendFailure::Full => tracing::warn!(
                        user_id = %target,
                        connection_id = %handle.id,
                        event = %event_name,
                        "Outbound queue full, event dropped"
                    ),
                    SendFailure::Closed => tracing::debug!(
                        user_id = %target,
                        connection_id = %handle.id,
                        event = %event_name,
                        "Connection closed after lookup, event dropped"
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionHandle;
    use crate::presence::Identity;
    use crate::websocket::OutboundMessage;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn register(
        registry: &ConnectionRegistry,
        user: &str,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(4);
        let handle = Arc::new(ConnectionHandle::new(tx));
        registry.register(Identity::parse(user).unwrap(), handle.clone());
        (handle, rx)
    }

    #[test]
    fn test_deliver_to_offline_is_silent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = EventRouter::new(registry);

        router.deliver("ghost", "newMessage", json!({"m": 1}));

        let stats = router.stats();
        assert_eq!(stats.offline, 1);
        assert_eq!(stats.delivered, 0);
    }

    #[test]
    fn test_deliver_sends_exactly_once() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_handle, mut rx) = register(&registry, "u2");
        let router = EventRouter::new(registry);

        router.deliver("u2", "newMessage", json!({"m": 1}));

        let text = rx.try_recv().unwrap().to_json().unwrap();
        let msg: ServerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(msg, ServerMessage::new("newMessage", json!({"m": 1})));
        assert!(rx.try_recv().is_err());
        assert_eq!(router.stats().delivered, 1);
    }

    #[test]
    fn test_deliver_after_close_is_silent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_handle, rx) = register(&registry, "u3");
        let router = EventRouter::new(registry);

        // Session ended but the mapping is still present
        drop(rx);
        router.deliver("u3", "getNotification", json!({"type": "like"}));

        assert_eq!(router.stats().dropped, 1);
    }

    #[test]
    fn test_caller_event_names_do_not_grow_metric_series() {
        let router = EventRouter::new(Arc::new(ConnectionRegistry::new()));

        for i in 0..1000 {
            router.deliver("nobody", &format!("evt-{}", i), serde_json::Value::Null);
        }

        let text = crate::metrics::encode_metrics().unwrap();
        let series = text
            .lines()
            .filter(|line| line.starts_with("social_realtime_events_total{"))
            .count();
        // Three known names plus "other", three outcomes each
        assert!(series <= 12, "unbounded event label: {} series", series);
        assert_eq!(router.stats().offline, 1000);
    }
}
