//! Prometheus metrics for the real-time layer.
//!
//! - Connection metrics (open connections, identified users, open/close counts)
//! - Event delivery metrics by event name (delivered, offline, dropped)
//! - Presence broadcast metrics

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::events::{NEW_MESSAGE_EVENT, NOTIFICATION_EVENT};
use crate::presence::DEFAULT_PRESENCE_EVENT;

/// Prefix for all metrics
const METRIC_PREFIX: &str = "social_realtime";

/// Label for event names outside the known set
const OTHER_EVENT_LABEL: &str = "other";

lazy_static! {
    /// Number of open WebSocket connections (identified and anonymous)
    pub static ref CONNECTIONS_OPEN: IntGauge = register_int_gauge!(
        format!("{}_connections_open", METRIC_PREFIX),
        "Number of open WebSocket connections"
    ).unwrap();

    /// Number of identities present in the registry
    pub static ref USERS_ONLINE: IntGauge = register_int_gauge!(
        format!("{}_users_online", METRIC_PREFIX),
        "Number of identities currently online"
    ).unwrap();

    pub static ref CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    pub static ref CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    /// Connection duration
    pub static ref CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 1800.0, 3600.0, 14400.0]
    ).unwrap();

    /// Events delivered by outcome and event name (known names only, see `event_label`)
    pub static ref EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_events_total", METRIC_PREFIX),
        "Application events routed, by outcome",
        &["event", "outcome"]
    ).unwrap();

    pub static ref PRESENCE_ANNOUNCEMENTS: IntCounter = register_int_counter!(
        format!("{}_presence_announcements_total", METRIC_PREFIX),
        "Total presence broadcasts"
    ).unwrap();

    /// Online set size carried by the latest announcement
    pub static ref PRESENCE_SET_SIZE: IntGauge = register_int_gauge!(
        format!("{}_presence_set_size", METRIC_PREFIX),
        "Identities in the most recent presence broadcast"
    ).unwrap();
}

pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        CONNECTIONS_OPENED.inc();
        CONNECTIONS_OPEN.inc();
    }

    pub fn record_closed() {
        CONNECTIONS_CLOSED.inc();
        CONNECTIONS_OPEN.dec();
    }

    pub fn set_identified(count: usize) {
        USERS_ONLINE.set(count as i64);
    }

    pub fn observe_duration(seconds: f64) {
        CONNECTION_DURATION.observe(seconds);
    }
}

/// Map a caller-supplied event name onto the fixed label set
pub fn event_label(event: &str) -> &'static str {
    match event {
        NEW_MESSAGE_EVENT => NEW_MESSAGE_EVENT,
        NOTIFICATION_EVENT => NOTIFICATION_EVENT,
        DEFAULT_PRESENCE_EVENT => DEFAULT_PRESENCE_EVENT,
        _ => OTHER_EVENT_LABEL,
    }
}

pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_delivered(event: &str) {
        EVENTS_TOTAL.with_label_values(&[event_label(event), "delivered"]).inc();
    }

    pub fn record_offline(event: &str) {
        EVENTS_TOTAL.with_label_values(&[event_label(event), "offline"]).inc();
    }

    pub fn record_dropped(event: &str) {
        EVENTS_TOTAL.with_label_values(&[event_label(event), "dropped"]).inc();
    }
}

pub struct PresenceMetrics;

impl PresenceMetrics {
    pub fn record_announcement(online: usize) {
        PRESENCE_ANNOUNCEMENTS.inc();
        PRESENCE_SET_SIZE.set(online as i64);
    }
}

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_registered_metrics() {
        DeliveryMetrics::record_offline("newMessage");
        PresenceMetrics::record_announcement(2);

        let text = encode_metrics().unwrap();
        assert!(text.contains("social_realtime_events_total"));
        assert!(text.contains("social_realtime_presence_announcements_total"));
    }

    #[test]
    fn test_unknown_event_names_share_one_label() {
        for i in 0..200 {
            DeliveryMetrics::record_offline(&format!("caller-event-{}", i));
        }

        let text = encode_metrics().unwrap();
        assert!(!text.contains("caller-event-"));
        assert!(EVENTS_TOTAL.with_label_values(&["other", "offline"]).get() >= 200);

        assert_eq!(event_label("newMessage"), "newMessage");
        assert_eq!(event_label("getNotification"), "getNotification");
        assert_eq!(event_label("getOnlineUsers"), "getOnlineUsers");
        assert_eq!(event_label("evt-1"), "other");
    }
}
