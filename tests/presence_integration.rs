//! Presence and event delivery scenarios driven through the public hub API.
//!
//! Each connection is a real `ConnectionHandle` whose outbound channel
//! stands in for the WebSocket writer.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use social_realtime::config::PresenceConfig;
use social_realtime::connection::ConnectionHandle;
use social_realtime::hub::RealtimeHub;
use social_realtime::presence::{Identity, SessionState};
use social_realtime::websocket::{OutboundMessage, ServerMessage};

struct TestConnection {
    handle: Arc<ConnectionHandle>,
    rx: mpsc::Receiver<OutboundMessage>,
    state: Option<SessionState>,
}

impl TestConnection {
    fn open(hub: &RealtimeHub, user_id: Option<&str>) -> Self {
        let (tx, rx) = mpsc::channel(128);
        let handle = Arc::new(ConnectionHandle::new(tx));
        let state = hub
            .lifecycle()
            .on_open(handle.clone(), user_id.and_then(Identity::parse));
        Self {
            handle,
            rx,
            state: Some(state),
        }
    }

    fn close(&mut self, hub: &RealtimeHub) {
        let state = self.state.take().expect("connection already closed");
        hub.lifecycle().on_close(&self.handle, state);
    }

    /// All frames received so far
    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut frames = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            let text = msg.to_json().unwrap();
            frames.push(serde_json::from_str(&text).unwrap());
        }
        frames
    }
}

fn hub() -> RealtimeHub {
    RealtimeHub::new(&PresenceConfig::default())
}

fn presence_payloads(frames: &[ServerMessage]) -> Vec<serde_json::Value> {
    frames
        .iter()
        .filter(|f| f.event == "getOnlineUsers")
        .map(|f| f.data.clone())
        .collect()
}

mod lifecycle_scenarios {
    use super::*;

    #[test]
    fn test_two_users_connect_then_one_leaves() {
        let hub = hub();

        let mut a = TestConnection::open(&hub, Some("u1"));
        assert_eq!(hub.registry().lookup("u1").unwrap().id, a.handle.id);

        let mut b = TestConnection::open(&hub, Some("u2"));
        assert_eq!(hub.registry().len(), 2);

        // A saw both announcements, B only its own
        assert_eq!(
            presence_payloads(&a.drain()),
            vec![json!(["u1"]), json!(["u1", "u2"])]
        );
        assert_eq!(presence_payloads(&b.drain()), vec![json!(["u1", "u2"])]);

        a.close(&hub);
        assert!(hub.registry().lookup("u1").is_none());
        assert_eq!(presence_payloads(&b.drain()), vec![json!(["u2"])]);
        assert!(a.drain().is_empty());

        // u1 is offline now
        hub.router().deliver("u1", "newMessage", json!({"m": 0}));
        assert!(a.drain().is_empty());
        assert!(b.drain().is_empty());

        hub.router().deliver("u2", "newMessage", json!({"m": 1}));
        let frames = b.drain();
        assert_eq!(frames, vec![ServerMessage::new("newMessage", json!({"m": 1}))]);
    }

    #[test]
    fn test_anonymous_connection_receives_broadcasts_but_is_not_present() {
        let hub = hub();

        let mut c = TestConnection::open(&hub, None);
        assert!(hub.registry().is_empty());
        assert!(c.drain().is_empty(), "anonymous open must not announce");

        let mut a = TestConnection::open(&hub, Some("u1"));
        assert_eq!(presence_payloads(&c.drain()), vec![json!(["u1"])]);

        a.close(&hub);
        assert_eq!(presence_payloads(&c.drain()), vec![json!([])]);

        let announcements = hub.stats().presence_announcements;
        c.close(&hub);
        assert_eq!(hub.stats().presence_announcements, announcements);
        assert_eq!(hub.stats().open_connections, 0);
    }

    #[test]
    fn test_empty_user_id_is_anonymous() {
        let hub = hub();
        let mut conn = TestConnection::open(&hub, Some(""));

        assert_eq!(conn.state, Some(SessionState::Unidentified));
        assert!(hub.online_users().is_empty());
        assert!(conn.drain().is_empty());
    }

    #[test]
    fn test_padded_identity_is_kept_verbatim() {
        let hub = hub();
        let mut conn = TestConnection::open(&hub, Some(" u1"));

        assert_eq!(conn.state, Identity::parse(" u1").map(SessionState::Identified));
        assert_eq!(presence_payloads(&conn.drain()), vec![json!([" u1"])]);
        assert!(hub.registry().lookup("u1").is_none());

        hub.router().deliver(" u1", "newMessage", json!({"m": 1}));
        assert_eq!(
            conn.drain(),
            vec![ServerMessage::new("newMessage", json!({"m": 1}))]
        );
    }

    #[test]
    fn test_whitespace_identity_is_registered() {
        let hub = hub();
        let mut conn = TestConnection::open(&hub, Some("  "));

        assert!(matches!(conn.state, Some(SessionState::Identified(_))));
        assert!(hub.registry().contains("  "));
        assert_eq!(presence_payloads(&conn.drain()), vec![json!(["  "])]);
    }

    #[test]
    fn test_second_tab_is_not_counted_as_anonymous() {
        let hub = hub();
        let mut first = TestConnection::open(&hub, Some("u1"));
        let _second = TestConnection::open(&hub, Some("u1"));
        let mut anon = TestConnection::open(&hub, None);

        let stats = hub.stats();
        assert_eq!(stats.open_connections, 3);
        assert_eq!(stats.identified_users, 1);
        assert_eq!(stats.anonymous_connections, 1);

        first.close(&hub);
        anon.close(&hub);
        assert_eq!(hub.stats().anonymous_connections, 0);
    }

    #[test]
    fn test_last_registration_wins_for_same_identity() {
        let hub = hub();

        let mut first = TestConnection::open(&hub, Some("u1"));
        let mut second = TestConnection::open(&hub, Some("u1"));
        first.drain();
        second.drain();

        hub.router().deliver("u1", "newMessage", json!({"m": 1}));
        assert!(first.drain().is_empty());
        assert_eq!(second.drain().len(), 1);

        // Closing the older tab removes the identity entirely
        first.close(&hub);
        assert!(hub.registry().lookup("u1").is_none());
        assert_eq!(presence_payloads(&second.drain()), vec![json!([])]);
    }
}

mod delivery {
    use super::*;
    use social_realtime::events::{
        notify_new_message, notify_post_author, LikeKind, LikeNotification,
    };

    #[test]
    fn test_like_then_dislike_reaches_author() {
        let hub = hub();
        let mut author = TestConnection::open(&hub, Some("bob"));
        author.drain();

        for kind in [LikeKind::Like, LikeKind::Dislike] {
            let n = LikeNotification::new(kind, "alice", json!({"username": "alice"}), "p1");
            assert!(notify_post_author(hub.router(), "bob", &n));
        }

        let frames = author.drain();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "getNotification");
        assert_eq!(frames[0].data["type"], "like");
        assert_eq!(frames[1].data["type"], "dislike");
        assert_eq!(frames[1].data["userId"], "alice");
    }

    #[test]
    fn test_message_to_offline_receiver_is_counted_not_sent() {
        let hub = hub();
        let mut other = TestConnection::open(&hub, Some("carol"));
        other.drain();

        notify_new_message(hub.router(), "dave", json!({"_id": "m1"}));

        assert!(other.drain().is_empty());
        let stats = hub.stats().events;
        assert_eq!(stats.offline, 1);
        assert_eq!(stats.delivered, 0);
    }

    #[test]
    fn test_delivery_to_closed_handle_before_unregister_is_silent() {
        let hub = hub();
        let conn = TestConnection::open(&hub, Some("erin"));

        // Transport gone, close transition not yet run
        drop(conn.rx);
        hub.router().deliver("erin", "newMessage", json!({}));

        assert_eq!(hub.stats().events.dropped, 1);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_open_close_leaves_consistent_registry() {
        let hub = Arc::new(hub());
        let mut tasks = Vec::new();

        for i in 0..32 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                let user = format!("user-{}", i);
                let mut conn = TestConnection::open(&hub, Some(user.as_str()));
                tokio::task::yield_now().await;
                if i % 2 == 0 {
                    conn.close(&hub);
                }
                conn
            }));
        }

        let mut still_open = Vec::new();
        for task in tasks {
            still_open.push(task.await.unwrap());
        }

        let online = hub.online_users();
        assert_eq!(online.len(), 16);
        for identity in &online {
            let n: usize = identity.as_str().trim_start_matches("user-").parse().unwrap();
            assert_eq!(n % 2, 1);
        }
        assert_eq!(hub.stats().open_connections, 16);

        // The final broadcast every open connection saw matches the final set
        let expected: Vec<String> = online.iter().map(|i| i.to_string()).collect();
        for conn in still_open.iter_mut().filter(|c| c.state.is_some()) {
            let last = presence_payloads(&conn.drain()).pop().unwrap();
            assert_eq!(last, json!(expected));
        }
    }
}
