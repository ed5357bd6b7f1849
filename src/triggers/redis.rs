use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::config::RedisConfig;
use crate::error::{AppError, Result};
use crate::events::EventRouter;

use super::backoff::ExponentialBackoff;

/// Channel subscribed to when none are configured
pub const DEFAULT_DELIVERY_CHANNEL: &str = "realtime:deliver";

/// Delivery request published by upstream request handlers
#[derive(Debug, Deserialize)]
pub struct RedisDeliveryMessage {
    /// Target user identity
    pub target: String,
    /// Event name pushed to the client
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Why a subscription loop ended without error
#[derive(Debug, PartialEq, Eq)]
enum LoopExit {
    Shutdown,
    StreamEnded,
}

/// Redis Pub/Sub subscriber feeding the event router
pub struct RedisSubscriber {
    config: RedisConfig,
    router: Arc<EventRouter>,
    shutdown: broadcast::Sender<()>,
}

impl RedisSubscriber {
    pub fn new(
        config: RedisConfig,
        router: Arc<EventRouter>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            config,
            router,
            shutdown,
        }
    }

    /// Run until shutdown, resubscribing with backoff after failures
    pub async fn start(&self) {
        if !self.config.enabled {
            tracing::info!("Redis trigger disabled, skipping Redis subscriber");
            return;
        }

        let channels = self.channels();
        tracing::info!(channels = ?channels, "Starting Redis subscriber");

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut backoff = ExponentialBackoff::default();

        loop {
            let error = match self
                .run_subscription_loop(&channels, &mut backoff, &mut shutdown_rx)
                .await
            {
                Ok(LoopExit::Shutdown) => {
                    tracing::info!("Redis subscriber stopped gracefully");
                    return;
                }
                Ok(LoopExit::StreamEnded) => None,
                Err(e) => Some(e),
            };

            let delay = backoff.next_delay();
            match error {
                Some(e) => tracing::error!(
                    error = %e,
                    attempt = backoff.attempt(),
                    retry_in_ms = delay.as_millis() as u64,
                    "Redis subscription error, reconnecting"
                ),
                None => tracing::warn!(
                    retry_in_ms = delay.as_millis() as u64,
                    "Redis message stream ended, reconnecting"
                ),
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("Redis subscriber stopped during reconnect wait");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn channels(&self) -> Vec<String> {
        if self.config.channels.is_empty() {
            vec![DEFAULT_DELIVERY_CHANNEL.to_string()]
        } else {
            self.config.channels.clone()
        }
    }

    /// Connect, subscribe and route messages until shutdown or failure.
    ///
    /// The same shutdown receiver is watched while connecting, so a signal
    /// sent during setup is never missed.
    async fn run_subscription_loop(
        &self,
        channels: &[String],
        backoff: &mut ExponentialBackoff,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<LoopExit> {
        let setup = async {
            let client = redis::Client::open(self.config.url.as_str())?;
            let mut pubsub = client.get_async_pubsub().await?;

            for channel in channels {
                if is_pattern(channel) {
                    pubsub.psubscribe(channel).await?;
                    tracing::debug!(pattern = %channel, "Subscribed to pattern");
                } else {
                    pubsub.subscribe(channel).await?;
                    tracing::debug!(channel = %channel, "Subscribed to channel");
                }
            }
            Ok::<_, AppError>(pubsub)
        };

        let mut pubsub = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => return Ok(LoopExit::Shutdown),
            result = setup => result?,
        };

        tracing::info!("Redis subscription established");
        backoff.reset();

        let mut message_stream = pubsub.on_message();

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    return Ok(LoopExit::Shutdown);
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        return Ok(LoopExit::StreamEnded);
                    };
                    let channel = msg.get_channel_name().to_string();
                    match msg.get_payload::<String>() {
                        Ok(payload) => self.handle_message(&channel, &payload),
                        Err(e) => {
                            tracing::warn!(error = %e, channel = %channel, "Failed to get message payload");
                        }
                    }
                }
            }
        }
    }

    /// Route one published message; malformed input is logged and skipped
    fn handle_message(&self, channel: &str, payload: &str) {
        let Some(message) = parse_delivery(payload) else {
            tracing::warn!(channel = %channel, payload = %payload, "Invalid Redis delivery message");
            return;
        };

        tracing::debug!(
            channel = %channel,
            user_id = %message.target,
            event = %message.event,
            "Delivery request from Redis"
        );
        self.router
            .deliver(&message.target, &message.event, message.payload);
    }
}

fn is_pattern(channel: &str) -> bool {
    channel.contains('*') || channel.contains('?') || channel.contains('[')
}

/// Parse a delivery message, rejecting an empty target or a blank event name
fn parse_delivery(payload: &str) -> Option<RedisDeliveryMessage> {
    let message: RedisDeliveryMessage = serde_json::from_str(payload).ok()?;
    if message.target.is_empty() || message.event.trim().is_empty() {
        return None;
    }
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delivery_message() {
        let json = r#"{
            "target": "user-123",
            "event": "newMessage",
            "payload": {"_id": "m1", "message": "hello"}
        }"#;

        let message = parse_delivery(json).unwrap();
        assert_eq!(message.target, "user-123");
        assert_eq!(message.event, "newMessage");
        assert_eq!(message.payload["message"], "hello");
    }

    #[test]
    fn test_parse_rejects_invalid_messages() {
        assert!(parse_delivery("not json").is_none());
        assert!(parse_delivery(r#"{"target": "", "event": "newMessage"}"#).is_none());
        assert!(parse_delivery(r#"{"target": "u1"}"#).is_none());
        assert!(parse_delivery(r#"{"target": "u1", "event": " "}"#).is_none());
        // Targets are opaque and kept as sent
        let padded = parse_delivery(r#"{"target": " u1", "event": "newMessage"}"#).unwrap();
        assert_eq!(padded.target, " u1");
    }

    #[test]
    fn test_pattern_detection() {
        assert!(is_pattern("realtime:*"));
        assert!(is_pattern("realtime:user:?"));
        assert!(!is_pattern(DEFAULT_DELIVERY_CHANNEL));
    }

    #[tokio::test]
    async fn test_shutdown_before_setup_stops_loop() {
        let registry = Arc::new(crate::presence::ConnectionRegistry::new());
        let router = Arc::new(EventRouter::new(registry));
        let (shutdown, _) = broadcast::channel(1);
        let config = RedisConfig {
            enabled: true,
            ..Default::default()
        };
        let subscriber = RedisSubscriber::new(config, router, shutdown.clone());

        let mut shutdown_rx = shutdown.subscribe();
        shutdown.send(()).unwrap();

        let mut backoff = ExponentialBackoff::default();
        let exit = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            subscriber.run_subscription_loop(&subscriber.channels(), &mut backoff, &mut shutdown_rx),
        )
        .await
        .expect("loop should observe the pending shutdown")
        .unwrap();

        assert_eq!(exit, LoopExit::Shutdown);
    }

    #[tokio::test]
    async fn test_disabled_subscriber_returns_immediately() {
        let registry = Arc::new(crate::presence::ConnectionRegistry::new());
        let router = Arc::new(EventRouter::new(registry));
        let (shutdown, _) = broadcast::channel(1);

        let subscriber = RedisSubscriber::new(RedisConfig::default(), router, shutdown);
        tokio::time::timeout(std::time::Duration::from_secs(1), subscriber.start())
            .await
            .expect("disabled subscriber should not block");
    }
}
