use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::WebSocketConfig;
use crate::connection::ConnectionTable;
use crate::websocket::{OutboundMessage, ServerMessage};

/// Background task sending keep-alive frames to every open connection.
///
/// A write to a dead peer fails in the session's send task, which ends the
/// session and runs the normal close transition. No session is timed out here.
pub struct HeartbeatTask {
    config: WebSocketConfig,
    connections: Arc<ConnectionTable>,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatTask {
    pub fn new(
        config: WebSocketConfig,
        connections: Arc<ConnectionTable>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            connections,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.config.heartbeat_interval.max(1));
        let mut timer = tokio::time::interval(interval);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            heartbeat_interval_secs = self.config.heartbeat_interval,
            "Heartbeat task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Heartbeat task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.send_heartbeats();
                }
            }
        }

        tracing::info!("Heartbeat task stopped");
    }

    fn send_heartbeats(&self) {
        let connections = self.connections.all();
        if connections.is_empty() {
            return;
        }

        let outbound = match OutboundMessage::preserialized(&ServerMessage::heartbeat()) {
            Ok(msg) => msg,
            Err(_) => OutboundMessage::Raw(ServerMessage::heartbeat()),
        };

        let mut sent = 0usize;
        for handle in &connections {
            if handle.try_send_outbound(outbound.clone()).is_ok() {
                sent += 1;
            }
        }

        tracing::debug!(
            total = connections.len(),
            sent = sent,
            "Heartbeat round completed"
        );
    }
}
