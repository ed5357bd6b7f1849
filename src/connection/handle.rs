//! Connection handle and related types

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::websocket::{OutboundMessage, ServerMessage};

pub type ConnectionId = Uuid;

/// Handle for a single live transport session.
///
/// Cloned behind `Arc` into the connection table and, for identified
/// sessions, into the presence registry.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub sender: mpsc::Sender<OutboundMessage>,
    pub connected_at: DateTime<Utc>,
}

/// Why a frame did not reach the outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// Outbound queue is at capacity (slow consumer)
    Full,
    /// Session has already ended
    Closed,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            connected_at: Utc::now(),
        }
    }

    /// Queue a ServerMessage without waiting for capacity
    pub fn try_send(&self, message: ServerMessage) -> Result<(), SendFailure> {
        self.try_send_outbound(OutboundMessage::Raw(message))
    }

    /// Queue an outbound message (raw or pre-serialized) without waiting for capacity
    pub fn try_send_outbound(&self, message: OutboundMessage) -> Result<(), SendFailure> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => SendFailure::Full,
            TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
