use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::presence::PresenceSet;

/// Event name for keep-alive frames sent by the heartbeat task
pub const HEARTBEAT_EVENT: &str = "heartbeat";
/// Event name answering a client ping
pub const PONG_EVENT: &str = "pong";
/// Event name for protocol errors
pub const ERROR_EVENT: &str = "error";

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientMessage {
    Ping,
}

/// Frame sent from server to client: an event name and its opaque payload.
///
/// Serialized as `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ServerMessage {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn presence(event: &str, online: &PresenceSet) -> Self {
        let data = online
            .iter()
            .map(|identity| serde_json::Value::String(identity.to_string()))
            .collect();
        Self::new(event, serde_json::Value::Array(data))
    }

    pub fn heartbeat() -> Self {
        Self::new(HEARTBEAT_EVENT, serde_json::Value::Null)
    }

    pub fn pong() -> Self {
        Self::new(PONG_EVENT, serde_json::Value::Null)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ERROR_EVENT,
            serde_json::json!({ "code": code.into(), "message": message.into() }),
        )
    }
}

/// Message queued on a connection's outbound channel.
///
/// Fan-out paths serialize once and share the text across connections.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Raw(ServerMessage),
    Preserialized(Arc<str>),
}

impl OutboundMessage {
    pub fn preserialized(message: &ServerMessage) -> Result<Self, serde_json::Error> {
        let text = serde_json::to_string(message)?;
        Ok(Self::Preserialized(Arc::from(text)))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Raw(message) => serde_json::to_string(message),
            Self::Preserialized(text) => Ok(text.to_string()),
        }
    }
}
