//! WebSocket transport: upgrade handler, session loop, and wire frames.

mod handler;
mod message;

pub use handler::{ws_handler, WsQuery};
pub use message::{
    ClientMessage, OutboundMessage, ServerMessage, ERROR_EVENT, HEARTBEAT_EVENT, PONG_EVENT,
};
