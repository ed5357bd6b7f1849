//! Online presence: who is connected, and telling everyone about it.
//!
//! This module provides:
//! - `ConnectionRegistry`: identity → live connection, last registration wins
//! - `PresenceBroadcaster`: pushes the online set to every open connection
//! - `ConnectionLifecycleHandler`: drives both from transport open/close

mod broadcaster;
mod identity;
mod lifecycle;
mod registry;

pub use broadcaster::{PresenceBroadcaster, DEFAULT_PRESENCE_EVENT};
pub use identity::{Identity, PresenceSet};
pub use lifecycle::{ConnectionLifecycleHandler, SessionState};
pub use registry::ConnectionRegistry;
