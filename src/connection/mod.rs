//! Transport sessions: per-connection handles and the table of open connections.

mod handle;
mod table;

pub use handle::{ConnectionHandle, ConnectionId, SendFailure};
pub use table::ConnectionTable;
