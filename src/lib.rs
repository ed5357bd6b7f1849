// Shared components
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Real-time core
pub mod connection;
pub mod events;
pub mod hub;
pub mod presence;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;
pub mod websocket;

// Supporting modules
pub mod tasks;
