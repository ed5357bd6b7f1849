//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod presence;
mod routes;

pub use health::{health, stats, HealthResponse};
pub use metrics::prometheus_metrics;
pub use presence::{online_users, OnlineUsersResponse};
pub use routes::api_routes;
