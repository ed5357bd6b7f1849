use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};
use crate::triggers::{deliver_event, like_notification, message_notification};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::presence::online_users;

pub fn api_routes(state: AppState) -> Router<AppState> {
    let v1 = Router::new()
        .route("/presence", get(online_users))
        // Generic delivery
        .route("/events/deliver", post(deliver_event))
        // Typed application events
        .route("/notifications/message", post(message_notification))
        .route("/notifications/like", post(like_notification))
        .route_layer(middleware::from_fn_with_state(state, api_key_auth));

    Router::new()
        // Health, Stats & Metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        .nest("/api/v1", v1)
}
