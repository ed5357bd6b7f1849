//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::hub::HubStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.hub.stats())
}
