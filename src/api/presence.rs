use axum::{extract::State, Json};
use serde::Serialize;

use crate::presence::PresenceSet;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct OnlineUsersResponse {
    pub online_users: PresenceSet,
}

/// GET /api/v1/presence - snapshot of identities currently online
pub async fn online_users(State(state): State<AppState>) -> Json<OnlineUsersResponse> {
    Json(OnlineUsersResponse {
        online_users: state.hub.online_users(),
    })
}
