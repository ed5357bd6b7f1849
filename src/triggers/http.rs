use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::events::{notify_new_message, notify_post_author, LikeKind, LikeNotification};
use crate::server::AppState;

/// Request to deliver an arbitrary event to one user
#[derive(Debug, Deserialize)]
pub struct DeliverEventRequest {
    /// Target user identity
    pub target_user_id: String,
    /// Event name pushed to the client (e.g., "newMessage")
    pub event: String,
    /// Event payload, passed through untouched
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Request to push a freshly persisted direct message to its receiver
#[derive(Debug, Deserialize)]
pub struct MessageNotificationRequest {
    pub receiver_id: String,
    /// The created message record
    pub message: serde_json::Value,
}

/// Request to notify a post author of a like or unlike
#[derive(Debug, Deserialize)]
pub struct LikeNotificationRequest {
    pub actor_id: String,
    /// Public profile of the actor (username, profilePicture, ...)
    #[serde(default)]
    pub actor_details: serde_json::Value,
    pub post_id: String,
    pub post_author_id: String,
    pub kind: LikeKind,
}

/// Response for accepted trigger requests.
///
/// Delivery is fire-and-forget, so this never reports whether the
/// recipient was online.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub success: bool,
    pub accepted_at: DateTime<Utc>,
}

impl AcceptedResponse {
    fn now() -> (StatusCode, Json<Self>) {
        (
            StatusCode::ACCEPTED,
            Json(Self {
                success: true,
                accepted_at: Utc::now(),
            }),
        )
    }
}

/// Event names must contain something other than whitespace
fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Identities are opaque: only the empty string is rejected
fn require_identity(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// POST /api/v1/events/deliver
pub async fn deliver_event(
    State(state): State<AppState>,
    Json(request): Json<DeliverEventRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    require_identity("target_user_id", &request.target_user_id)?;
    require("event", &request.event)?;

    state
        .hub
        .router()
        .deliver(&request.target_user_id, &request.event, request.payload);

    Ok(AcceptedResponse::now())
}

/// POST /api/v1/notifications/message
pub async fn message_notification(
    State(state): State<AppState>,
    Json(request): Json<MessageNotificationRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    require_identity("receiver_id", &request.receiver_id)?;

    notify_new_message(state.hub.router(), &request.receiver_id, request.message);

    Ok(AcceptedResponse::now())
}

/// POST /api/v1/notifications/like
pub async fn like_notification(
    State(state): State<AppState>,
    Json(request): Json<LikeNotificationRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    require_identity("actor_id", &request.actor_id)?;
    require("post_id", &request.post_id)?;
    require_identity("post_author_id", &request.post_author_id)?;

    let notification = LikeNotification::new(
        request.kind,
        request.actor_id,
        request.actor_details,
        request.post_id,
    );
    notify_post_author(state.hub.router(), &request.post_author_id, &notification);

    Ok(AcceptedResponse::now())
}
