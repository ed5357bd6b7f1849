//! Typed payloads for the application events pushed to users.

use serde::{Deserialize, Serialize};

use super::EventRouter;

/// Event carrying a newly created direct message record
pub const NEW_MESSAGE_EVENT: &str = "newMessage";
/// Event carrying a like/dislike notification for a post author
pub const NOTIFICATION_EVENT: &str = "getNotification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeKind {
    Like,
    Dislike,
}

impl LikeKind {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Like => "Your post was liked",
            Self::Dislike => "Your post was disliked",
        }
    }
}

/// Notification sent to a post author when someone likes or unlikes the post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeNotification {
    #[serde(rename = "type")]
    pub kind: LikeKind,
    pub user_id: String,
    pub user_details: serde_json::Value,
    pub post_id: String,
    pub message: String,
}

impl LikeNotification {
    pub fn new(
        kind: LikeKind,
        actor_id: impl Into<String>,
        actor_details: serde_json::Value,
        post_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            user_id: actor_id.into(),
            user_details: actor_details,
            post_id: post_id.into(),
            message: kind.message().to_string(),
        }
    }
}

/// Push a freshly persisted message record to its receiver.
pub fn notify_new_message(router: &EventRouter, receiver_id: &str, message: serde_json::Value) {
    router.deliver(receiver_id, NEW_MESSAGE_EVENT, message);
}

/// Push a like notification to the post author.
///
/// Returns `false` without sending when the actor is the author.
pub fn notify_post_author(
    router: &EventRouter,
    post_author_id: &str,
    notification: &LikeNotification,
) -> bool {
    if notification.user_id == post_author_id {
        tracing::debug!(user_id = %post_author_id, post_id = %notification.post_id, "Self-like, no notification");
        return false;
    }

    match serde_json::to_value(notification) {
        Ok(payload) => {
            router.deliver(post_author_id, NOTIFICATION_EVENT, payload);
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize like notification");
            false
        }
    }
}
