//! Application event delivery to individual users.

mod notifications;
mod router;

pub use notifications::{
    notify_new_message, notify_post_author, LikeKind, LikeNotification, NEW_MESSAGE_EVENT,
    NOTIFICATION_EVENT,
};
pub use router::{EventRouter, RouterStats, RouterStatsSnapshot};
