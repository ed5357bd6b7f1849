//! Entry points for upstream services asking for an event to be pushed.

mod backoff;
mod http;
mod redis;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use self::http::{
    deliver_event, like_notification, message_notification, AcceptedResponse,
    DeliverEventRequest, LikeNotificationRequest, MessageNotificationRequest,
};
pub use self::redis::{RedisDeliveryMessage, RedisSubscriber, DEFAULT_DELIVERY_CHANNEL};
