//! Live catalog updates pushed to browsers over server-sent events.
//!
//! The [`EventBroadcaster`] is built once at startup and shared with the book
//! service (which publishes) and the stream handler (which subscribes).

mod broadcaster;
mod stream;

pub use broadcaster::{
    ConnectError, Delivery, EventBroadcaster, Frame, SubscriberHandle, SubscriberId,
    SubscriberState,
};
pub use stream::live_stream_response;

pub(crate) use broadcaster::{METRIC_LIVE_EVICTED, METRIC_LIVE_PUBLISHED, METRIC_LIVE_SUBSCRIBERS};
