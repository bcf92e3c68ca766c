//! Adapter from a live subscription to an axum SSE response.

use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use tokio::sync::mpsc;

use super::broadcaster::{Frame, SubscriberHandle};

/// Stream every frame as `data: <json>\n\n`, with keep-alive comments in between.
///
/// The handle travels with the stream, so the subscriber is removed as soon
/// as the client goes away and axum drops the body.
pub fn live_stream_response(
    handle: SubscriberHandle,
    mut receiver: mpsc::Receiver<Frame>,
    keep_alive: Duration,
) -> Response {
    let events = stream! {
        let _subscription = handle;
        while let Some(frame) = receiver.recv().await {
            yield Ok::<Event, Infallible>(Event::default().data(frame.as_ref()));
        }
    };

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(keep_alive))
        .into_response()
}
