use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics::counter;
use tracing::debug;

use super::error::ApiError;
use super::state::ApiState;

pub(crate) const METRIC_RATE_LIMITED: &str = "perpus_http_rate_limited_total";

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Address used as the rate limiting key.
fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let decision = state.rate_limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        counter!(METRIC_RATE_LIMITED).increment(1);
        debug!(client = %key, "rate limit exceeded");
        ApiError::rate_limited(decision.reset_after)
    };

    let headers = response.headers_mut();
    for (name, value) in [
        (RATE_LIMIT_LIMIT, state.rate_limiter.limit().to_string()),
        (RATE_LIMIT_REMAINING, decision.remaining.to_string()),
        (RATE_LIMIT_RESET, decision.reset_after.to_string()),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }

    response
}

/// Count the request against today's visitor total before handling it.
pub async fn track_visitors(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    state.visitors.record_visit().await;
    next.run(request).await
}
