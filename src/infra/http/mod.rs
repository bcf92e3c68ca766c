pub mod api;
mod middleware;
mod public;

pub use api::rate_limit::ApiRateLimiter;
pub use api::{ApiState, build_api_router};
pub use middleware::RequestContext;
pub use public::build_upload_router;

use axum::{
    Router,
    http::Uri,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
};
use tower_http::cors::CorsLayer;

use api::error::ApiError;
use api::middleware::{api_rate_limit, track_visitors};
use middleware::{log_responses, security_headers, set_request_context};

/// Full application router.
///
/// Request order, outermost first: request context, response logging,
/// security headers, CORS, rate limiting, visitor tracking, routes.
pub fn build_router(state: ApiState) -> Router {
    let mut router = build_api_router(state.clone())
        .merge(build_upload_router(state.upload_storage.clone()))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), track_visitors))
        .layer(from_fn_with_state(state, api_rate_limit))
        .layer(CorsLayer::permissive());

    for layer in security_headers() {
        router = router.layer(layer);
    }

    router
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    ApiError::new(
        axum::http::StatusCode::NOT_FOUND,
        "Not found",
        Some(format!("no route for {}", uri.path())),
    )
}
