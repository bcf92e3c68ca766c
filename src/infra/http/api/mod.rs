pub mod error;
pub mod handlers;
pub mod middleware;
mod multipart;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, put},
};

use crate::cache::query_cache_layer;

/// JSON API routes. Book listings and facets sit behind the query cache.
pub fn build_api_router(state: ApiState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_request_bytes);

    let book_reads = Router::new()
        .route(
            "/api/books",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.books_cache.clone(),
            query_cache_layer,
        ));

    let book_writes = Router::new().route(
        "/api/books/{id}",
        put(handlers::update_book).delete(handlers::delete_book),
    );

    let facets = Router::new()
        .route("/api/genres", get(handlers::list_genres))
        .route("/api/languages", get(handlers::list_languages))
        .route_layer(axum_middleware::from_fn_with_state(
            state.facets_cache.clone(),
            query_cache_layer,
        ));

    let uncached = Router::new()
        .route("/api/books/stream", get(handlers::book_stream))
        .route("/api/sse/stream", get(handlers::book_stream))
        .route(
            "/api/logs",
            get(handlers::list_logs)
                .post(handlers::create_log)
                .delete(handlers::clear_logs),
        )
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/analytics", get(handlers::get_analytics))
        .route("/api/serverinfo/ip", get(handlers::get_server_ips))
        .route("/api/health", get(handlers::health));

    book_reads
        .merge(book_writes)
        .layer(body_limit)
        .merge(facets)
        .merge(uncached)
        .with_state(state)
}
