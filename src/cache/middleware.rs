//! Response caching for read-only API routes.
//!
//! The key is the request path plus its raw query string, so two requests
//! that differ only in parameter order are cached separately.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use super::{
    response::{CachedResponse, buffer_response, should_store_response},
    store::QueryCache,
};

/// Cache handle and freshness window for one group of routes.
#[derive(Clone)]
pub struct CachePolicy {
    pub cache: Arc<QueryCache<CachedResponse>>,
    pub ttl: Duration,
    pub enabled: bool,
}

impl CachePolicy {
    pub fn new(cache: Arc<QueryCache<CachedResponse>>, ttl: Duration, enabled: bool) -> Self {
        Self {
            cache,
            ttl,
            enabled,
        }
    }
}

/// Cache key for a request: path followed by `?query` when one was sent.
pub fn cache_key(uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}?{query}", uri.path()),
        None => uri.path().to_string(),
    }
}

/// Serve GET requests from the cache, storing fresh `200 OK` responses.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn query_cache_layer(
    State(policy): State<CachePolicy>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !policy.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = cache_key(request.uri());

    if let Some(cached) = policy.cache.get(&key) {
        debug!(cache = "query", outcome = "hit", key = %key, "serving cached response");
        return cached.into_response();
    }

    debug!(cache = "query", outcome = "miss", key = %key, "executing handler");
    // Taken before the handler reads, so a write that lands meanwhile wins.
    let generation = policy.cache.generation();
    let response = next.run(request).await;

    if !should_store_response(&response) {
        return response;
    }

    match buffer_response(response).await {
        Ok((rebuilt, cached)) => {
            policy
                .cache
                .put_if_unchanged(key, cached, policy.ttl, generation);
            rebuilt
        }
        Err((rebuilt, error)) => {
            warn!(key = %key, error = %error, "response not cached");
            rebuilt
        }
    }
}
