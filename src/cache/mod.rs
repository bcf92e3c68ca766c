//! Query caching for read-heavy catalog routes.
//!
//! - [`QueryCache`]: string-keyed store with per-entry expiry and prefix invalidation
//! - [`query_cache_layer`]: axum middleware that replays buffered `200 OK` responses
//! - [`spawn_expiry_sweeper`]: background purge of entries nobody asks for again
//!
//! Book writes drop every key under the affected route prefixes, so readers
//! never see a listing older than the last successful mutation.

mod lock;
mod middleware;
mod response;
mod store;
mod sweeper;

pub use middleware::{CachePolicy, cache_key, query_cache_layer};
pub use response::{CacheStoreError, CachedResponse, buffer_response, should_store_response};
pub use store::QueryCache;
pub use sweeper::spawn_expiry_sweeper;

/// Key prefix shared by every cached book listing.
pub const BOOKS_PREFIX: &str = "/api/books";
/// Key prefix of the cached genre list.
pub const GENRES_PREFIX: &str = "/api/genres";
/// Key prefix of the cached language list.
pub const LANGUAGES_PREFIX: &str = "/api/languages";

/// Prefixes whose cached responses depend on the book table.
pub const BOOK_DEPENDENT_PREFIXES: [&str; 3] = [BOOKS_PREFIX, GENRES_PREFIX, LANGUAGES_PREFIX];

pub(crate) use store::{
    METRIC_CACHE_EXPIRED, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS,
};
