use std::sync::Arc;
use std::time::Duration;

use crate::application::books::BookService;
use crate::application::catalog::CatalogService;
use crate::application::logs::LogService;
use crate::application::repos::HealthRepo;
use crate::application::stats::StatsService;
use crate::application::visitors::VisitorService;
use crate::cache::CachePolicy;
use crate::infra::uploads::UploadStorage;
use crate::live::EventBroadcaster;

use super::rate_limit::ApiRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub books: Arc<BookService>,
    pub catalog: Arc<CatalogService>,
    pub logs: Arc<LogService>,
    pub visitors: Arc<VisitorService>,
    pub stats: Arc<StatsService>,
    pub health: Arc<dyn HealthRepo>,
    pub broadcaster: EventBroadcaster,
    pub upload_storage: Arc<UploadStorage>,
    pub rate_limiter: Arc<ApiRateLimiter>,
    pub books_cache: CachePolicy,
    pub facets_cache: CachePolicy,
    pub live_keep_alive: Duration,
    pub max_request_bytes: usize,
}
