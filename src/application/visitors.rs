//! Daily visitor counting and the analytics series built from it.

use std::sync::Arc;

use perpus_api_types::DailyVisitorResponse;
use time::{Date, OffsetDateTime};
use tracing::warn;

use crate::application::repos::{RepoError, VisitorsRepo};

/// Number of days returned by [`VisitorService::analytics`].
pub const ANALYTICS_DAYS: u32 = 30;

#[derive(Clone)]
pub struct VisitorService {
    repo: Arc<dyn VisitorsRepo>,
}

impl VisitorService {
    pub fn new(repo: Arc<dyn VisitorsRepo>) -> Self {
        Self { repo }
    }

    /// Count one visit against the current UTC day.
    ///
    /// Failures are logged and swallowed; a visit counter must never fail a request.
    pub async fn record_visit(&self) {
        self.record_visit_on(OffsetDateTime::now_utc().date()).await;
    }

    pub async fn record_visit_on(&self, date: Date) {
        if let Err(err) = self.repo.record_visit(date).await {
            warn!(%date, error = %err, "failed to record visitor");
        }
    }

    /// The latest [`ANALYTICS_DAYS`] days in chronological order.
    pub async fn analytics(&self) -> Result<Vec<DailyVisitorResponse>, RepoError> {
        let mut records = self.repo.list_recent(ANALYTICS_DAYS).await?;
        records.reverse();
        Ok(records
            .into_iter()
            .map(|record| DailyVisitorResponse {
                id: record.id,
                date: record.date,
                count: record.count,
            })
            .collect())
    }
}
