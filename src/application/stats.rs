use std::sync::Arc;

use perpus_api_types::{BookStatus, StatsResponse};

use crate::application::repos::{BooksRepo, RepoError, VisitorsRepo};

/// Dashboard counters across books and visitors.
#[derive(Clone)]
pub struct StatsService {
    books: Arc<dyn BooksRepo>,
    visitors: Arc<dyn VisitorsRepo>,
}

impl StatsService {
    pub fn new(books: Arc<dyn BooksRepo>, visitors: Arc<dyn VisitorsRepo>) -> Self {
        Self { books, visitors }
    }

    pub async fn summary(&self) -> Result<StatsResponse, RepoError> {
        let (total_books, available_books, total_visitors) = tokio::try_join!(
            self.books.count_books(None),
            self.books.count_books(Some(BookStatus::Available)),
            self.visitors.total_visits(),
        )?;

        Ok(StatsResponse {
            total_books,
            available_books,
            borrowed_books: total_books.saturating_sub(available_books),
            total_visitors,
        })
    }
}
