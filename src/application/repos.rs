//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use perpus_api_types::BookStatus;
use thiserror::Error;
use time::Date;
use uuid::Uuid;

use crate::domain::books::{BookChanges, BookListQuery, NewBook};
use crate::domain::entities::{BookRecord, DailyVisitorRecord, LogRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait BooksRepo: Send + Sync {
    async fn list_books(&self, query: &BookListQuery) -> Result<Vec<BookRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError>;

    /// Distinct non-null genres in ascending order.
    async fn distinct_genres(&self) -> Result<Vec<String>, RepoError>;

    /// Distinct non-null languages in ascending order.
    async fn distinct_languages(&self) -> Result<Vec<String>, RepoError>;

    /// Count books, optionally restricted to one status.
    async fn count_books(&self, status: Option<BookStatus>) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait BooksWriteRepo: Send + Sync {
    async fn create_book(&self, book: &NewBook) -> Result<BookRecord, RepoError>;

    /// Apply `changes`, returning `None` when no book has this id.
    async fn update_book(
        &self,
        id: Uuid,
        changes: &BookChanges,
    ) -> Result<Option<BookRecord>, RepoError>;

    /// Remove a book, returning the deleted row when it existed.
    async fn delete_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError>;
}

#[async_trait]
pub trait LogsRepo: Send + Sync {
    /// All entries, newest first.
    async fn list_logs(&self) -> Result<Vec<LogRecord>, RepoError>;

    async fn append_log(&self, action: &str, details: Option<&str>)
    -> Result<LogRecord, RepoError>;

    /// Delete every entry and report how many were removed.
    async fn clear_logs(&self) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait VisitorsRepo: Send + Sync {
    /// Increment the counter for `date`, creating the row on first visit.
    async fn record_visit(&self, date: Date) -> Result<(), RepoError>;

    /// The most recent `limit` days, newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<DailyVisitorRecord>, RepoError>;

    async fn total_visits(&self) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
