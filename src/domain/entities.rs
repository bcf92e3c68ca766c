//! Domain entities mirrored from persistent storage.

use perpus_api_types::BookStatus;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    pub genre: Option<String>,
    pub status: BookStatus,
    pub language: Option<String>,
    /// Storage-relative name of the PDF attachment.
    pub pdf_path: Option<String>,
    /// Storage-relative name of the cover image.
    pub cover_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub id: Uuid,
    pub action: String,
    pub details: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyVisitorRecord {
    pub id: Uuid,
    pub date: Date,
    pub count: i64,
}
