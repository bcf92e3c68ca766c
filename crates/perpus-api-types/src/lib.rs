//! Request, response, and live event types shared by the perpus server and its clients.
//!
//! Field names follow the camelCase convention the browsing UI consumes.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

/// Acknowledgment text sent as the first frame of every live stream.
pub const CONNECTED_MESSAGE: &str = "Connected to SSE";

/// Circulation status of a catalogued book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "book_status"))]
pub enum BookStatus {
    #[default]
    #[serde(rename = "TERSEDIA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "TERSEDIA"))]
    Available,
    #[serde(rename = "DIPINJAM")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "DIPINJAM"))]
    Borrowed,
}

impl BookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookStatus::Available => "TERSEDIA",
            BookStatus::Borrowed => "DIPINJAM",
        }
    }

    /// Parse the wire spelling; anything else is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TERSEDIA" => Some(BookStatus::Available),
            "DIPINJAM" => Some(BookStatus::Borrowed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    pub genre: Option<String>,
    pub status: BookStatus,
    pub language: Option<String>,
    /// Absolute link to the stored PDF.
    pub pdf_path: Option<String>,
    /// Absolute link to the stored cover image.
    pub cover_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedBook {
    pub id: Uuid,
}

/// Envelope pushed to every connected live-stream client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LiveEvent {
    #[serde(rename = "connection")]
    Connection { message: String },
    #[serde(rename = "BOOK_ADDED")]
    BookAdded { payload: BookResponse },
    #[serde(rename = "BOOK_UPDATED")]
    BookUpdated { payload: BookResponse },
    #[serde(rename = "BOOK_DELETED")]
    BookDeleted { payload: DeletedBook },
}

impl LiveEvent {
    pub fn connected() -> Self {
        LiveEvent::Connection {
            message: CONNECTED_MESSAGE.to_string(),
        }
    }

    /// Wire tag of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            LiveEvent::Connection { .. } => "connection",
            LiveEvent::BookAdded { .. } => "BOOK_ADDED",
            LiveEvent::BookUpdated { .. } => "BOOK_UPDATED",
            LiveEvent::BookDeleted { .. } => "BOOK_DELETED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResponse {
    pub id: Uuid,
    pub action: String,
    pub details: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateLogRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_books: u64,
    pub available_books: u64,
    pub borrowed_books: u64,
    pub total_visitors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyVisitorResponse {
    pub id: Uuid,
    #[serde(with = "calendar_date")]
    pub date: Date,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfoResponse {
    pub server_ips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
