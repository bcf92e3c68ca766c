//! In-memory repositories and router wiring shared by the HTTP tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, header};
use http_body_util::BodyExt;
use perpus::application::books::BookService;
use perpus::application::catalog::CatalogService;
use perpus::application::logs::LogService;
use perpus::application::repos::{
    BooksRepo, BooksWriteRepo, HealthRepo, LogsRepo, RepoError, VisitorsRepo,
};
use perpus::application::stats::StatsService;
use perpus::application::visitors::VisitorService;
use perpus::cache::{CachePolicy, QueryCache};
use perpus::domain::books::{BookChanges, BookListQuery, NewBook};
use perpus::domain::entities::{BookRecord, DailyVisitorRecord, LogRecord};
use perpus::infra::http::{self, ApiRateLimiter, ApiState};
use perpus::infra::uploads::UploadStorage;
use perpus::live::EventBroadcaster;
use perpus_api_types::BookStatus;
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

pub const BASE_URL: &str = "http://catalog.test";
pub const BOUNDARY: &str = "perpus-test-boundary";

#[derive(Default)]
pub struct MemoryCatalog {
    pub books: Mutex<Vec<BookRecord>>,
    pub logs: Mutex<Vec<LogRecord>>,
    pub visitors: Mutex<BTreeMap<Date, DailyVisitorRecord>>,
    pub list_calls: AtomicUsize,
    pub database_down: AtomicBool,
}

impl MemoryCatalog {
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub async fn seed_book(&self, title: &str, genre: &str, status: BookStatus) -> BookRecord {
        let now = OffsetDateTime::now_utc();
        let record = BookRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: "Seed Author".to_string(),
            description: format!("{title} description"),
            genre: Some(genre.to_string()),
            status,
            language: Some("Indonesia".to_string()),
            pdf_path: None,
            cover_path: None,
            created_at: now,
            updated_at: now,
        };
        self.books.lock().await.push(record.clone());
        record
    }

    pub async fn seed_visits(&self, date: Date, count: i64) {
        self.visitors.lock().await.insert(
            date,
            DailyVisitorRecord {
                id: Uuid::new_v4(),
                date,
                count,
            },
        );
    }
}

fn matches_search(book: &BookRecord, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    [
        Some(book.title.as_str()),
        Some(book.author.as_str()),
        Some(book.description.as_str()),
        book.genre.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|value| value.to_lowercase().contains(&needle))
}

#[async_trait]
impl BooksRepo for MemoryCatalog {
    async fn list_books(&self, query: &BookListQuery) -> Result<Vec<BookRecord>, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let books = self.books.lock().await;
        let mut items: Vec<BookRecord> = books
            .iter()
            .rev()
            .filter(|book| match &query.genre {
                Some(genre) => book.genre.as_deref() == Some(genre.as_str()),
                None => true,
            })
            .filter(|book| query.status.is_none_or(|status| book.status == status))
            .filter(|book| match &query.search {
                Some(needle) => matches_search(book, needle),
                None => true,
            })
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            items.truncate(limit as usize);
        }
        Ok(items)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        let books = self.books.lock().await;
        Ok(books.iter().find(|book| book.id == id).cloned())
    }

    async fn distinct_genres(&self) -> Result<Vec<String>, RepoError> {
        let books = self.books.lock().await;
        let mut genres: Vec<String> = books.iter().filter_map(|b| b.genre.clone()).collect();
        genres.sort();
        genres.dedup();
        Ok(genres)
    }

    async fn distinct_languages(&self) -> Result<Vec<String>, RepoError> {
        let books = self.books.lock().await;
        let mut languages: Vec<String> =
            books.iter().filter_map(|b| b.language.clone()).collect();
        languages.sort();
        languages.dedup();
        Ok(languages)
    }

    async fn count_books(&self, status: Option<BookStatus>) -> Result<u64, RepoError> {
        let books = self.books.lock().await;
        Ok(books
            .iter()
            .filter(|book| status.is_none_or(|status| book.status == status))
            .count() as u64)
    }
}

#[async_trait]
impl BooksWriteRepo for MemoryCatalog {
    async fn create_book(&self, book: &NewBook) -> Result<BookRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = BookRecord {
            id: Uuid::new_v4(),
            title: book.title.clone(),
            author: book.author.clone(),
            description: book.description.clone(),
            genre: Some(book.genre.clone()),
            status: book.status,
            language: Some(book.language.clone()),
            pdf_path: Some(book.pdf_path.clone()),
            cover_path: book.cover_path.clone(),
            created_at: now,
            updated_at: now,
        };
        self.books.lock().await.push(record.clone());
        Ok(record)
    }

    async fn update_book(
        &self,
        id: Uuid,
        changes: &BookChanges,
    ) -> Result<Option<BookRecord>, RepoError> {
        let mut books = self.books.lock().await;
        let Some(book) = books.iter_mut().find(|book| book.id == id) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            book.title = title.clone();
        }
        if let Some(author) = &changes.author {
            book.author = author.clone();
        }
        if let Some(description) = &changes.description {
            book.description = description.clone();
        }
        if let Some(genre) = &changes.genre {
            book.genre = Some(genre.clone());
        }
        if let Some(status) = changes.status {
            book.status = status;
        }
        if let Some(language) = &changes.language {
            book.language = Some(language.clone());
        }
        if let Some(pdf) = &changes.pdf_path {
            book.pdf_path = Some(pdf.clone());
        }
        if let Some(cover) = &changes.cover_path {
            book.cover_path = Some(cover.clone());
        }
        book.updated_at = OffsetDateTime::now_utc();
        Ok(Some(book.clone()))
    }

    async fn delete_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        let mut books = self.books.lock().await;
        let position = books.iter().position(|book| book.id == id);
        Ok(position.map(|index| books.remove(index)))
    }
}

#[async_trait]
impl LogsRepo for MemoryCatalog {
    async fn list_logs(&self) -> Result<Vec<LogRecord>, RepoError> {
        let logs = self.logs.lock().await;
        Ok(logs.iter().rev().cloned().collect())
    }

    async fn append_log(
        &self,
        action: &str,
        details: Option<&str>,
    ) -> Result<LogRecord, RepoError> {
        let record = LogRecord {
            id: Uuid::new_v4(),
            action: action.to_string(),
            details: details.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        self.logs.lock().await.push(record.clone());
        Ok(record)
    }

    async fn clear_logs(&self) -> Result<u64, RepoError> {
        let mut logs = self.logs.lock().await;
        let removed = logs.len() as u64;
        logs.clear();
        Ok(removed)
    }
}

#[async_trait]
impl VisitorsRepo for MemoryCatalog {
    async fn record_visit(&self, date: Date) -> Result<(), RepoError> {
        let mut visitors = self.visitors.lock().await;
        visitors
            .entry(date)
            .or_insert_with(|| DailyVisitorRecord {
                id: Uuid::new_v4(),
                date,
                count: 0,
            })
            .count += 1;
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<DailyVisitorRecord>, RepoError> {
        let visitors = self.visitors.lock().await;
        Ok(visitors
            .values()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn total_visits(&self) -> Result<u64, RepoError> {
        let visitors = self.visitors.lock().await;
        Ok(visitors.values().map(|record| record.count as u64).sum())
    }
}

#[async_trait]
impl HealthRepo for MemoryCatalog {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.database_down.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection refused"));
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: ApiState,
    pub catalog: Arc<MemoryCatalog>,
    _uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rate_limit(1_000)
    }

    pub fn with_rate_limit(max_requests: u32) -> Self {
        let uploads = tempfile::tempdir().expect("temp upload dir");
        let catalog = Arc::new(MemoryCatalog::default());
        let cache = Arc::new(QueryCache::new());
        let broadcaster = EventBroadcaster::new(16);

        let books = Arc::new(BookService::new(
            catalog.clone(),
            catalog.clone(),
            cache.clone(),
            broadcaster.clone(),
            BASE_URL,
        ));

        let state = ApiState {
            books,
            catalog: Arc::new(CatalogService::new(catalog.clone())),
            logs: Arc::new(LogService::new(catalog.clone())),
            visitors: Arc::new(VisitorService::new(catalog.clone())),
            stats: Arc::new(StatsService::new(catalog.clone(), catalog.clone())),
            health: catalog.clone(),
            broadcaster,
            upload_storage: Arc::new(
                UploadStorage::new(uploads.path().to_path_buf()).expect("upload storage"),
            ),
            rate_limiter: Arc::new(ApiRateLimiter::new(
                Duration::from_secs(60),
                max_requests,
            )),
            books_cache: CachePolicy::new(cache.clone(), Duration::from_secs(600), true),
            facets_cache: CachePolicy::new(cache, Duration::from_secs(600), true),
            live_keep_alive: Duration::from_secs(15),
            max_request_bytes: 1024 * 1024,
        };

        Self {
            router: http::build_router(state.clone()),
            state,
            catalog,
            _uploads: uploads,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).expect("request"))
            .await
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        panic!(
            "invalid json ({err}): {}",
            String::from_utf8_lossy(&bytes)
        )
    })
}

/// One file part of a multipart form.
pub struct FilePart<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

pub fn multipart_request(
    method: Method,
    uri: &str,
    fields: &[(&str, &str)],
    files: &[FilePart<'_>],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.field, file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("multipart request")
}

pub const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

pub fn pdf_part(data: &[u8]) -> FilePart<'_> {
    FilePart {
        field: "pdf",
        file_name: "bumi manusia.pdf",
        content_type: "application/pdf",
        data,
    }
}

pub fn complete_book_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("title", "Bumi Manusia"),
        ("author", "Pramoedya Ananta Toer"),
        ("description", "Tetralogi Buru, buku pertama"),
        ("genre", "Fiksi"),
    ]
}
