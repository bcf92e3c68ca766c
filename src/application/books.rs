//! Book catalog reads and writes.
//!
//! Every successful mutation runs in the same order: persist, drop cached
//! responses that depend on the book table, then publish a live event.

use std::{path::Path, sync::Arc};

use perpus_api_types::{BookResponse, DeletedBook, LiveEvent};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{BooksRepo, BooksWriteRepo, RepoError};
use crate::cache::{BOOK_DEPENDENT_PREFIXES, CachedResponse, QueryCache};
use crate::domain::books::{BookChanges, BookListQuery, NewBook};
use crate::domain::entities::BookRecord;
use crate::domain::error::DomainError;
use crate::live::EventBroadcaster;

#[derive(Debug, Error)]
pub enum BookServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("Book not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result of an update: the new state plus attachments it no longer references.
#[derive(Debug, Clone)]
pub struct UpdatedBook {
    pub book: BookResponse,
    pub replaced_paths: Vec<String>,
}

#[derive(Clone)]
pub struct BookService {
    reader: Arc<dyn BooksRepo>,
    writer: Arc<dyn BooksWriteRepo>,
    cache: Arc<QueryCache<CachedResponse>>,
    broadcaster: EventBroadcaster,
    base_url: Arc<str>,
}

impl BookService {
    pub fn new(
        reader: Arc<dyn BooksRepo>,
        writer: Arc<dyn BooksWriteRepo>,
        cache: Arc<QueryCache<CachedResponse>>,
        broadcaster: EventBroadcaster,
        base_url: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            broadcaster,
            base_url: base_url.into(),
        }
    }

    pub async fn list(&self, query: &BookListQuery) -> Result<Vec<BookResponse>, BookServiceError> {
        let records = self.reader.list_books(query).await?;
        Ok(records
            .iter()
            .map(|record| book_response(record, &self.base_url))
            .collect())
    }

    pub async fn create(&self, book: NewBook) -> Result<BookResponse, BookServiceError> {
        let record = self.writer.create_book(&book).await?;
        info!(book_id = %record.id, title = %record.title, "book created");

        let response = book_response(&record, &self.base_url);
        self.invalidate();
        self.broadcaster.publish(&LiveEvent::BookAdded {
            payload: response.clone(),
        });
        Ok(response)
    }

    pub async fn update(
        &self,
        id: Uuid,
        changes: BookChanges,
    ) -> Result<UpdatedBook, BookServiceError> {
        let existing = self
            .reader
            .find_by_id(id)
            .await?
            .ok_or(BookServiceError::NotFound)?;

        let record = self
            .writer
            .update_book(id, &changes)
            .await?
            .ok_or(BookServiceError::NotFound)?;
        info!(book_id = %id, "book updated");

        let mut replaced_paths = Vec::new();
        if changes.pdf_path.is_some()
            && let Some(old) = existing.pdf_path
            && Some(&old) != record.pdf_path.as_ref()
        {
            replaced_paths.push(old);
        }
        if changes.cover_path.is_some()
            && let Some(old) = existing.cover_path
            && Some(&old) != record.cover_path.as_ref()
        {
            replaced_paths.push(old);
        }

        let response = book_response(&record, &self.base_url);
        self.invalidate();
        self.broadcaster.publish(&LiveEvent::BookUpdated {
            payload: response.clone(),
        });
        Ok(UpdatedBook {
            book: response,
            replaced_paths,
        })
    }

    /// Delete a book and return its final state so attachments can be removed.
    pub async fn delete(&self, id: Uuid) -> Result<BookRecord, BookServiceError> {
        let record = self
            .writer
            .delete_book(id)
            .await?
            .ok_or(BookServiceError::NotFound)?;
        info!(book_id = %id, "book deleted");

        self.invalidate();
        self.broadcaster.publish(&LiveEvent::BookDeleted {
            payload: DeletedBook { id },
        });
        Ok(record)
    }

    fn invalidate(&self) {
        for prefix in BOOK_DEPENDENT_PREFIXES {
            self.cache.invalidate_prefix(prefix);
        }
    }
}

/// Wire form of a book, with attachment names expanded to absolute links.
pub fn book_response(record: &BookRecord, base_url: &str) -> BookResponse {
    BookResponse {
        id: record.id,
        title: record.title.clone(),
        author: record.author.clone(),
        description: record.description.clone(),
        genre: record.genre.clone(),
        status: record.status,
        language: record.language.clone(),
        pdf_path: record
            .pdf_path
            .as_deref()
            .and_then(|path| attachment_url(base_url, path)),
        cover_path: record
            .cover_path
            .as_deref()
            .and_then(|path| attachment_url(base_url, path)),
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn attachment_url(base_url: &str, stored_path: &str) -> Option<String> {
    let name = Path::new(stored_path).file_name()?.to_str()?;
    Some(format!("{base_url}/uploads/{name}"))
}
