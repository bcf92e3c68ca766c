//! Book catalog handlers.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::books::BookListQuery;
use crate::infra::http::api::error::{ApiError, BOOK_NOT_FOUND};
use crate::infra::http::api::multipart::read_book_form;
use crate::infra::http::api::state::ApiState;
use crate::live::live_stream_response;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BookListParams {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub genre: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
}

/// A malformed id cannot name a stored book, so it reads as not found.
fn parse_book_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(BOOK_NOT_FOUND))
}

pub async fn list_books(
    State(state): State<ApiState>,
    Query(params): Query<BookListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = BookListQuery::parse(
        params.sort.as_deref(),
        params.order.as_deref(),
        params.genre.as_deref(),
        params.status.as_deref(),
        params.search.as_deref(),
        params.limit.as_deref(),
    )?;

    let books = state.books.list(&query).await?;
    Ok(Json(books))
}

pub async fn create_book(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_book_form(&mut multipart, &state.upload_storage).await?;
    let stored = form.stored_paths();

    let result = async {
        form.fields.check_create(form.pdf.is_some())?;
        let book = form.fields.into_new_book(form.pdf, form.cover)?;
        state.books.create(book).await.map_err(ApiError::from)
    }
    .await;

    match result {
        Ok(book) => Ok((StatusCode::CREATED, Json(book))),
        Err(err) => {
            state.upload_storage.delete_quietly(stored).await;
            Err(err)
        }
    }
}

pub async fn update_book(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_book_id(&id)?;
    let form = read_book_form(&mut multipart, &state.upload_storage).await?;
    let stored = form.stored_paths();

    let result = async {
        form.fields.check_update()?;
        let changes = form.fields.into_changes(form.pdf, form.cover)?;
        state.books.update(id, changes).await.map_err(ApiError::from)
    }
    .await;

    match result {
        Ok(updated) => {
            state
                .upload_storage
                .delete_quietly(&updated.replaced_paths)
                .await;
            Ok(Json(updated.book))
        }
        Err(err) => {
            state.upload_storage.delete_quietly(stored).await;
            Err(err)
        }
    }
}

pub async fn delete_book(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_book_id(&id)?;
    let deleted = state.books.delete(id).await?;

    let stored: Vec<&str> = deleted
        .pdf_path
        .iter()
        .chain(deleted.cover_path.iter())
        .map(String::as_str)
        .collect();
    state.upload_storage.delete_quietly(&stored).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Server-sent event stream of catalog changes.
pub async fn book_stream(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let (handle, receiver) = state.broadcaster.connect().map_err(|err| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Live updates are unavailable.",
            Some(err.to_string()),
        )
    })?;

    Ok(live_stream_response(
        handle,
        receiver,
        state.live_keep_alive,
    ))
}
