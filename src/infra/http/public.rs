use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use tracing::error;

use crate::infra::uploads::{UploadStorage, UploadStorageError};

use super::api::error::ApiError;

const SOURCE: &str = "infra::http::public::serve_upload";

/// Stored attachments, served read-only under `/uploads`.
pub fn build_upload_router(storage: Arc<UploadStorage>) -> Router {
    Router::new()
        .route("/uploads/{*path}", get(serve_upload))
        .with_state(storage)
}

async fn serve_upload(
    State(storage): State<Arc<UploadStorage>>,
    Path(path): Path<String>,
) -> Response {
    match storage.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => {
            ApiError::not_found("File not found").into_response()
        }
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            ApiError::not_found("File not found").into_response()
        }
        Err(err) => {
            error!(
                target: SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            ApiError::internal("Failed to read uploaded file.", err.to_string()).into_response()
        }
    }
}

/// Stored names embed a fresh uuid, so a name never changes content.
fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
