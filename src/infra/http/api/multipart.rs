//! Book form parsing: text fields plus streamed `pdf` / `coverImage` attachments.

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use futures::StreamExt;
use tracing::warn;

use crate::domain::books::BookFields;
use crate::infra::uploads::{AttachmentKind, UploadStorage, UploadStorageError};

use super::error::ApiError;

const SOURCE: &str = "infra::http::api::multipart";

/// Parsed form. Attachments are already on disk under the returned names.
#[derive(Debug, Default)]
pub(crate) struct BookForm {
    pub(crate) fields: BookFields,
    pub(crate) pdf: Option<String>,
    pub(crate) cover: Option<String>,
}

impl BookForm {
    pub(crate) fn stored_paths(&self) -> Vec<String> {
        self.pdf.iter().chain(self.cover.iter()).cloned().collect()
    }

    fn slot(&mut self, kind: AttachmentKind) -> &mut Option<String> {
        match kind {
            AttachmentKind::Pdf => &mut self.pdf,
            AttachmentKind::Cover => &mut self.cover,
        }
    }
}

/// Read the whole form. Files stored before a failure are removed again.
pub(crate) async fn read_book_form(
    multipart: &mut Multipart,
    storage: &UploadStorage,
) -> Result<BookForm, ApiError> {
    let mut form = BookForm::default();
    match read_fields(multipart, storage, &mut form).await {
        Ok(()) => Ok(form),
        Err(err) => {
            storage.delete_quietly(form.stored_paths()).await;
            Err(err)
        }
    }
}

async fn read_fields(
    multipart: &mut Multipart,
    storage: &UploadStorage,
    form: &mut BookForm,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_to_api)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let Some(kind) = AttachmentKind::from_field(&name) else {
            let value = field.text().await.map_err(multipart_to_api)?;
            form.fields.set(&name, value);
            continue;
        };

        // Browsers send an empty, unnamed part when no file was chosen.
        let file_name = match field.file_name() {
            Some(file_name) if !file_name.trim().is_empty() => file_name.to_string(),
            _ => continue,
        };
        let content_type = field.content_type().map(str::to_string);

        if !kind.accepts(&file_name, content_type.as_deref()) {
            return Err(ApiError::bad_request(match kind {
                AttachmentKind::Pdf => "The pdf field only accepts PDF files.",
                AttachmentKind::Cover => "The coverImage field only accepts image files.",
            }));
        }
        if form.slot(kind).is_some() {
            return Err(ApiError::bad_request(format!(
                "Only one {} file is allowed.",
                kind.field_name()
            )));
        }

        let chunks = field.map(|chunk| chunk.map_err(stream_error));
        let stored = storage.store_stream(&file_name, chunks).await?;
        *form.slot(kind) = Some(stored.stored_path);
    }

    Ok(())
}

fn stream_error(err: MultipartError) -> UploadStorageError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadStorageError::PayloadTooLarge {
            source: Box::new(err),
        }
    } else {
        UploadStorageError::PayloadStream {
            source: Box::new(err),
        }
    }
}

fn multipart_to_api(err: MultipartError) -> ApiError {
    let status = err.status();
    warn!(
        target: SOURCE,
        status = status.as_u16(),
        error = %err,
        "failed to read multipart payload"
    );
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Uploaded file is too large.",
            Some(err.body_text()),
        ),
        _ => ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid multipart form data.",
            Some(err.body_text()),
        ),
    }
}
