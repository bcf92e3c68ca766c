use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use perpus_api_types::ErrorBody;

use crate::application::books::BookServiceError;
use crate::application::error::ErrorReport;
use crate::application::logs::LogServiceError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::uploads::UploadStorageError;

pub const BOOK_NOT_FOUND: &str = "Book not found";

/// JSON error rendered as `{"error": message}`.
///
/// `detail` never reaches the client; it is attached as an [`ErrorReport`] for
/// the response logging middleware.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, None)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, None)
    }

    pub fn internal(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            Some(detail.into()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn rate_limited(retry_after: u64) -> Response {
        let mut response = ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests, please try again later.",
            Some(format!("rate_limited: retry_after={retry_after}")),
        )
        .into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report_message = match &self.detail {
            Some(detail) => format!("{}: {detail}", self.message),
            None => self.message.clone(),
        };
        let mut response = (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response();
        ErrorReport::from_message("infra::http::api", self.status, report_message)
            .attach(&mut response);
        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { message } => Self::bad_request(message),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } => {
                Self::new(StatusCode::CONFLICT, "Duplicate record", Some(constraint))
            }
            RepoError::NotFound => Self::not_found("Resource not found"),
            RepoError::InvalidInput { message } => {
                Self::new(StatusCode::BAD_REQUEST, "Invalid input", Some(message))
            }
            RepoError::Integrity { message } => Self::new(
                StatusCode::CONFLICT,
                "Integrity constraint violated",
                Some(message),
            ),
            RepoError::Timeout => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Database timeout", None)
            }
            RepoError::Persistence(message) => Self::internal("Internal server error", message),
        }
    }
}

impl From<BookServiceError> for ApiError {
    fn from(err: BookServiceError) -> Self {
        match err {
            BookServiceError::Validation(err) => err.into(),
            BookServiceError::NotFound => Self::not_found(BOOK_NOT_FOUND),
            BookServiceError::Repo(err) => err.into(),
        }
    }
}

impl From<LogServiceError> for ApiError {
    fn from(err: LogServiceError) -> Self {
        match err {
            LogServiceError::Validation(err) => err.into(),
            LogServiceError::Repo(err) => err.into(),
        }
    }
}

impl From<UploadStorageError> for ApiError {
    fn from(err: UploadStorageError) -> Self {
        match err {
            UploadStorageError::PayloadTooLarge { .. } => Self::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Uploaded file is too large.",
                Some(err.to_string()),
            ),
            UploadStorageError::EmptyPayload => Self::bad_request("Uploaded file is empty."),
            UploadStorageError::PayloadStream { .. } => Self::new(
                StatusCode::BAD_REQUEST,
                "Failed to read uploaded file.",
                Some(err.to_string()),
            ),
            other => Self::internal("Failed to store uploaded file.", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn validation_errors_keep_their_message() {
        let response =
            ApiError::from(BookServiceError::Validation(DomainError::validation(
                "Invalid status provided.",
            )))
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Invalid status provided."})
        );
    }

    #[tokio::test]
    async fn persistence_details_stay_out_of_the_body() {
        let response =
            ApiError::from(RepoError::Persistence("connection reset".into())).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .cloned()
            .expect("report attached");
        assert_eq!(report.messages, vec!["Internal server error: connection reset"]);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Internal server error"})
        );
    }

    #[test]
    fn repo_errors_map_to_statuses() {
        let cases = [
            (RepoError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                RepoError::Duplicate {
                    constraint: "daily_visitors_date_key".into(),
                },
                StatusCode::CONFLICT,
            ),
            (RepoError::NotFound, StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(
            ApiError::from(BookServiceError::NotFound).message(),
            BOOK_NOT_FOUND
        );
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(42);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(header::RETRY_AFTER)
                .map(|value| value.as_bytes()),
            Some(&b"42"[..])
        );
    }
}
