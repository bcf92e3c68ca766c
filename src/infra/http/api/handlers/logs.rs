//! Activity log handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use perpus_api_types::CreateLogRequest;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_logs(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let logs = state.logs.list().await?;
    Ok(Json(logs))
}

pub async fn create_log(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload = parse_log_request(&body)?;
    let log = state
        .logs
        .create(payload.action.as_deref(), payload.details.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn clear_logs(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    state.logs.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// An empty body is treated like `{}` so the missing action is reported.
fn parse_log_request(body: &[u8]) -> Result<CreateLogRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateLogRequest::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid JSON body.",
            Some(err.to_string()),
        )
    })
}
