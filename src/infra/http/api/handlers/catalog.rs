//! Genre and language facet handlers.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_genres(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let genres = state.catalog.genres().await?;
    Ok(Json(genres))
}

pub async fn list_languages(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let languages = state.catalog.languages().await?;
    Ok(Json(languages))
}
