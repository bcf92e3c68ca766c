//! Dashboard, analytics, and host handlers.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use perpus_api_types::HealthResponse;

use crate::application::server_info::server_info;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn get_stats(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.stats.summary().await?;
    Ok(Json(stats))
}

pub async fn get_analytics(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let series = state.visitors.analytics().await?;
    Ok(Json(series))
}

pub async fn get_server_ips() -> impl IntoResponse {
    Json(server_info())
}

pub async fn health(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    state
        .health
        .ping()
        .await
        .map_err(|err| ApiError::internal("Database connection failed", err.to_string()))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
