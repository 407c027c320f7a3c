//! Read proxy to the event processor

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use market_types::ids::RequestId;
use serde_json::Value;

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    forward(&state, "/api/v1/events").await
}

pub async fn request_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let request_id = RequestId::parse(&id)
        .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?;
    forward(&state, &format!("/api/v1/requests/{}", request_id)).await
}

/// GET `path` on the processor and relay its status and JSON body.
async fn forward(state: &AppState, path: &str) -> Result<Response, AppError> {
    let res = state
        .http_client
        .get(format!("{}{}", state.processor_url, path))
        .send()
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("Event processor error: {}", e)))?;

    let status = StatusCode::from_u16(res.status().as_u16())
        .map_err(|e| AppError::InternalError(e.into()))?;
    let body = res
        .json::<Value>()
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("Event processor sent an invalid body: {}", e)))?;

    Ok((status, Json(body)).into_response())
}
