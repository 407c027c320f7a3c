//! Query API: event listing, request status, health

use crate::error::ApiError;
use crate::SERVICE_NAME;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use market_types::prelude::*;
use read_store::SqliteReadStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SqliteReadStore>,
}

pub fn create_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/events", get(list_events))
        .route("/requests/{id}", get(request_status));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn list_events(State(state): State<ApiState>) -> Result<Json<EventsResponse>, ApiError> {
    let store = Arc::clone(&state.store);
    let events = tokio::task::spawn_blocking(move || store.list_events())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(EventsResponse::new(events)))
}

pub async fn request_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let not_found = || ApiError::NotFound(format!("Request {} not found", id));
    let request_id = RequestId::parse(&id).ok_or_else(not_found)?;

    let store = Arc::clone(&state.store);
    let row = tokio::task::spawn_blocking(move || store.request_status(&request_id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    row.map(|row| Json(StatusResponse::from(row)))
        .ok_or_else(not_found)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": SERVICE_NAME }))
}
