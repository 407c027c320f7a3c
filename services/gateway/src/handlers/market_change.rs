use crate::error::AppError;
use crate::models::{AcceptedResponse, status_location};
use crate::state::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use market_types::prelude::*;
use tracing::{error, info};

pub async fn add_market(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    accept(&state, Operation::Add, &body).await
}

pub async fn update_market(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    accept(&state, Operation::Update, &body).await
}

pub async fn delete_market(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    accept(&state, Operation::Delete, &body).await
}

pub async fn unsupported(method: Method) -> AppError {
    AppError::UnsupportedOperation(format!("{} is not supported on market-change", method))
}

async fn accept(state: &AppState, operation: Operation, body: &[u8]) -> Result<Response, AppError> {
    // 1. Parse and validate; nothing is recorded for a bad body
    let payload =
        MarketPayload::from_slice(body).map_err(|e| AppError::MalformedPayload(e.to_string()))?;

    let request_id = RequestId::new();
    let envelope = CommandEnvelope::new(request_id, MarketCommand::new(operation, payload));
    let pending = RequestStatus::pending(
        request_id,
        operation,
        envelope.command.market_id().clone(),
        envelope.command.event_id().clone(),
        envelope.issued_at,
    );

    // 2. PENDING first, so the status exists before the processor can see the command
    state.ledger.insert_pending(pending).await.map_err(|e| {
        error!(request_id = %request_id, error = %e, "Status ledger unavailable");
        AppError::ServiceUnavailable("Status ledger unavailable".into())
    })?;

    // 3. Publish, undoing the PENDING row if the log refuses
    let position = match state.publisher.publish(&envelope).await {
        Ok(position) => position,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Command log unavailable");
            if let Err(discard) = state.ledger.discard_pending(request_id).await {
                error!(request_id = %request_id, error = %discard, "Failed to discard pending status");
            }
            return Err(AppError::ServiceUnavailable("Command log unavailable".into()));
        }
    };

    info!(
        request_id = %request_id,
        operation = %operation,
        market_id = %envelope.command.market_id(),
        event_id = %envelope.command.event_id(),
        partition = position.partition,
        sequence = position.sequence,
        "Accepted market change"
    );

    let location = status_location(&request_id);
    let body = AcceptedResponse {
        request_id,
        status: RequestState::Pending,
        location: location.clone(),
    };
    Ok((StatusCode::ACCEPTED, [(header::LOCATION, location)], Json(body)).into_response())
}
