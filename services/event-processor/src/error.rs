use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use command_log::{LogError, ReaderError};
use market_types::ids::{EventId, MarketId};
use read_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Why a command could not be applied to the read model
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("market {market_id} does not exist")]
    MarketNotFound { market_id: MarketId },

    #[error("market {market_id} already belongs to event {owner}")]
    MarketOwnedElsewhere { market_id: MarketId, owner: EventId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Command log error: {0}")]
    Log(#[from] LogError),

    #[error("Command log reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Read store error: {0}")]
    Store(#[from] StoreError),

    #[error("Reader for partition {0} is poisoned")]
    Poisoned(u32),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Query API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
