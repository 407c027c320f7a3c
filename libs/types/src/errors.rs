//! Error types shared across the market-change services
//!
//! Error taxonomy using thiserror

use thiserror::Error;

/// Why a market-change payload was refused at the gateway boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid odd {odd} for selection {selection_id}: odds must be positive")]
    InvalidOdd { selection_id: String, odd: String },

    #[error("Duplicate selection id: {0}")]
    DuplicateSelection(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

/// Illegal request-status transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusTransitionError {
    #[error("Invalid state transition from {from} to {to}")]
    Illegal { from: String, to: String },

    #[error("Unknown request state: {0}")]
    UnknownState(String),
}
