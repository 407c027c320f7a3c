//! Request status lifecycle
//!
//! ```text
//! PENDING ──applied──▶ SUCCESS
//!    └─────rejected──▶ FAILED
//! ```
//! PENDING is written by the gateway when it accepts a command. Only the
//! event processor moves a request to a terminal state, and only once.

use crate::command::Operation;
use crate::errors::StatusTransitionError;
use crate::ids::{EventId, MarketId, RequestId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing state of an accepted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestState {
    /// Accepted by the gateway, not yet applied
    Pending,
    /// Applied to the read model (terminal)
    Success,
    /// Rejected by the processor (terminal)
    Failed,
}

impl RequestState {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Success | RequestState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        matches!(
            (self, next),
            (RequestState::Pending, RequestState::Success) | (RequestState::Pending, RequestState::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "PENDING",
            RequestState::Success => "SUCCESS",
            RequestState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestState {
    type Err = StatusTransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RequestState::Pending),
            "SUCCESS" => Ok(RequestState::Success),
            "FAILED" => Ok(RequestState::Failed),
            other => Err(StatusTransitionError::UnknownState(other.to_string())),
        }
    }
}

/// Status ledger row for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    pub request_id: RequestId,
    pub status: RequestState,
    pub message: String,
    pub operation: Operation,
    pub market_id: MarketId,
    pub event_id: EventId,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds
    pub updated_at: i64,
}

impl RequestStatus {
    /// New PENDING row for a command accepted at `now`
    pub fn pending(
        request_id: RequestId,
        operation: Operation,
        market_id: MarketId,
        event_id: EventId,
        now: i64,
    ) -> Self {
        Self {
            request_id,
            status: RequestState::Pending,
            message: format!("Request to {} market {} accepted", operation.verb(), market_id),
            operation,
            market_id,
            event_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a terminal state
    ///
    /// Returns an error (and leaves the row untouched) if the row is
    /// already terminal or `next` is not terminal.
    pub fn complete(
        &mut self,
        next: RequestState,
        message: impl Into<String>,
        now: i64,
    ) -> Result<(), StatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusTransitionError::Illegal {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.message = message.into();
        self.updated_at = now;
        Ok(())
    }
}

/// Outcome recorded by the processor for one applied (or rejected) command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub state: RequestState,
    pub message: String,
}

impl RequestOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self { state: RequestState::Success, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { state: RequestState::Failed, message: message.into() }
    }
}

/// Polling response body: `{"requestId", "status", "message"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub request_id: RequestId,
    pub status: RequestState,
    pub message: String,
}

impl From<RequestStatus> for StatusResponse {
    fn from(row: RequestStatus) -> Self {
        Self {
            request_id: row.request_id,
            status: row.status,
            message: row.message,
        }
    }
}
