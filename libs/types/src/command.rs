//! Market-change payloads and the command log schema
//!
//! A client submits a [`MarketPayload`]; the HTTP verb decides the
//! [`Operation`]. The gateway turns both into a [`MarketCommand`], a tagged
//! variant per operation, and wraps it in a [`CommandEnvelope`] carrying the
//! request id before appending it to the command log.
//!
//! Wire shape of an envelope:
//! ```text
//! {"requestId": "...", "issuedAt": 1767225600000,
//!  "operation": "ADD", "marketId": "1231231", "marketName": "Match Odds",
//!  "event": {"id": "987654321", "name": "...", "date": "01/01/2027"},
//!  "selections": [{"id": "182", "name": "Benfica", "odd": 1.13}]}
//! ```

use crate::errors::ValidationError;
use crate::ids::{EventId, MarketId, RequestId, SelectionId};
use crate::odds::Odd;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Mutation requested by a market-change command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// Create the market (idempotent upsert by market id)
    Add,
    /// Replace the market's name and selections
    Update,
    /// Remove the market from its event
    Delete,
}

impl Operation {
    /// Wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "ADD",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }

    /// Lower-case verb used in status messages
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD" => Ok(Operation::Add),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            other => Err(ValidationError::UnknownOperation(other.to_string())),
        }
    }
}

/// Event information carried by every market payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: EventId,
    #[serde(default)]
    pub name: String,
    /// Free-form date string, stored as given
    #[serde(default)]
    pub date: String,
}

/// One selection of a market, a value object with no lifecycle of its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub id: SelectionId,
    #[serde(default)]
    pub name: String,
    pub odd: Odd,
}

/// Full market payload accepted by the gateway for every verb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPayload {
    pub market_id: MarketId,
    #[serde(default)]
    pub market_name: String,
    pub event: EventInfo,
    #[serde(default)]
    pub selections: Vec<Selection>,
}

impl MarketPayload {
    /// Parse a raw request body and validate it.
    ///
    /// Any body that does not parse into the typed shape, or that parses
    /// but breaks a field rule, is reported as a [`ValidationError`].
    pub fn from_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let payload: MarketPayload = serde_json::from_slice(body)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Check the field rules that serde cannot express
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.market_id.is_blank() {
            return Err(ValidationError::MissingField("marketId"));
        }
        if self.event.id.is_blank() {
            return Err(ValidationError::MissingField("event.id"));
        }

        let mut seen = HashSet::with_capacity(self.selections.len());
        for selection in &self.selections {
            if selection.id.is_blank() {
                return Err(ValidationError::MissingField("selections[].id"));
            }
            if !selection.odd.is_valid() {
                return Err(ValidationError::InvalidOdd {
                    selection_id: selection.id.to_string(),
                    odd: selection.odd.to_string(),
                });
            }
            if !seen.insert(&selection.id) {
                return Err(ValidationError::DuplicateSelection(selection.id.to_string()));
            }
        }
        Ok(())
    }
}

/// Typed market-change command, one variant per operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "UPPERCASE")]
pub enum MarketCommand {
    Add(MarketPayload),
    Update(MarketPayload),
    Delete(MarketPayload),
}

impl MarketCommand {
    /// Build the command variant for an operation
    pub fn new(operation: Operation, payload: MarketPayload) -> Self {
        match operation {
            Operation::Add => MarketCommand::Add(payload),
            Operation::Update => MarketCommand::Update(payload),
            Operation::Delete => MarketCommand::Delete(payload),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            MarketCommand::Add(_) => Operation::Add,
            MarketCommand::Update(_) => Operation::Update,
            MarketCommand::Delete(_) => Operation::Delete,
        }
    }

    pub fn payload(&self) -> &MarketPayload {
        match self {
            MarketCommand::Add(p) | MarketCommand::Update(p) | MarketCommand::Delete(p) => p,
        }
    }

    pub fn market_id(&self) -> &MarketId {
        &self.payload().market_id
    }

    pub fn event_id(&self) -> &EventId {
        &self.payload().event.id
    }
}

/// Command log record value: the command plus the request it answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub request_id: RequestId,
    /// Unix milliseconds at which the gateway accepted the command
    pub issued_at: i64,
    #[serde(flatten)]
    pub command: MarketCommand,
}

impl CommandEnvelope {
    /// Wrap a command accepted now under the given request id
    pub fn new(request_id: RequestId, command: MarketCommand) -> Self {
        Self {
            request_id,
            issued_at: chrono::Utc::now().timestamp_millis(),
            command,
        }
    }

    /// Aggregate key for partitioning (the market id)
    pub fn key(&self) -> &str {
        self.command.market_id().aggregate_key()
    }

    /// Serialize to the JSON bytes stored on the log
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from log bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
