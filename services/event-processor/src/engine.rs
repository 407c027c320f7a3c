//! Apply engine
//!
//! Turns one command log record into read-model changes, a request outcome
//! and an advanced consumer offset, all in one read-store transaction.
//!
//! Per command:
//! 1. create the event or overwrite its name and date
//! 2. ADD / UPDATE replace the market's selections wholesale
//! 3. DELETE removes the market if the event has it
//!
//! A rejected command rolls back; its FAILED outcome and the offset are then
//! committed on their own so the partition moves on.

use crate::error::ApplyError;
use command_log::JournalEntry;
use market_types::prelude::*;
use read_store::{SqliteReadStore, StoreError, StoreTx};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What happened to one log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Already consumed before; nothing changed
    Duplicate,
    /// Applied or rejected; the request reached this outcome
    Completed {
        request_id: RequestId,
        outcome: RequestOutcome,
    },
    /// Not a command envelope; offset advanced, no request to update
    Undecodable,
}

/// Applies log records to the read store
pub struct Processor {
    store: Arc<SqliteReadStore>,
}

impl Processor {
    pub fn new(store: Arc<SqliteReadStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<SqliteReadStore> {
        &self.store
    }

    /// Process one record of `partition`.
    ///
    /// Blocking. A `StoreError` means nothing was committed and the same
    /// record should be retried.
    pub fn process(&self, partition: u32, entry: &JournalEntry) -> Result<RecordOutcome, StoreError> {
        let sequence = entry.sequence;
        let envelope = match CommandEnvelope::decode(&entry.value) {
            Ok(envelope) => envelope,
            Err(e) => {
                let fresh = self.store.transaction(|tx| -> Result<bool, StoreError> {
                    if consumed(tx, partition, sequence)? {
                        return Ok(false);
                    }
                    tx.commit_offset(partition, sequence)?;
                    Ok(true)
                })?;
                if !fresh {
                    return Ok(RecordOutcome::Duplicate);
                }
                error!(partition, sequence, key = %entry.key, error = %e, "Skipping undecodable record");
                return Ok(RecordOutcome::Undecodable);
            }
        };

        let applied = self.store.transaction(|tx| -> Result<Option<RequestOutcome>, ApplyError> {
            if consumed(tx, partition, sequence)? {
                return Ok(None);
            }
            let outcome = RequestOutcome::success(apply_command(tx, &envelope.command)?);
            tx.record_outcome(&envelope, &outcome)?;
            tx.commit_offset(partition, sequence)?;
            Ok(Some(outcome))
        });

        let outcome = match applied {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                debug!(partition, sequence, "Record already consumed");
                return Ok(RecordOutcome::Duplicate);
            }
            Err(ApplyError::Store(e)) => return Err(e),
            Err(rejection) => {
                let outcome = RequestOutcome::failed(failure_message(&envelope.command, &rejection));
                warn!(
                    partition,
                    sequence,
                    request_id = %envelope.request_id,
                    reason = %rejection,
                    "Command rejected"
                );
                let fresh = self.store.transaction(|tx| -> Result<bool, StoreError> {
                    if consumed(tx, partition, sequence)? {
                        return Ok(false);
                    }
                    tx.record_outcome(&envelope, &outcome)?;
                    tx.commit_offset(partition, sequence)?;
                    Ok(true)
                })?;
                if !fresh {
                    return Ok(RecordOutcome::Duplicate);
                }
                outcome
            }
        };

        Ok(RecordOutcome::Completed {
            request_id: envelope.request_id,
            outcome,
        })
    }
}

fn consumed(tx: &StoreTx<'_>, partition: u32, sequence: u64) -> Result<bool, StoreError> {
    Ok(tx
        .committed_offset(partition)?
        .is_some_and(|committed| sequence <= committed))
}

/// Apply a command inside an open transaction and describe the result.
pub fn apply_command(tx: &StoreTx<'_>, command: &MarketCommand) -> Result<String, ApplyError> {
    let payload = command.payload();
    let event_id = &payload.event.id;
    let market_id = &payload.market_id;

    let event_created = tx.upsert_event(&payload.event)?;

    match command {
        MarketCommand::Add(_) => {
            if let Some(owner) = tx.market_owner(market_id)? {
                if &owner != event_id {
                    return Err(ApplyError::MarketOwnedElsewhere {
                        market_id: market_id.clone(),
                        owner,
                    });
                }
            }
            let market_created =
                tx.replace_market(event_id, market_id, &payload.market_name, &payload.selections)?;
            Ok(if event_created {
                format!("Created new event {} with market {}", event_id, market_id)
            } else if market_created {
                format!("Added market {} to event {}", market_id, event_id)
            } else {
                format!("Replaced market {} of event {}", market_id, event_id)
            })
        }
        MarketCommand::Update(_) => {
            match tx.market_owner(market_id)? {
                None => {
                    return Err(ApplyError::MarketNotFound {
                        market_id: market_id.clone(),
                    })
                }
                Some(owner) if &owner != event_id => {
                    return Err(ApplyError::MarketOwnedElsewhere {
                        market_id: market_id.clone(),
                        owner,
                    })
                }
                Some(_) => {}
            }
            tx.replace_market(event_id, market_id, &payload.market_name, &payload.selections)?;
            Ok(format!("Updated market {} of event {}", market_id, event_id))
        }
        MarketCommand::Delete(_) => {
            if tx.remove_market(event_id, market_id)? {
                Ok(format!("Deleted market {} from event {}", market_id, event_id))
            } else {
                Ok(format!(
                    "Market {} not found in event {}, nothing to delete",
                    market_id, event_id
                ))
            }
        }
    }
}

/// Status message for a rejected command.
pub fn failure_message(command: &MarketCommand, reason: &ApplyError) -> String {
    format!(
        "Failed to {} market {} of event {}: {}",
        command.operation().verb(),
        command.market_id(),
        command.event_id(),
        reason
    )
}
