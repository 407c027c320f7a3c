//! Read model: events, markets and selections
//!
//! Every mutation happens inside a [`StoreTx`] opened with
//! [`SqliteReadStore::transaction`], which also carries the consumer offset
//! and the request outcome so that applying a command is atomic.

use crate::db::{now_millis, Database, StoreConfig};
use crate::error::StoreError;
use crate::ledger::{complete_status, insert_status, load_status};
use market_types::prelude::*;
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use tracing::debug;

/// Processor-side handle on the read store.
pub struct SqliteReadStore {
    db: Database,
}

impl SqliteReadStore {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::open(config)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::open_in_memory()?,
        })
    }

    /// Run `f` inside one write transaction.
    ///
    /// Commits when `f` returns `Ok`; any `Err` rolls everything back.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&StoreTx<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let scope = StoreTx { tx };
        let value = f(&scope)?;
        scope.tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    pub fn committed_offset(&self, partition: u32) -> Result<Option<u64>, StoreError> {
        let conn = self.db.lock()?;
        read_offset(&conn, partition)
    }

    pub fn request_status(&self, id: &RequestId) -> Result<Option<RequestStatus>, StoreError> {
        let conn = self.db.lock()?;
        load_status(&conn, id)
    }

    /// All events in creation order, markets in insertion order, selections
    /// in payload order.
    pub fn list_events(&self) -> Result<Vec<EventView>, StoreError> {
        let conn = self.db.lock()?;

        let mut selections: HashMap<String, Vec<Selection>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT market_id, selection_id, name, odd FROM selections ORDER BY market_id, position",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            for row in rows {
                let (market_id, id, name, odd) = row?;
                let odd = odd
                    .parse::<Odd>()
                    .map_err(|e| StoreError::corrupt("selections", format!("odd {}: {}", odd, e)))?;
                selections.entry(market_id).or_default().push(Selection {
                    id: SelectionId::new(id),
                    name,
                    odd,
                });
            }
        }

        let mut markets: HashMap<String, Vec<MarketView>> = HashMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT event_id, market_id, name FROM markets ORDER BY event_id, position")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?;
            for row in rows {
                let (event_id, market_id, name) = row?;
                let market_selections = selections.remove(&market_id).unwrap_or_default();
                markets.entry(event_id).or_default().push(MarketView {
                    id: MarketId::new(market_id),
                    name,
                    selections: market_selections,
                });
            }
        }

        let mut stmt = conn.prepare("SELECT event_id, name, date FROM events ORDER BY created_seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (event_id, name, date) = row?;
            let event_markets = markets.remove(&event_id).unwrap_or_default();
            events.push(EventView {
                id: EventId::new(event_id),
                name,
                date,
                markets: event_markets,
            });
        }
        Ok(events)
    }
}

fn read_offset(conn: &rusqlite::Connection, partition: u32) -> Result<Option<u64>, StoreError> {
    let sequence: Option<i64> = conn
        .query_row(
            "SELECT sequence FROM consumer_offsets WHERE partition_id = ?1",
            params![partition],
            |row| row.get(0),
        )
        .optional()?;
    Ok(sequence.map(|s| s as u64))
}

/// An open write transaction on the read store.
pub struct StoreTx<'c> {
    tx: Transaction<'c>,
}

impl StoreTx<'_> {
    /// Create the event or overwrite its name and date. Returns whether it
    /// was created.
    pub fn upsert_event(&self, event: &EventInfo) -> Result<bool, StoreError> {
        let updated = self.tx.execute(
            "UPDATE events SET name = ?2, date = ?3 WHERE event_id = ?1",
            params![event.id.as_str(), event.name, event.date],
        )?;
        if updated > 0 {
            return Ok(false);
        }
        self.tx.execute(
            "INSERT INTO events (event_id, name, date, created_seq)
             SELECT ?1, ?2, ?3, COALESCE(MAX(created_seq), 0) + 1 FROM events",
            params![event.id.as_str(), event.name, event.date],
        )?;
        Ok(true)
    }

    /// The event a market currently belongs to.
    pub fn market_owner(&self, market_id: &MarketId) -> Result<Option<EventId>, StoreError> {
        let owner: Option<String> = self
            .tx
            .query_row(
                "SELECT event_id FROM markets WHERE market_id = ?1",
                params![market_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner.map(EventId::new))
    }

    /// Set the market's name and replace its whole selection set, creating
    /// the market at the end of the event if needed. Returns whether it was
    /// created.
    pub fn replace_market(
        &self,
        event_id: &EventId,
        market_id: &MarketId,
        name: &str,
        selections: &[Selection],
    ) -> Result<bool, StoreError> {
        let updated = self.tx.execute(
            "UPDATE markets SET name = ?3 WHERE event_id = ?1 AND market_id = ?2",
            params![event_id.as_str(), market_id.as_str(), name],
        )?;
        let created = updated == 0;
        if created {
            self.tx.execute(
                "INSERT INTO markets (event_id, market_id, name, position)
                 SELECT ?1, ?2, ?3, COALESCE(MAX(position), 0) + 1 FROM markets WHERE event_id = ?1",
                params![event_id.as_str(), market_id.as_str(), name],
            )?;
        } else {
            self.tx.execute(
                "DELETE FROM selections WHERE market_id = ?1",
                params![market_id.as_str()],
            )?;
        }

        let mut insert = self.tx.prepare_cached(
            "INSERT INTO selections (market_id, position, selection_id, name, odd)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, selection) in selections.iter().enumerate() {
            insert.execute(params![
                market_id.as_str(),
                position as i64,
                selection.id.as_str(),
                selection.name,
                selection.odd.to_string(),
            ])?;
        }
        debug!(event_id = %event_id, market_id = %market_id, selections = selections.len(), created, "Replaced market");
        Ok(created)
    }

    /// Remove a market and its selections from an event. Returns whether it
    /// was present.
    pub fn remove_market(&self, event_id: &EventId, market_id: &MarketId) -> Result<bool, StoreError> {
        let removed = self.tx.execute(
            "DELETE FROM markets WHERE event_id = ?1 AND market_id = ?2",
            params![event_id.as_str(), market_id.as_str()],
        )?;
        Ok(removed > 0)
    }

    pub fn committed_offset(&self, partition: u32) -> Result<Option<u64>, StoreError> {
        read_offset(&self.tx, partition)
    }

    /// Advance the partition's offset. Never moves it backwards.
    pub fn commit_offset(&self, partition: u32, sequence: u64) -> Result<(), StoreError> {
        self.tx.execute(
            "INSERT INTO consumer_offsets (partition_id, sequence) VALUES (?1, ?2)
             ON CONFLICT(partition_id) DO UPDATE SET sequence = excluded.sequence
             WHERE excluded.sequence > consumer_offsets.sequence",
            params![partition, sequence as i64],
        )?;
        Ok(())
    }

    /// Move the command's request to its terminal state.
    ///
    /// A row that is already terminal is left alone and `false` is returned.
    /// A missing row is created directly in the terminal state.
    pub fn record_outcome(
        &self,
        envelope: &CommandEnvelope,
        outcome: &RequestOutcome,
    ) -> Result<bool, StoreError> {
        let now = now_millis();
        match load_status(&self.tx, &envelope.request_id)? {
            Some(mut row) => {
                if row.complete(outcome.state, outcome.message.clone(), now).is_err() {
                    debug!(request_id = %envelope.request_id, status = %row.status, "Request already terminal");
                    return Ok(false);
                }
                complete_status(&self.tx, &row)
            }
            None => {
                let mut row = RequestStatus::pending(
                    envelope.request_id,
                    envelope.command.operation(),
                    envelope.command.market_id().clone(),
                    envelope.command.event_id().clone(),
                    envelope.issued_at,
                );
                if row.complete(outcome.state, outcome.message.clone(), now).is_err() {
                    return Ok(false);
                }
                insert_status(&self.tx, &row)
            }
        }
    }
}
