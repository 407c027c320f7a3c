//! Request-status ledger
//!
//! The gateway inserts a PENDING row before it publishes a command and
//! removes it again if publishing fails. The processor completes rows through
//! [`StoreTx::record_outcome`](crate::model::StoreTx::record_outcome).
//! Storage enforces the lifecycle: a PENDING insert never overwrites an
//! existing row, and only PENDING rows are ever updated or discarded.

use crate::db::{Database, StoreConfig};
use crate::error::{LedgerError, StoreError};
use market_types::prelude::*;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

/// Gateway-side handle on the status table.
///
/// Exposes no read-model operations.
pub struct SqliteStatusLedger {
    db: Database,
}

impl SqliteStatusLedger {
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

    /// Insert a fresh PENDING row. Fails with `Duplicate` if the id exists.
    pub fn insert_pending(&self, row: &RequestStatus) -> Result<(), LedgerError> {
        let conn = self.db.lock()?;
        if !insert_status(&conn, row)? {
            return Err(LedgerError::Duplicate(row.request_id));
        }
        debug!(request_id = %row.request_id, "Recorded pending request");
        Ok(())
    }

    /// Remove a row that is still PENDING. Returns whether a row was removed.
    pub fn discard_pending(&self, id: &RequestId) -> Result<bool, LedgerError> {
        let conn = self.db.lock()?;
        let removed = conn.execute(
            "DELETE FROM request_status WHERE request_id = ?1 AND status = 'PENDING'",
            params![id.to_string()],
        )?;
        Ok(removed > 0)
    }

    pub fn get(&self, id: &RequestId) -> Result<Option<RequestStatus>, LedgerError> {
        let conn = self.db.lock()?;
        Ok(load_status(&conn, id)?)
    }
}

const STATUS_COLUMNS: &str =
    "request_id, status, message, operation, market_id, event_id, created_at, updated_at";

/// Insert a row unless one exists. Returns whether it was inserted.
pub(crate) fn insert_status(conn: &Connection, row: &RequestStatus) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        &format!(
            "INSERT INTO request_status ({STATUS_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(request_id) DO NOTHING"
        ),
        params![
            row.request_id.to_string(),
            row.status.as_str(),
            row.message,
            row.operation.as_str(),
            row.market_id.as_str(),
            row.event_id.as_str(),
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(inserted > 0)
}

/// Write a terminal state over a PENDING row. Returns whether it was updated.
pub(crate) fn complete_status(conn: &Connection, row: &RequestStatus) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE request_status SET status = ?2, message = ?3, updated_at = ?4
         WHERE request_id = ?1 AND status = 'PENDING'",
        params![
            row.request_id.to_string(),
            row.status.as_str(),
            row.message,
            row.updated_at,
        ],
    )?;
    Ok(updated > 0)
}

pub(crate) fn load_status(
    conn: &Connection,
    id: &RequestId,
) -> Result<Option<RequestStatus>, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {STATUS_COLUMNS} FROM request_status WHERE request_id = ?1"),
            params![id.to_string()],
            RawStatus::from_row,
        )
        .optional()?;
    raw.map(RawStatus::into_status).transpose()
}

struct RawStatus {
    request_id: String,
    status: String,
    message: String,
    operation: String,
    market_id: String,
    event_id: String,
    created_at: i64,
    updated_at: i64,
}

impl RawStatus {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            request_id: row.get(0)?,
            status: row.get(1)?,
            message: row.get(2)?,
            operation: row.get(3)?,
            market_id: row.get(4)?,
            event_id: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_status(self) -> Result<RequestStatus, StoreError> {
        let request_id = RequestId::parse(&self.request_id)
            .ok_or_else(|| StoreError::corrupt("request_status", format!("request id {}", self.request_id)))?;
        let status = self
            .status
            .parse::<RequestState>()
            .map_err(|e| StoreError::corrupt("request_status", e.to_string()))?;
        let operation = self
            .operation
            .parse::<Operation>()
            .map_err(|e| StoreError::corrupt("request_status", e.to_string()))?;

        Ok(RequestStatus {
            request_id,
            status,
            message: self.message,
            operation,
            market_id: MarketId::new(self.market_id),
            event_id: EventId::new(self.event_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
