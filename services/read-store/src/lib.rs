//! Read store for the market-change system
//!
//! One SQLite file holds three things:
//! - the read model (events, markets, selections), written only by the
//!   event processor
//! - the request-status ledger, created PENDING by the gateway and completed
//!   by the processor
//! - the consumer offsets of the command log partitions
//!
//! The file is opened in WAL mode with a busy timeout so that both services
//! can hold a connection at once.

pub mod db;
pub mod error;
pub mod ledger;
pub mod model;

pub use db::StoreConfig;
pub use error::{LedgerError, StoreError};
pub use ledger::SqliteStatusLedger;
pub use model::{SqliteReadStore, StoreTx};
