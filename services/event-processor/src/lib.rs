//! Event Processor Service
//!
//! Consumes market-change commands from the partitioned command log and
//! applies them to the read model, then serves the read model and the
//! request-status ledger over HTTP.
//!
//! # Architecture
//!
//! ```text
//! Command log (partition 0..n)
//!        │
//!  ┌─────▼──────┐  one task per partition,
//!  │ Consumers  │  records applied strictly in log order
//!  └─────┬──────┘
//!        │
//!  ┌─────▼──────┐  apply + outcome + offset
//!  │  Engine    │  in one SQLite transaction
//!  └─────┬──────┘
//!        │
//!  ┌─────▼──────┐
//!  │ Read store │ ◀── GET /api/v1/events, GET /api/v1/requests/{id}
//!  └────────────┘
//! ```
//!
//! **Key invariants:**
//! - One writer per market: a market id always routes to the same partition
//! - A record at or below the committed offset is never applied again
//! - A request moves out of PENDING exactly once

pub mod api;
pub mod config;
pub mod consumer;
pub mod engine;
pub mod error;

pub use config::ProcessorConfig;
pub use consumer::{ConsumerGroup, ConsumerSettings};
pub use engine::{Processor, RecordOutcome};
pub use error::{ApplyError, ConfigError, ProcessorError};

pub const SERVICE_NAME: &str = "event-processor";
