//! Command Log
//!
//! Durable, partitioned, append-only log that carries market-change commands
//! from the gateway to the event processor.
//!
//! - Records are routed to a partition by aggregate key (`partition`).
//! - Each partition is a sequence of checksummed journal files (`journal`)
//!   with gapless per-partition sequence numbers starting at 1.
//! - Consumers tail a partition incrementally and resume after a committed
//!   sequence (`reader`), giving at-least-once delivery in append order.
//!
//! # Layout
//! ```text
//! <root>/log.meta                     partition count, fixed at creation
//! <root>/partition-000/journal-000000.bin
//! <root>/partition-000/journal-000001.bin
//! <root>/partition-001/...
//! ```

pub mod journal;
pub mod reader;
pub mod partition;
pub mod log;

pub use journal::{FlushPolicy, FsyncPolicy, JournalEntry, JournalError};
pub use log::{CommandLogWriter, LogConfig, LogError, RecordPosition};
pub use partition::Partitioner;
pub use reader::{JournalReader, ReaderError};
