//! Command publishing
//!
//! [`CommandPublisher`] is the gateway's only way onto the command log.

use anyhow::Context;
use async_trait::async_trait;
use command_log::{CommandLogWriter, RecordPosition};
use market_types::command::CommandEnvelope;
use std::sync::Arc;

#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Append the envelope under its aggregate key.
    async fn publish(&self, envelope: &CommandEnvelope) -> anyhow::Result<RecordPosition>;
}

/// Publishes to the local partitioned journal.
pub struct JournalPublisher {
    log: Arc<CommandLogWriter>,
}

impl JournalPublisher {
    pub fn new(log: Arc<CommandLogWriter>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl CommandPublisher for JournalPublisher {
    async fn publish(&self, envelope: &CommandEnvelope) -> anyhow::Result<RecordPosition> {
        let value = envelope.encode().context("encode command envelope")?;
        let key = envelope.key().to_string();
        let log = Arc::clone(&self.log);

        let position = tokio::task::spawn_blocking(move || log.append(&key, value))
            .await
            .context("command log append task")??;
        Ok(position)
    }
}
