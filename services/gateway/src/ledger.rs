//! Status ledger access from the gateway

use anyhow::Context;
use async_trait::async_trait;
use market_types::ids::RequestId;
use market_types::status::RequestStatus;
use read_store::SqliteStatusLedger;
use std::sync::Arc;

#[async_trait]
pub trait StatusLedger: Send + Sync {
    /// Record a freshly accepted request.
    async fn insert_pending(&self, row: RequestStatus) -> anyhow::Result<()>;

    /// Drop a request that was never published.
    async fn discard_pending(&self, id: RequestId) -> anyhow::Result<bool>;
}

pub struct SqliteLedger {
    inner: Arc<SqliteStatusLedger>,
}

impl SqliteLedger {
    pub fn new(inner: Arc<SqliteStatusLedger>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StatusLedger for SqliteLedger {
    async fn insert_pending(&self, row: RequestStatus) -> anyhow::Result<()> {
        let ledger = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || ledger.insert_pending(&row))
            .await
            .context("ledger insert task")??;
        Ok(())
    }

    async fn discard_pending(&self, id: RequestId) -> anyhow::Result<bool> {
        let ledger = Arc::clone(&self.inner);
        let removed = tokio::task::spawn_blocking(move || ledger.discard_pending(&id))
            .await
            .context("ledger discard task")??;
        Ok(removed)
    }
}
