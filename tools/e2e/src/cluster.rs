//! In-process cluster: one gateway, one event processor

use anyhow::Result;
use command_log::{CommandLogWriter, LogConfig};
use event_processor::api::ApiState;
use event_processor::{ConsumerGroup, ConsumerSettings, Processor};
use gateway::ledger::SqliteLedger;
use gateway::publisher::JournalPublisher;
use gateway::AppState;
use read_store::{SqliteReadStore, SqliteStatusLedger, StoreConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ClusterOptions {
    pub partitions: u32,
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            partitions: 4,
            poll_interval: Duration::from_millis(10),
            retry_backoff: Duration::from_millis(50),
        }
    }
}

struct Server {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl Server {
    async fn spawn(router: axum::Router) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = stopped.await;
                })
                .await
        });
        Ok(Self { addr, stop, task })
    }

    async fn stop(self, name: &str) {
        let _ = self.stop.send(());
        match self.task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(server = name, error = %e, "Server exited with error"),
            Err(e) => warn!(server = name, error = %e, "Server task failed"),
        }
    }
}

/// A running gateway and event processor over a scratch directory.
pub struct Cluster {
    gateway: Server,
    processor: Server,
    consumers: ConsumerGroup,
    partitions: Vec<u32>,
    // Removed on drop, after the services are gone
    _dir: TempDir,
}

impl Cluster {
    pub async fn start() -> Result<Self> {
        Self::start_with(ClusterOptions::default()).await
    }

    pub async fn start_with(options: ClusterOptions) -> Result<Self> {
        let dir = TempDir::new()?;
        let log_config = LogConfig::new(dir.path().join("command-log"), options.partitions);
        let store_config = StoreConfig::new(dir.path().join("read-store.db"));

        // Event processor
        let store = Arc::new(SqliteReadStore::open(&store_config)?);
        let consumers = ConsumerGroup::spawn(
            &log_config,
            Arc::new(Processor::new(Arc::clone(&store))),
            ConsumerSettings {
                poll_interval: options.poll_interval,
                retry_backoff: options.retry_backoff,
            },
        )?;
        let partitions = consumers.partitions();
        let processor = Server::spawn(event_processor::api::create_router(ApiState { store })).await?;
        info!(addr = %processor.addr, "partitions assigned: {:?}", partitions);

        // Gateway
        let log = Arc::new(CommandLogWriter::open(&log_config)?);
        let ledger = Arc::new(SqliteStatusLedger::open(&store_config)?);
        let state = AppState::new(
            Arc::new(JournalPublisher::new(log)),
            Arc::new(SqliteLedger::new(ledger)),
            format!("http://{}", processor.addr),
        );
        let gateway = Server::spawn(gateway::create_router(state)).await?;
        info!(addr = %gateway.addr, "Gateway started");

        Ok(Self {
            gateway,
            processor,
            consumers,
            partitions,
            _dir: dir,
        })
    }

    /// Base URL clients should use.
    pub fn gateway_url(&self) -> String {
        format!("http://{}", self.gateway.addr)
    }

    pub fn processor_url(&self) -> String {
        format!("http://{}", self.processor.addr)
    }

    pub fn partitions(&self) -> &[u32] {
        &self.partitions
    }

    /// Stop the processor, then its consumers, then the gateway.
    pub async fn shutdown(self) {
        self.processor.stop("event-processor").await;
        self.consumers.shutdown().await;
        self.gateway.stop("gateway").await;
    }
}
