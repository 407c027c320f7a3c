//! Event processor entry point.

use anyhow::Result;
use event_processor::api::{create_router, ApiState};
use event_processor::{ConsumerGroup, Processor, ProcessorConfig};
use read_store::SqliteReadStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ProcessorConfig::from_env()?;
    info!(
        addr = %config.addr,
        log_dir = %config.log_dir.display(),
        partitions = config.partitions,
        store = %config.store_path.display(),
        "Starting event processor"
    );

    let store = Arc::new(SqliteReadStore::open(&config.store_config())?);
    let processor = Arc::new(Processor::new(Arc::clone(&store)));
    let consumers = ConsumerGroup::spawn(&config.log_config(), processor, config.consumer_settings())?;
    info!("partitions assigned: {:?}", consumers.partitions());

    let app = create_router(ApiState { store });
    let listener = TcpListener::bind(config.addr).await?;
    info!("Event processor listening on {}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    consumers.shutdown().await;
    info!("Event processor stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
