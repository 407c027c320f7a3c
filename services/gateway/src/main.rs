use anyhow::Result;
use command_log::CommandLogWriter;
use gateway::ledger::SqliteLedger;
use gateway::publisher::JournalPublisher;
use gateway::{AppState, GatewayConfig, create_router};
use read_store::SqliteStatusLedger;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    info!(
        addr = %config.addr,
        processor = %config.processor_base_url,
        log_dir = %config.log_dir.display(),
        partitions = config.partitions,
        "Starting Gateway API service"
    );

    let log = Arc::new(CommandLogWriter::open(&config.log_config())?);
    let ledger = Arc::new(SqliteStatusLedger::open(&config.store_config())?);

    let state = AppState::new(
        Arc::new(JournalPublisher::new(Arc::clone(&log))),
        Arc::new(SqliteLedger::new(ledger)),
        config.processor_base_url.clone(),
    );
    let app = create_router(state);

    let listener = TcpListener::bind(config.addr).await?;
    info!("Listening on {}", config.addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = log.sync_all() {
        error!(error = %e, "Failed to sync command log on shutdown");
    }
    info!("Gateway stopped");
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
