use crate::ledger::StatusLedger;
use crate::publisher::CommandPublisher;
use reqwest::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn CommandPublisher>,
    pub ledger: Arc<dyn StatusLedger>,
    pub http_client: Client,
    /// Base URL of the event processor's query API
    pub processor_url: String,
}

impl AppState {
    pub fn new(
        publisher: Arc<dyn CommandPublisher>,
        ledger: Arc<dyn StatusLedger>,
        processor_url: String,
    ) -> Self {
        Self {
            publisher,
            ledger,
            http_client: Client::new(),
            processor_url: processor_url.trim_end_matches('/').to_string(),
        }
    }
}
