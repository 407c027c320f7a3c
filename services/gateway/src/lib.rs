//! Command gateway
//!
//! Synchronous HTTP surface of the market-change system. Each accepted call
//! is validated, given a request id, recorded PENDING in the status ledger
//! and appended to the command log; the caller gets 202 and a location to
//! poll. Reads are forwarded to the event processor.

pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod publisher;
pub mod router;
pub mod state;

pub use config::GatewayConfig;
pub use router::create_router;
pub use state::AppState;

pub const SERVICE_NAME: &str = "gateway";
