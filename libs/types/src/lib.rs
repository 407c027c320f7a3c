//! Types library for the market-change system
//!
//! This library provides the type definitions shared by the command gateway,
//! the command log consumer and the read store, so that every process agrees
//! on identifiers, the command wire schema and the request-status lifecycle.
//!
//! # Modules
//! - `ids`: Identifiers (EventId, MarketId, SelectionId, RequestId)
//! - `odds`: Exact decimal odds
//! - `command`: Market payloads and the tagged ADD/UPDATE/DELETE command schema
//! - `status`: Request status lifecycle
//! - `view`: Read-model projections returned by the query surface
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod odds;
pub mod command;
pub mod status;
pub mod view;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::odds::*;
    pub use crate::command::*;
    pub use crate::status::*;
    pub use crate::view::*;
    pub use crate::errors::*;
}
