//! End-to-end harness for the market-change system
//!
//! Runs a gateway and an event processor in-process on ephemeral ports,
//! sharing a scratch command log and read store, and drives them over HTTP
//! the way a client would.
//!
//! # Modules
//! - `cluster`: starts and stops both services
//! - `client`: HTTP client with bounded polling helpers
//! - `scenario`: payload builders and a seeded command generator

pub mod client;
pub mod cluster;
pub mod scenario;

pub use client::{MarketClient, Submitted};
pub use cluster::{Cluster, ClusterOptions};
