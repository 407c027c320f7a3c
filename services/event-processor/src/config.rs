//! Environment configuration
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file by the binary. Every variable has a default.

use crate::consumer::ConsumerSettings;
use crate::error::ConfigError;
use command_log::LogConfig;
use read_store::StoreConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Listen address of the query API.
    pub addr: SocketAddr,
    pub log_dir: PathBuf,
    pub partitions: u32,
    pub store_path: PathBuf,
    /// Idle wait between polls of a caught-up partition.
    pub poll_interval: Duration,
    /// Wait before retrying a record after a store error.
    pub retry_backoff: Duration,
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let partitions = parse_var(&lookup, "COMMAND_LOG_PARTITIONS", 4u32)?;
        if partitions == 0 {
            return Err(ConfigError::Invalid {
                var: "COMMAND_LOG_PARTITIONS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            addr: parse_var(&lookup, "PROCESSOR_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            log_dir: lookup("COMMAND_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/command-log")),
            partitions,
            store_path: lookup("READ_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/read-store.db")),
            poll_interval: Duration::from_millis(parse_var(&lookup, "POLL_INTERVAL_MS", 100u64)?),
            retry_backoff: Duration::from_millis(parse_var(&lookup, "RETRY_BACKOFF_MS", 500u64)?),
        })
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::new(&self.log_dir, self.partitions)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.store_path)
    }

    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            poll_interval: self.poll_interval,
            retry_backoff: self.retry_backoff,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
