//! Environment configuration for the gateway

use crate::error::ConfigError;
use command_log::LogConfig;
use read_store::StoreConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    /// Where reads are forwarded.
    pub processor_base_url: String,
    pub log_dir: PathBuf,
    pub partitions: u32,
    /// Journal file size before rotation.
    pub max_file_bytes: u64,
    pub store_path: PathBuf,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let partitions: u32 = parse_var(&lookup, "COMMAND_LOG_PARTITIONS", 4)?;
        if partitions == 0 {
            return Err(ConfigError {
                var: "COMMAND_LOG_PARTITIONS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            addr: parse_var(&lookup, "GATEWAY_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            processor_base_url: lookup("PROCESSOR_BASE_URL")
                .unwrap_or_else(|| "http://127.0.0.1:3000".to_string()),
            log_dir: lookup("COMMAND_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/command-log")),
            partitions,
            max_file_bytes: parse_var(&lookup, "COMMAND_LOG_MAX_FILE_BYTES", 64 * 1024 * 1024)?,
            store_path: lookup("READ_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/read-store.db")),
        })
    }

    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::new(&self.log_dir, self.partitions);
        config.max_file_size = self.max_file_bytes;
        config
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.store_path)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(var) else {
        return Ok(default);
    };
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.processor_base_url, "http://127.0.0.1:3000");
        assert_eq!(config.log_config().max_file_size, 67_108_864);
        assert_eq!(config.log_config().partitions, 4);
    }

    #[test]
    fn test_invalid_port() {
        let err = GatewayConfig::from_lookup(|var| (var == "GATEWAY_ADDR").then(|| "localhost".to_string()))
            .unwrap_err();
        assert_eq!(err.var, "GATEWAY_ADDR");
    }

    #[test]
    fn test_custom_log_size() {
        let config = GatewayConfig::from_lookup(|var| {
            (var == "COMMAND_LOG_MAX_FILE_BYTES").then(|| "1024".to_string())
        })
        .unwrap();
        assert_eq!(config.log_config().max_file_size, 1024);
    }
}
