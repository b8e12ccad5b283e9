//! Service configuration resolution
//!
//! Each setting is taken from the command line (or its environment
//! variable), then the TOML file, then the compiled default.

use catalog_common::config::{resolve_root_folder, TomlConfig};
use catalog_common::{Error, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::{DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_LOCK_WAIT_MS, DEFAULT_QUEUE_CAPACITY};

/// Default listen port
pub const DEFAULT_PORT: u16 = 5780;

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Values given on the command line or through their environment variables
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub root_folder: Option<String>,
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind: String,
    pub port: u16,
    pub queue_capacity: usize,
    pub event_capacity: usize,
    pub max_lock_wait_ms: u64,
}

impl ServiceConfig {
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Self {
        Self {
            root_folder: resolve_root_folder(cli.root_folder.as_deref(), toml_config),
            bind: cli
                .bind
                .clone()
                .or_else(|| toml_config.bind.clone())
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: cli.port.or(toml_config.port).unwrap_or(DEFAULT_PORT),
            queue_capacity: toml_config
                .queue_capacity
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            event_capacity: toml_config
                .event_capacity
                .unwrap_or(DEFAULT_EVENT_CAPACITY),
            max_lock_wait_ms: toml_config
                .max_lock_wait_ms
                .unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS),
        }
    }

    /// Address to listen on
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address {}: {}", self.bind, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_wins_over_toml() {
        let cli = CliOverrides {
            port: Some(6000),
            bind: None,
            root_folder: Some("/tmp/catalog-cli".to_string()),
        };
        let toml_config = TomlConfig {
            root_folder: Some("/tmp/catalog-toml".to_string()),
            bind: Some("0.0.0.0".to_string()),
            port: Some(7000),
            queue_capacity: Some(8),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(&cli, &toml_config);
        assert_eq!(config.port, 6000);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.root_folder, PathBuf::from("/tmp/catalog-cli"));
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.max_lock_wait_ms, DEFAULT_MAX_LOCK_WAIT_MS);
    }

    #[test]
    fn test_defaults() {
        let cli = CliOverrides {
            root_folder: Some("/tmp/catalog".to_string()),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(&cli, &TomlConfig::default());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:5780".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_bind_address() {
        let cli = CliOverrides {
            bind: Some("not-an-ip".to_string()),
            root_folder: Some("/tmp/catalog".to_string()),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(&cli, &TomlConfig::default());
        assert!(matches!(config.socket_addr(), Err(Error::Config(_))));
    }
}
