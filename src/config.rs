//! Configuration management for the hush daemon.
//!
//! Configuration can be set via environment variables:
//! - `HUSH_DB_PATH` - Optional. SQLite database path. Defaults to `./hush.db`.
//! - `HOST` - Optional. Server host. Defaults to `0.0.0.0`.
//! - `PORT` - Optional. Server port. Defaults to `8080`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read {0}: {1}")]
    Io(String, std::io::Error),

    #[error("Failed to parse {0}: {1}")]
    Parse(String, String),
}

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./hush.db"),
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `PORT` is not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = lookup("HUSH_DB_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let host = lookup("HOST")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = match lookup("PORT").filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?,
            None => defaults.port,
        };

        Ok(Self {
            db_path,
            host,
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("./hush.db"));
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn env_values_override_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("HUSH_DB_PATH", "/var/lib/hush/hush.db"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/hush/hush.db"));
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = ServerConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "PORT"));
    }
}
