//! # Service Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAJA_PORT=9090                                                     │
//! │     CAJA_DB_PATH=/var/lib/caja/caja.db                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/caja-pos/service.toml (Linux)                            │
//! │     ~/Library/Application Support/pe.caja.caja-pos/service.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "caja.db"
//! max_connections = 5
//!
//! [queue]
//! enabled = false
//! poll_interval_secs = 15
//! batch_size = 20
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// SQLite settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("caja.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Submission queue processor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Run the processor. Ignored when no gateway is wired in.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Entries handled per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_poll_interval() -> u64 {
    15
}

fn default_batch_size() -> u32 {
    20
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            enabled: false,
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
        }
    }
}

// =============================================================================
// Service Configuration
// =============================================================================

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub queue: QueueSettings,
}

impl ServiceConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (explicit path, else the platform config dir)
    /// 3. `CAJA_*` environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading service config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.queue.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "queue.poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.queue.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "queue.batch_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Applies `CAJA_*` overrides read through `lookup`.
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("CAJA_HOST") {
            debug!(host = %host, "Overriding host from environment");
            self.server.host = host;
        }
        if let Some(port) = lookup("CAJA_PORT") {
            self.server.port = parse_var("CAJA_PORT", &port)?;
        }
        if let Some(path) = lookup("CAJA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(max) = lookup("CAJA_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("CAJA_DB_MAX_CONNECTIONS", &max)?;
        }
        if let Some(enabled) = lookup("CAJA_QUEUE_ENABLED") {
            self.queue.enabled = parse_var("CAJA_QUEUE_ENABLED", &enabled)?;
        }
        if let Some(secs) = lookup("CAJA_QUEUE_POLL_SECS") {
            self.queue.poll_interval_secs = parse_var("CAJA_QUEUE_POLL_SECS", &secs)?;
        }
        if let Some(size) = lookup("CAJA_QUEUE_BATCH_SIZE") {
            self.queue.batch_size = parse_var("CAJA_QUEUE_BATCH_SIZE", &size)?;
        }
        Ok(())
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("pe", "caja", "caja-pos")
            .map(|dirs| dirs.config_dir().join("service.toml"))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.database.path, PathBuf::from("caja.db"));
        assert!(!config.queue.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [queue]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.max_connections, 5);
        assert!(config.queue.enabled);
        assert_eq!(config.queue.batch_size, 20);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServiceConfig::default();
        config
            .apply_overrides(env(&[
                ("CAJA_HOST", "0.0.0.0"),
                ("CAJA_PORT", "9090"),
                ("CAJA_DB_PATH", "/tmp/caja.db"),
                ("CAJA_QUEUE_ENABLED", "true"),
            ]))
            .unwrap();

        assert_eq!(config.server.bind_address(), "0.0.0.0:9090");
        assert_eq!(config.database.path, PathBuf::from("/tmp/caja.db"));
        assert!(config.queue.enabled);
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_overrides(env(&[("CAJA_PORT", "ochenta")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CAJA_PORT"));
    }

    #[test]
    fn test_validation() {
        let mut config = ServiceConfig::default();
        config.queue.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("caja-service-{}.toml", std::process::id()));
        std::fs::write(&path, "[database]\npath = \"ventas.db\"\nmax_connections = 2\n").unwrap();

        let config = ServiceConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.database.path, PathBuf::from("ventas.db"));
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.server, ServerSettings::default());
    }

    #[test]
    fn test_unreadable_file() {
        let err = ServiceConfig::from_file(Path::new("/nonexistent/caja/service.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
