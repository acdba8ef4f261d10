//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::storage::Compression;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database file configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Primary database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Appended to `db_path` to name the backup file
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,

    /// Compression for newly written snapshots
    #[serde(default)]
    pub compression: Compression,

    /// Upper bound for one save/load/backup/restore in the shared handle (0 = none)
    #[serde(default = "default_persist_timeout")]
    pub persist_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("orderdb").join("orders.db"))
        .unwrap_or_else(|| PathBuf::from("./orderdb_data/orders.db"))
}

fn default_backup_suffix() -> String {
    crate::storage::DEFAULT_BACKUP_SUFFIX.to_string()
}

fn default_persist_timeout() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            backup_suffix: default_backup_suffix(),
            compression: Compression::default(),
            persist_timeout_secs: default_persist_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        Self::load_first(&Self::default_locations())
    }

    /// Default config file locations, in search order
    pub fn default_locations() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("orderdb").join("config.toml")),
            Some(PathBuf::from("/etc/orderdb/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load the first existing file in `paths` that parses, else env-only config
    pub fn load_first(paths: &[PathBuf]) -> Self {
        for path in paths {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(path) = var("ORDERDB_DB_PATH") {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Some(suffix) = var("ORDERDB_BACKUP_SUFFIX") {
            self.storage.backup_suffix = suffix;
        }
        if let Some(compression) = var("ORDERDB_COMPRESSION") {
            match compression.parse() {
                Ok(c) => self.storage.compression = c,
                Err(e) => tracing::warn!("Ignoring ORDERDB_COMPRESSION: {}", e),
            }
        }

        // Logging overrides
        if let Some(level) = var("ORDERDB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("ORDERDB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# orderdb Configuration
#
# Environment variables override these settings:
# - ORDERDB_DB_PATH
# - ORDERDB_BACKUP_SUFFIX
# - ORDERDB_COMPRESSION
# - ORDERDB_LOG_LEVEL
# - ORDERDB_LOG_FORMAT

[storage]
# Primary database file
db_path = "~/.local/share/orderdb/orders.db"

# The backup file is db_path with this suffix appended
backup_suffix = ".bak"

# Snapshot compression: lz4 or none
compression = "lz4"

# Upper bound for one save/load/backup/restore, in seconds (0 = none)
persist_timeout_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/orderdb/orderdb.log"
"#
    .to_string()
}
