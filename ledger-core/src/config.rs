//! Configuration for the ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// State store configuration
    pub storage: StorageConfig,

    /// Marketplace token configuration
    pub token: TokenConfig,

    /// Log output configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "datamarket-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            storage: StorageConfig::default(),
            token: TokenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// State store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-process map (lost on exit)
    Memory,
    /// RocksDB under `data_dir`
    RocksDb,
}

impl StorageBackend {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Some(StorageBackend::Memory),
            "rocksdb" | "rocks_db" => Some(StorageBackend::RocksDb),
            _ => None,
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection
    pub backend: StorageBackend,

    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// RocksDB tuning
    pub rocksdb: RocksDbConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("./data/ledger"),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

/// Marketplace token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Token ID
    pub id: String,

    /// Supply created at bootstrap
    pub total_supply: Decimal,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            id: "dmptoken".to_string(),
            total_supply: Decimal::from(1_000_000),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,

    /// Default filter when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from environment variables
    pub fn apply_env(&mut self) -> crate::Result<()> {
        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(backend) = std::env::var("LEDGER_STORAGE_BACKEND") {
            self.storage.backend = StorageBackend::from_str(&backend).ok_or_else(|| {
                crate::Error::Config(format!("Unknown storage backend: {}", backend))
            })?;
        }

        if let Ok(token_id) = std::env::var("LEDGER_TOKEN_ID") {
            self.token.id = token_id;
        }

        if let Ok(supply) = std::env::var("LEDGER_TOKEN_SUPPLY") {
            self.token.total_supply = supply.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LEDGER_TOKEN_SUPPLY {}: {}", supply, e))
            })?;
        }

        if let Ok(json) = std::env::var("LEDGER_LOG_JSON") {
            self.logging.json = matches!(json.as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "datamarket-ledger");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.token.id, "dmptoken");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [storage]
            backend = "rocks_db"
            data_dir = "/var/lib/ledger"

            [token]
            id = "credits"
            total_supply = "5000"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::RocksDb);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/ledger"));
        assert_eq!(config.token.id, "credits");
        assert_eq!(config.token.total_supply, Decimal::from(5000));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml("storage = 3");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!(StorageBackend::from_str("MEMORY"), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::from_str("rocksdb"), Some(StorageBackend::RocksDb));
        assert_eq!(StorageBackend::from_str("postgres"), None);
    }
}
