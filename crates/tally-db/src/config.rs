//! # Configuration
//!
//! Settings for the database layer, the sale rules and logging.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_DB_PATH=/srv/tally/tally.db                                  │
//! │     TALLY_RETENTION_DAYS=60                                            │
//! │     TALLY_LOG=tally_db=debug                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally-pos/tally.toml (Linux)                             │
//! │     ~/Library/Application Support/com.tally.pos/tally.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/tally/tally.db"
//! max_connections = 5
//! connect_timeout_secs = 30
//!
//! [sales]
//! retention_days = 30
//! max_cart_lines = 100
//! max_item_quantity = 999
//!
//! [logging]
//! filter = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tally_core::{CartLimits, DEFAULT_RETENTION_DAYS, MAX_CART_LINES, MAX_ITEM_QUANTITY};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Where the database lives and how the pool is sized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite file. Created if missing.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "tally", "pos")
        .map(|dirs| dirs.data_dir().join("tally.db"))
        .unwrap_or_else(|| PathBuf::from("tally.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Sales Settings
// =============================================================================

/// Checkout limits and sale retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSettings {
    /// Sales older than this are removed by `SaleRepository::purge_expired`.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_max_cart_lines")]
    pub max_cart_lines: usize,

    #[serde(default = "default_max_item_quantity")]
    pub max_item_quantity: i64,
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_max_cart_lines() -> usize {
    MAX_CART_LINES
}

fn default_max_item_quantity() -> i64 {
    MAX_ITEM_QUANTITY
}

impl Default for SalesSettings {
    fn default() -> Self {
        SalesSettings {
            retention_days: default_retention_days(),
            max_cart_lines: default_max_cart_lines(),
            max_item_quantity: default_max_item_quantity(),
        }
    }
}

impl SalesSettings {
    /// Limits handed to `Cart::validate`.
    pub fn cart_limits(&self) -> CartLimits {
        CartLimits {
            max_lines: self.max_cart_lines,
            max_item_quantity: self.max_item_quantity,
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

/// `tracing-subscriber` filter used when `RUST_LOG` is not set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Tally configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sales: SalesSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl TallyConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (explicit path, else the platform default)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML file.
    pub fn from_file(path: &Path) -> DbResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parses TOML text. Missing sections and keys take their defaults.
    pub fn from_toml_str(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.sales.max_cart_lines == 0 {
            return Err(DbError::Config(
                "sales.max_cart_lines must be greater than 0".into(),
            ));
        }

        if self.sales.max_item_quantity <= 0 {
            return Err(DbError::Config(
                "sales.max_item_quantity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TALLY_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(days) = lookup("TALLY_RETENTION_DAYS") {
            match days.parse::<u32>() {
                Ok(d) => self.sales.retention_days = d,
                Err(_) => warn!(value = %days, "Ignoring invalid TALLY_RETENTION_DAYS"),
            }
        }

        if let Some(filter) = lookup("TALLY_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TallyConfig::default();
        assert_eq!(config.sales.retention_days, 30);
        assert_eq!(config.sales.max_cart_lines, 100);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TallyConfig::from_toml_str(
            r#"
            [database]
            path = "/tmp/shop.db"

            [sales]
            retention_days = 90
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.sales.retention_days, 90);
        assert_eq!(config.sales.max_item_quantity, 999);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            TallyConfig::from_toml_str("[sales]\nretention_days = \"soon\""),
            Err(DbError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TALLY_DB_PATH", "/data/tally.db"),
            ("TALLY_RETENTION_DAYS", "7"),
            ("TALLY_LOG", "tally_db=debug"),
        ]
        .into_iter()
        .collect();

        let mut config = TallyConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/tally.db"));
        assert_eq!(config.sales.retention_days, 7);
        assert_eq!(config.logging.filter, "tally_db=debug");
    }

    #[test]
    fn test_invalid_env_value_is_ignored() {
        let mut config = TallyConfig::default();
        config.apply_overrides(|key| (key == "TALLY_RETENTION_DAYS").then(|| "never".to_string()));
        assert_eq!(config.sales.retention_days, 30);
    }

    #[test]
    fn test_validation() {
        let mut config = TallyConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = TallyConfig::default();
        config.sales.max_item_quantity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cart_limits_from_settings() {
        let sales = SalesSettings {
            retention_days: 30,
            max_cart_lines: 5,
            max_item_quantity: 12,
        };
        let limits = sales.cart_limits();
        assert_eq!(limits.max_lines, 5);
        assert_eq!(limits.max_item_quantity, 12);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&TallyConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[sales]"));
        assert!(toml_str.contains("[logging]"));
    }
}
