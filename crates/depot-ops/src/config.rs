//! # Engine Configuration
//!
//! Process-level settings. Business settings (approval flags, store name)
//! live in the document store, not here.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     DEPOT_DB_PATH=/data/depot.db                                        │
//! │     DEPOT_SNAPSHOT_INTERVAL_MINUTES=30                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/depot-ledger/depot.toml (Linux)                           │
//! │     ~/Library/Application Support/com.depot.ledger/depot.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/depot/depot.db"
//! max_connections = 5
//!
//! [snapshots]
//! enabled = true
//! interval_minutes = 60
//! retain = 5
//!
//! [credit]
//! default_max_debt_limit_cents = 2000000
//!
//! [logging]
//! filter = "info,depot=debug,sqlx=warn"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use depot_core::{Money, DEFAULT_MAX_DEBT_LIMIT};
use depot_db::{DbConfig, DEFAULT_SNAPSHOT_RETAIN};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{OpsError, OpsResult};
use crate::telemetry::DEFAULT_LOG_FILTER;

const CONFIG_FILE: &str = "depot.toml";
const DATABASE_FILE: &str = "depot.db";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// How many internal snapshots to keep.
    #[serde(default = "default_retain")]
    pub retain: usize,
}

fn default_true() -> bool {
    true
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_retain() -> usize {
    DEFAULT_SNAPSHOT_RETAIN
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        SnapshotSettings {
            enabled: true,
            interval_minutes: default_interval_minutes(),
            retain: default_retain(),
        }
    }
}

impl SnapshotSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSettings {
    /// Limit for stores without one of their own.
    #[serde(default = "default_limit_cents")]
    pub default_max_debt_limit_cents: i64,
}

fn default_limit_cents() -> i64 {
    DEFAULT_MAX_DEBT_LIMIT.cents()
}

impl Default for CreditSettings {
    fn default() -> Self {
        CreditSettings {
            default_max_debt_limit_cents: default_limit_cents(),
        }
    }
}

impl CreditSettings {
    pub fn default_max_debt_limit(&self) -> Money {
        Money::from_cents(self.default_max_debt_limit_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directives. `RUST_LOG` still wins when set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_filter(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub snapshots: SnapshotSettings,

    #[serde(default)]
    pub credit: CreditSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads defaults, then the config file, then environment overrides,
    /// and validates the result.
    pub fn load(config_path: Option<PathBuf>) -> OpsResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> OpsResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| OpsError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, toml::to_string_pretty(self)?)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> OpsResult<()> {
        if self.database.max_connections == 0 {
            return Err(OpsError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.snapshots.enabled && self.snapshots.interval_minutes == 0 {
            return Err(OpsError::Config(
                "snapshots.interval_minutes must be greater than 0".into(),
            ));
        }

        if self.snapshots.retain == 0 {
            return Err(OpsError::Config("snapshots.retain must be at least 1".into()));
        }

        if self.credit.default_max_debt_limit_cents <= 0 {
            return Err(OpsError::Config(
                "credit.default_max_debt_limit_cents must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Applies `DEPOT_*` overrides read through `var`.
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("DEPOT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(raw) = var("DEPOT_SNAPSHOTS") {
            match raw.to_lowercase().as_str() {
                "1" | "true" | "on" => self.snapshots.enabled = true,
                "0" | "false" | "off" => self.snapshots.enabled = false,
                _ => warn!(value = %raw, "Unknown DEPOT_SNAPSHOTS value"),
            }
        }

        if let Some(raw) = var("DEPOT_SNAPSHOT_INTERVAL_MINUTES") {
            match raw.parse() {
                Ok(minutes) => self.snapshots.interval_minutes = minutes,
                Err(_) => warn!(value = %raw, "Ignoring invalid DEPOT_SNAPSHOT_INTERVAL_MINUTES"),
            }
        }

        if let Some(raw) = var("DEPOT_SNAPSHOT_RETAIN") {
            match raw.parse() {
                Ok(retain) => self.snapshots.retain = retain,
                Err(_) => warn!(value = %raw, "Ignoring invalid DEPOT_SNAPSHOT_RETAIN"),
            }
        }

        if let Some(raw) = var("DEPOT_MAX_DEBT_LIMIT_CENTS") {
            match raw.parse() {
                Ok(cents) => self.credit.default_max_debt_limit_cents = cents,
                Err(_) => warn!(value = %raw, "Ignoring invalid DEPOT_MAX_DEBT_LIMIT_CENTS"),
            }
        }

        if let Some(filter) = var("DEPOT_LOG") {
            self.logging.filter = filter;
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "depot", "ledger")
    }

    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Configured path, else the platform data directory, else the
    /// working directory.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join(DATABASE_FILE)))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path()).max_connections(self.database.max_connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.snapshots.retain, 5);
        assert_eq!(config.credit.default_max_debt_limit(), DEFAULT_MAX_DEBT_LIMIT);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            [snapshots]
            interval_minutes = 15

            [credit]
            default_max_debt_limit_cents = 500000
            "#,
        )
        .unwrap();

        assert_eq!(config.snapshots.interval(), Duration::from_secs(900));
        assert_eq!(config.snapshots.retain, 5);
        assert_eq!(config.credit.default_max_debt_limit_cents, 500_000);
        assert_eq!(config.database, DatabaseSettings::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DEPOT_DB_PATH", "/tmp/depot-test.db"),
            ("DEPOT_SNAPSHOTS", "off"),
            ("DEPOT_SNAPSHOT_RETAIN", "3"),
            ("DEPOT_MAX_DEBT_LIMIT_CENTS", "not-a-number"),
        ]);

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path(), PathBuf::from("/tmp/depot-test.db"));
        assert!(!config.snapshots.enabled);
        assert_eq!(config.snapshots.retain, 3);
        assert_eq!(config.credit.default_max_debt_limit_cents, default_limit_cents());
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.snapshots.retain = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.credit.default_max_debt_limit_cents = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.snapshots.enabled = false;
        config.snapshots.interval_minutes = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[snapshots]"));
        assert!(toml_str.contains("[credit]"));
    }
}
