//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOREFRONT_DB_PATH=/var/lib/storefront/store.db                    │
//! │     STOREFRONT_UTC_OFFSET_MINUTES=-300                                 │
//! │     STOREFRONT_REPORT_TIMEOUT_MS=5000                                  │
//! │     STOREFRONT_MAX_REPORT_DAYS=365                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/storefront/engine.toml (Linux)                           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "./storefront.db"
//! max_connections = 5
//!
//! [reporting]
//! utc_offset_minutes = -300   # calendar days are counted at UTC-05:00
//! default_days = 30
//! max_days = 365
//! recent_orders_limit = 10
//! top_products_limit = 10
//! timeout_ms = 5000
//!
//! [events]
//! channel_capacity = 1024
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use storefront_core::{
    ReportingZone, DEFAULT_RECENT_ORDERS, DEFAULT_REPORT_DAYS, DEFAULT_TOP_PRODUCTS,
    MAX_REPORT_DAYS,
};
use storefront_db::DbConfig;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Where the database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./storefront.db")
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

// =============================================================================
// Reporting Settings
// =============================================================================

/// Analytics report behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingSettings {
    /// Offset east of UTC, in minutes, that defines calendar days.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// `days` used when the caller passes none.
    #[serde(default = "default_days")]
    pub default_days: u32,

    /// Largest accepted `days`.
    #[serde(default = "default_max_days")]
    pub max_days: u32,

    #[serde(default = "default_recent_orders")]
    pub recent_orders_limit: u32,

    #[serde(default = "default_top_products")]
    pub top_products_limit: u32,

    /// Deadline for building one report.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_days() -> u32 {
    DEFAULT_REPORT_DAYS
}

fn default_max_days() -> u32 {
    MAX_REPORT_DAYS
}

fn default_recent_orders() -> u32 {
    DEFAULT_RECENT_ORDERS as u32
}

fn default_top_products() -> u32 {
    DEFAULT_TOP_PRODUCTS as u32
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for ReportingSettings {
    fn default() -> Self {
        ReportingSettings {
            utc_offset_minutes: 0,
            default_days: default_days(),
            max_days: default_max_days(),
            recent_orders_limit: default_recent_orders(),
            top_products_limit: default_top_products(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

// =============================================================================
// Event Settings
// =============================================================================

/// Event writer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    /// Events buffered between recorders and the writer. When full, new
    /// events are dropped with a warning instead of blocking the caller.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            channel_capacity: default_channel_capacity(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub reporting: ReportingSettings,

    #[serde(default)]
    pub events: EventSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// An in-memory database with default reporting settings (for tests).
    pub fn in_memory() -> Self {
        EngineConfig {
            database: DatabaseSettings {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            ..Self::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.database.max_connections == 0 {
            return Err(EngineError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        self.reporting_zone()?;

        let reporting = &self.reporting;
        if reporting.max_days == 0 || reporting.max_days > MAX_REPORT_DAYS {
            return Err(EngineError::Config(format!(
                "reporting.max_days must be between 1 and {}",
                MAX_REPORT_DAYS
            )));
        }
        if reporting.default_days == 0 || reporting.default_days > reporting.max_days {
            return Err(EngineError::Config(
                "reporting.default_days must be between 1 and reporting.max_days".into(),
            ));
        }
        if reporting.top_products_limit == 0 || reporting.recent_orders_limit == 0 {
            return Err(EngineError::Config(
                "reporting limits must be greater than 0".into(),
            ));
        }
        if reporting.timeout_ms == 0 {
            return Err(EngineError::Config(
                "reporting.timeout_ms must be greater than 0".into(),
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(EngineError::Config(
                "events.channel_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides. Unparseable values are
    /// ignored with a warning.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STOREFRONT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(raw) = std::env::var("STOREFRONT_UTC_OFFSET_MINUTES") {
            match raw.parse::<i32>() {
                Ok(minutes) => self.reporting.utc_offset_minutes = minutes,
                Err(_) => warn!(value = %raw, "Ignoring invalid STOREFRONT_UTC_OFFSET_MINUTES"),
            }
        }

        if let Ok(raw) = std::env::var("STOREFRONT_REPORT_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => self.reporting.timeout_ms = ms,
                Err(_) => warn!(value = %raw, "Ignoring invalid STOREFRONT_REPORT_TIMEOUT_MS"),
            }
        }

        if let Ok(raw) = std::env::var("STOREFRONT_MAX_REPORT_DAYS") {
            match raw.parse::<u32>() {
                Ok(days) => self.reporting.max_days = days,
                Err(_) => warn!(value = %raw, "Ignoring invalid STOREFRONT_MAX_REPORT_DAYS"),
            }
        }
    }

    /// `engine.toml` in the platform config directory.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "storefront", "storefront")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool settings for [`storefront_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let base = if self.database.path == PathBuf::from(":memory:") {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path)
        };
        base.max_connections(self.database.max_connections)
    }

    /// The zone calendar days are counted in.
    pub fn reporting_zone(&self) -> EngineResult<ReportingZone> {
        ReportingZone::from_offset_minutes(self.reporting.utc_offset_minutes)
            .map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.reporting.timeout_ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
