//! Configuration management for orrery
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on `sync.cme_lookback_days` (a century)
pub const MAX_LOOKBACK_DAYS: i64 = 36_525;

/// Upper bound on `sync.announce_interval_hours` (a year)
pub const MAX_ANNOUNCE_INTERVAL_HOURS: u64 = 24 * 366;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// External data providers
    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    /// Read view cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub bluesky: BlueskyConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the JSON API listens on
    #[serde(default = "default_bind_addr")]
    pub bind: String,
}

/// SQLite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Attempts made when the database reports a transient fault
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed wait between those attempts
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// Provider base URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_nasa_api_url")]
    pub nasa_api_url: String,

    /// Environment variable name for the NASA API key
    #[serde(default = "default_nasa_api_key_env")]
    pub nasa_api_key_env: String,

    #[serde(default = "default_nasa_images_url")]
    pub nasa_images_url: String,

    #[serde(default = "default_met_api_url")]
    pub met_api_url: String,

    #[serde(default = "default_exoplanet_archive_url")]
    pub exoplanet_archive_url: String,
}

/// Sync controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_cme_lookback_days")]
    pub cme_lookback_days: i64,

    /// YYYY-MM-DD
    #[serde(default = "default_cme_backfill_start")]
    pub cme_backfill_start: String,

    #[serde(default = "default_announce_interval_hours")]
    pub announce_interval_hours: u64,
}

/// TTLs in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_posts_ttl")]
    pub posts_ttl_secs: u64,

    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,

    #[serde(default = "default_random_ttl")]
    pub random_ttl_secs: u64,

    #[serde(default = "default_astro_ttl")]
    pub astro_ttl_secs: u64,

    /// Live entries kept before the oldest is evicted
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

/// Bluesky announcer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "default_bluesky_service")]
    pub service_url: String,

    #[serde(default = "default_bluesky_account_env")]
    pub account_env: String,

    #[serde(default = "default_bluesky_key_env")]
    pub key_env: String,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for orrery data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_addr(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            nasa_api_url: default_nasa_api_url(),
            nasa_api_key_env: default_nasa_api_key_env(),
            nasa_images_url: default_nasa_images_url(),
            met_api_url: default_met_api_url(),
            exoplanet_archive_url: default_exoplanet_archive_url(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cme_lookback_days: default_cme_lookback_days(),
            cme_backfill_start: default_cme_backfill_start(),
            announce_interval_hours: default_announce_interval_hours(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            posts_ttl_secs: default_posts_ttl(),
            search_ttl_secs: default_search_ttl(),
            random_ttl_secs: default_random_ttl(),
            astro_ttl_secs: default_astro_ttl(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service_url: default_bluesky_service(),
            account_env: default_bluesky_account_env(),
            key_env: default_bluesky_key_env(),
        }
    }
}

impl ProvidersConfig {
    /// NASA API key from the environment, `DEMO_KEY` when unset
    pub fn nasa_api_key(&self) -> String {
        std::env::var(&self.nasa_api_key_env).unwrap_or_else(|_| "DEMO_KEY".to_string())
    }
}

impl SyncConfig {
    pub fn cme_backfill_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&self.cme_backfill_start, "%Y-%m-%d").map_err(|e| {
            Error::Config(format!(
                "sync.cme_backfill_start '{}' is not YYYY-MM-DD: {}",
                self.cme_backfill_start, e
            ))
        })
    }

    pub fn announce_interval(&self) -> Duration {
        Duration::from_secs(self.announce_interval_hours.saturating_mul(60 * 60))
    }
}

impl BlueskyConfig {
    /// Handle and app password, if both are present in the environment
    pub fn credentials(&self) -> Option<(String, String)> {
        let account = std::env::var(&self.account_env).ok()?;
        let key = std::env::var(&self.key_env).ok()?;
        Some((account, key))
    }
}

impl Config {
    /// Get the default base directory for orrery (~/.orrery)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".orrery")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("orrery.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Set up paths based on config file location
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("orrery.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.retry_attempts == 0 {
            return Err(Error::Config(
                "database.retry_attempts must be at least 1".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        if self.sync.cme_lookback_days <= 0 || self.sync.cme_lookback_days > MAX_LOOKBACK_DAYS {
            return Err(Error::Config(format!(
                "sync.cme_lookback_days must be between 1 and {}",
                MAX_LOOKBACK_DAYS
            )));
        }

        if self.sync.announce_interval_hours == 0
            || self.sync.announce_interval_hours > MAX_ANNOUNCE_INTERVAL_HOURS
        {
            return Err(Error::Config(format!(
                "sync.announce_interval_hours must be between 1 and {}",
                MAX_ANNOUNCE_INTERVAL_HOURS
            )));
        }

        self.sync.cme_backfill_date()?;

        let ttls = [
            ("cache.posts_ttl_secs", self.cache.posts_ttl_secs),
            ("cache.search_ttl_secs", self.cache.search_ttl_secs),
            ("cache.random_ttl_secs", self.cache.random_ttl_secs),
            ("cache.astro_ttl_secs", self.cache.astro_ttl_secs),
        ];
        for (name, ttl) in ttls {
            if ttl == 0 {
                return Err(Error::Config(format!("{} must be positive", name)));
            }
        }

        if self.cache.max_entries == 0 {
            return Err(Error::Config(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
