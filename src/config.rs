//! Configuration loading.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. An explicit path (e.g. `--config <path>`)
//! 2. `~/.mizan/config.toml` (user)
//! 3. `/etc/mizan/config.toml` (system)
//!
//! Every field has a default, so an empty file (or no file at all, via
//! [`Config::load_or_default`]) is a valid configuration.
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.mizan/secrets.toml` (user, must be 0600)
//! 2. `/etc/mizan/secrets.toml` (system, must be 0600)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheConfig, PriceCacheConfig};
use crate::history::HistoryConfig;
use crate::scheduler::SchedulerConfig;
use crate::{MizanError, Result};

/// Environment variable consulted when no secrets file provides a key.
pub const API_KEY_ENV: &str = "MIZAN_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub pricing: PricingSection,
    #[serde(default)]
    pub history: HistorySection,
    #[serde(default)]
    pub service: Option<ServiceSection>,
    #[serde(default)]
    pub storage: StorageSection,
}

/// Result cache used by the scheduler.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    #[serde(default = "default_sweep_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            default_ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_secs(),
        }
    }
}

fn default_cache_entries() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_sweep_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_priority")]
    pub default_priority: i32,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            cache_ttl_secs: default_ttl_secs(),
            default_priority: default_priority(),
        }
    }
}

fn default_max_concurrent() -> usize {
    3
}

fn default_priority() -> i32 {
    1
}

/// Price memo cache.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingSection {
    #[serde(default = "default_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_price_entries")]
    pub max_entries: u64,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_ttl_secs(),
            max_entries: default_price_entries(),
        }
    }
}

fn default_price_entries() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistorySection {
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,
    #[serde(default = "default_recent_queries")]
    pub recent_queries: usize,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            snapshot_limit: default_snapshot_limit(),
            recent_queries: default_recent_queries(),
        }
    }
}

fn default_search_limit() -> usize {
    100
}

fn default_snapshot_limit() -> usize {
    10
}

fn default_recent_queries() -> usize {
    10
}

/// Remote estimation service. Absent means no service is configured.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    pub base_url: String,
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

fn default_service_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    /// Directory for persisted snapshots. In-memory only when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Fails when no file is found; see [`Config::load_or_default`].
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?.ok_or_else(|| {
            MizanError::Configuration(
                "No config file found. Create ~/.mizan/config.toml or /etc/mizan/config.toml"
                    .to_string(),
            )
        })?;
        Self::load_from_file(&path)
    }

    /// Like [`Config::load`], but an absent file yields the defaults.
    ///
    /// An explicit path that does not exist is still an error.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MizanError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MizanError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MizanError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mizan").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/mizan/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.max_entries)
            .ttl(Duration::from_secs(self.cache.default_ttl_secs))
            .sweep_interval(Duration::from_secs(self.cache.sweep_interval_secs))
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new()
            .max_concurrent(self.scheduler.max_concurrent)
            .cache_ttl(Duration::from_secs(self.scheduler.cache_ttl_secs))
            .default_priority(self.scheduler.default_priority)
    }

    pub fn price_cache_config(&self) -> PriceCacheConfig {
        PriceCacheConfig::new()
            .max_entries(self.pricing.max_entries)
            .ttl(Duration::from_secs(self.pricing.cache_ttl_secs))
    }

    pub fn history_config(&self) -> HistoryConfig {
        HistoryConfig::new()
            .search_limit(self.history.search_limit)
            .snapshot_limit(self.history.snapshot_limit)
            .recent_queries(self.history.recent_queries)
    }
}

/// Secrets (the estimation service API key).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub service: Option<ApiKeySecret>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists ([`API_KEY_ENV`] may still
    /// provide a key).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".mizan").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/mizan/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load a specific secrets file. Permissions are checked first.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            MizanError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MizanError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            MizanError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(MizanError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// The service API key, falling back to [`API_KEY_ENV`].
    pub fn api_key(&self) -> Option<String> {
        self.service
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
    }
}
