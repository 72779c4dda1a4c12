//! # Sync Configuration
//!
//! Configuration management for the EasyCars sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     EASYCARS_ENCRYPTION_KEY=<base64 32 bytes>                          │
//! │     EASYCARS_RETRY_ATTEMPTS=5                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $DEALERHUB_CONFIG, or                                              │
//! │     ~/.config/dealerhub/sync.toml (Linux)                              │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     30s timeout, 3 attempts, 1000ms linear delay, hourly passes        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [easycars]
//! test_url = "https://test.easycars.example"
//! production_url = "https://api.easycars.example"
//! timeout_secs = 30
//! retry_attempts = 3
//! retry_delay_ms = 1000
//! token_cache_secs = 3600
//!
//! [sync]
//! interval_secs = 3600
//! max_concurrent_dealerships = 1
//! remote_only_policy = "import"      # import | ignore
//! conflict_strategy = "manual_review" # local_wins | remote_wins | manual_review
//!
//! [security]
//! encryption_key = "base64..."        # prefer EASYCARS_ENCRYPTION_KEY
//!
//! [database]
//! path = "/var/lib/dealerhub/dealerhub.db"
//! max_connections = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineResult, SyncError};
use dealerhub_core::{ConflictResolutionStrategy, Environment, RemoteOnlyPolicy};

// =============================================================================
// EasyCars API Settings
// =============================================================================

/// Connection settings for the EasyCars API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EasyCarsSettings {
    /// Base URL of the test environment.
    #[serde(default = "default_test_url")]
    pub test_url: String,

    /// Base URL of the production environment.
    #[serde(default = "default_production_url")]
    pub production_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total attempts per call, the first one included.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base delay between attempts (milliseconds). Attempt n waits n × delay.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Token lifetime to assume when the provider doesn't state one (seconds).
    #[serde(default = "default_token_cache")]
    pub token_cache_secs: u64,
}

fn default_test_url() -> String {
    "https://testapi.easycars.com.au".to_string()
}
fn default_production_url() -> String {
    "https://api.easycars.com.au".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_token_cache() -> u64 {
    3600
}

impl Default for EasyCarsSettings {
    fn default() -> Self {
        EasyCarsSettings {
            test_url: default_test_url(),
            production_url: default_production_url(),
            timeout_secs: default_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay(),
            token_cache_secs: default_token_cache(),
        }
    }
}

impl EasyCarsSettings {
    /// Base URL for an environment, without a trailing slash.
    pub fn base_url(&self, environment: Environment) -> &str {
        let url = match environment {
            Environment::Test => &self.test_url,
            Environment::Production => &self.production_url,
        };
        url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_cache_secs)
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Scheduler and engine behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Interval between scheduler passes (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Dealerships synced at the same time within one pass.
    /// 1 means strictly sequential.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_dealerships: usize,

    /// What to do with remote stock that has no local vehicle.
    #[serde(default)]
    pub remote_only_policy: RemoteOnlyPolicy,

    /// How diverging lead statuses are settled.
    #[serde(default)]
    pub conflict_strategy: ConflictResolutionStrategy,
}

fn default_interval() -> u64 {
    3600
}
fn default_max_concurrent() -> usize {
    1
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            interval_secs: default_interval(),
            max_concurrent_dealerships: default_max_concurrent(),
            remote_only_policy: RemoteOnlyPolicy::default(),
            conflict_strategy: ConflictResolutionStrategy::default(),
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// =============================================================================
// Security Settings
// =============================================================================

/// Encryption key material.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Base64-encoded 32-byte AES key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

impl std::fmt::Debug for SecuritySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecuritySettings")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "dealerhub", "dealerhub")
        .map(|dirs| dirs.data_dir().join("dealerhub.db"))
        .unwrap_or_else(|| PathBuf::from("dealerhub.db"))
}
fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete worker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub easycars: EasyCarsSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub security: SecuritySettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl SyncConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`DEALERHUB_CONFIG`, the argument, or the default path)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        let path = std::env::var("DEALERHUB_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or(config_path)
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// The encryption key is checked separately when the vault is built.
    pub fn validate(&self) -> EngineResult<()> {
        for (name, url) in [
            ("test_url", &self.easycars.test_url),
            ("production_url", &self.easycars.production_url),
        ] {
            if url.trim().is_empty() {
                return Err(SyncError::InvalidConfig(format!("easycars.{name} is empty")));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SyncError::InvalidConfig(format!(
                    "easycars.{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if self.easycars.retry_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "retry_attempts must be greater than 0".into(),
            ));
        }

        if self.easycars.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.max_concurrent_dealerships == 0 {
            return Err(SyncError::InvalidConfig(
                "max_concurrent_dealerships must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("EASYCARS_TEST_URL") {
            debug!(url = %url, "Overriding EasyCars test URL from environment");
            self.easycars.test_url = url;
        }

        if let Ok(url) = std::env::var("EASYCARS_PRODUCTION_URL") {
            debug!(url = %url, "Overriding EasyCars production URL from environment");
            self.easycars.production_url = url;
        }

        override_parsed("EASYCARS_TIMEOUT_SECS", &mut self.easycars.timeout_secs);
        override_parsed("EASYCARS_RETRY_ATTEMPTS", &mut self.easycars.retry_attempts);
        override_parsed("EASYCARS_RETRY_DELAY_MS", &mut self.easycars.retry_delay_ms);
        override_parsed("EASYCARS_TOKEN_CACHE_SECS", &mut self.easycars.token_cache_secs);
        override_parsed("DEALERHUB_SYNC_INTERVAL_SECS", &mut self.sync.interval_secs);

        if let Ok(key) = std::env::var("EASYCARS_ENCRYPTION_KEY") {
            if !key.trim().is_empty() {
                self.security.encryption_key = Some(key);
            }
        }

        if let Ok(path) = std::env::var("DEALERHUB_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "dealerhub", "dealerhub")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }
}

fn override_parsed<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!(var, value = %raw, "Ignoring unparsable environment override"),
        }
    }
}
