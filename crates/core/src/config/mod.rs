//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod rules;
mod validation;

pub use rules::{Environment, RuleConfig, Strategy};
pub use validation::ConfigError;

/// Expiration window used in development mode.
pub const DEVELOPMENT_EXPIRATION: Duration = Duration::from_secs(60);

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version string. Changing it retires every cache of older versions.
    ///
    /// Set via SWCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Site name used as the cache namespace prefix.
    ///
    /// Set via SWCACHE_SITE_NAME environment variable.
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Origin the worker is scoped to. Relative URLs resolve against it and
    /// responses from any other origin are cross-origin.
    ///
    /// Set via SWCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Production or development mode.
    ///
    /// Set via SWCACHE_ENVIRONMENT environment variable.
    #[serde(default)]
    pub environment: Environment,

    /// Cache entry lifetime in production, in milliseconds.
    ///
    /// Set via SWCACHE_CACHE_EXPIRATION_MS environment variable.
    #[serde(default = "default_cache_expiration_ms")]
    pub cache_expiration_ms: u64,

    /// Verbose logging when RUST_LOG is not set.
    ///
    /// Set via SWCACHE_DEBUG environment variable.
    #[serde(default)]
    pub debug: bool,

    /// Whether the expiry scheduler runs at all.
    ///
    /// Set via SWCACHE_CLEANUP_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub cleanup_enabled: bool,

    /// Minimum time between two cleanup runs, in milliseconds.
    ///
    /// Set via SWCACHE_CLEANUP_INTERVAL_MS environment variable.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Minimum time after install before the first cleanup, in milliseconds.
    ///
    /// Set via SWCACHE_CLEANUP_GRACE_MS environment variable.
    #[serde(default = "default_cleanup_grace_ms")]
    pub cleanup_grace_ms: u64,

    /// Delay between scheduling a cleanup and running it, in milliseconds.
    ///
    /// Set via SWCACHE_CLEANUP_DELAY_MS environment variable.
    #[serde(default = "default_cleanup_delay_ms")]
    pub cleanup_delay_ms: u64,

    /// How long a control-channel caller waits for a reply, in milliseconds.
    ///
    /// Set via SWCACHE_CONTROL_TIMEOUT_MS environment variable.
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,

    /// Ordered rule list. The last rule must match every path.
    #[serde(default = "rules::default_rules")]
    pub rules: Vec<RuleConfig>,

    /// Glob patterns for paths that are never cached.
    ///
    /// Set via SWCACHE_EXCLUSIONS environment variable.
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// URLs primed into the cache at install.
    ///
    /// Set via SWCACHE_PRELOAD_URLS environment variable.
    #[serde(default = "default_preload_urls")]
    pub preload_urls: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via SWCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    ///
    /// Set via SWCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirects followed per request.
    ///
    /// Set via SWCACHE_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_version() -> String {
    "1.0.0".into()
}

fn default_site_name() -> String {
    "site-name".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_expiration_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_true() -> bool {
    true
}

fn default_cleanup_interval_ms() -> u64 {
    8 * 60 * 60 * 1000
}

fn default_cleanup_grace_ms() -> u64 {
    10 * 60 * 1000
}

fn default_cleanup_delay_ms() -> u64 {
    5_000
}

fn default_control_timeout_ms() -> u64 {
    3_000
}

fn default_exclusions() -> Vec<String> {
    vec!["/admin*".into(), "/login*".into(), "/logout*".into(), "/auth/*".into()]
}

fn default_preload_urls() -> Vec<String> {
    vec!["/".into(), "/favicon.ico".into()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            site_name: default_site_name(),
            origin: default_origin(),
            environment: Environment::default(),
            cache_expiration_ms: default_cache_expiration_ms(),
            debug: false,
            cleanup_enabled: true,
            cleanup_interval_ms: default_cleanup_interval_ms(),
            cleanup_grace_ms: default_cleanup_grace_ms(),
            cleanup_delay_ms: default_cleanup_delay_ms(),
            control_timeout_ms: default_control_timeout_ms(),
            rules: rules::default_rules(),
            exclusions: default_exclusions(),
            preload_urls: default_preload_urls(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Name of the current cache namespace: `<site>-v<version>`.
    pub fn cache_name(&self) -> String {
        format!("{}-v{}", self.site_name, self.version)
    }

    /// Age after which a cached entry is stale.
    pub fn expiration(&self) -> Duration {
        match self.environment {
            Environment::Production => Duration::from_millis(self.cache_expiration_ms),
            Environment::Development => DEVELOPMENT_EXPIRATION,
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured origin as a parsed URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Strategy a rule resolves to under the current environment.
    pub fn rule_strategy(&self, rule: &RuleConfig) -> Strategy {
        rule.strategy.unwrap_or_else(|| self.environment.default_strategy())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
