//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use regex::Regex;
use thiserror::Error;

/// Paths the final rule must match to count as a catch-all.
const CATCH_ALL_PROBES: &[&str] = &["/", "/index.html", "/nested/path/file.ext"];

/// Upper bound for every cache and cleanup duration (ten years).
pub const MAX_DURATION_MS: u64 = 10 * 365 * 24 * 60 * 60 * 1000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` or `site_name` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - any duration is zero, a cache or cleanup duration exceeds ten years,
    ///   or `timeout_ms` is outside 100ms..=5min
    /// - `rules` is empty, a rule does not compile, or the last rule is not a catch-all
    /// - an exclusion is empty or a preload URL does not resolve against the origin
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(invalid("version", "must not be empty"));
        }
        if self.site_name.trim().is_empty() {
            return Err(invalid("site_name", "must not be empty"));
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }

        if self.cache_expiration_ms == 0 {
            return Err(invalid("cache_expiration_ms", "must be greater than 0"));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(invalid("cleanup_interval_ms", "must be greater than 0"));
        }
        if self.control_timeout_ms == 0 {
            return Err(invalid("control_timeout_ms", "must be greater than 0"));
        }
        for (field, value) in [
            ("cache_expiration_ms", self.cache_expiration_ms),
            ("cleanup_interval_ms", self.cleanup_interval_ms),
            ("cleanup_grace_ms", self.cleanup_grace_ms),
            ("cleanup_delay_ms", self.cleanup_delay_ms),
        ] {
            if value > MAX_DURATION_MS {
                return Err(invalid(field, format!("must not exceed {MAX_DURATION_MS}ms")));
            }
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        self.validate_rules()?;

        if self.exclusions.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid("exclusions", "patterns must not be empty"));
        }

        for preload in &self.preload_urls {
            origin
                .join(preload)
                .map_err(|e| invalid("preload_urls", format!("{preload}: {e}")))?;
        }

        if !self.cleanup_enabled {
            tracing::debug!("cache cleanup disabled; expired entries are only replaced, never evicted");
        }

        Ok(())
    }

    fn validate_rules(&self) -> Result<(), ConfigError> {
        let mut compiled = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let regex =
                Regex::new(&rule.pattern).map_err(|e| invalid("rules", format!("{}: {e}", rule.pattern)))?;
            compiled.push(regex);
        }

        let Some(last) = compiled.last() else {
            return Err(invalid("rules", "at least one rule is required"));
        };

        if let Some(probe) = CATCH_ALL_PROBES.iter().find(|probe| !last.is_match(probe)) {
            return Err(invalid(
                "rules",
                format!("last rule `{}` must match every path (fails on {probe})", last.as_str()),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleConfig, Strategy};

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_version() {
        let config = AppConfig { version: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "version"));
    }

    #[test]
    fn test_validate_origin_scheme() {
        let config = AppConfig { origin: "ftp://example.com".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = AppConfig { cleanup_interval_ms: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cleanup_interval_ms"));
    }

    #[test]
    fn test_validate_oversized_durations() {
        let config = AppConfig { cleanup_interval_ms: 1_000_000_000_000_000_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cleanup_interval_ms"));

        let config = AppConfig { cleanup_grace_ms: MAX_DURATION_MS + 1, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cleanup_grace_ms"));

        let config = AppConfig { cache_expiration_ms: MAX_DURATION_MS, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_rules() {
        let config = AppConfig { rules: Vec::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "rules"));
    }

    #[test]
    fn test_validate_bad_regex() {
        let config = AppConfig {
            rules: vec![RuleConfig::new("^/(unclosed$", None), RuleConfig::new(r"^/.*$", None)],
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "rules"));
    }

    #[test]
    fn test_validate_requires_trailing_catch_all() {
        let config = AppConfig {
            rules: vec![RuleConfig::new(r"^/.*$", None), RuleConfig::new(r"^/pwa/.*$", Some(Strategy::CacheFirst))],
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "rules"));
    }

    #[test]
    fn test_validate_empty_exclusion() {
        let config = AppConfig { exclusions: vec![String::new()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "exclusions"));
    }
}
