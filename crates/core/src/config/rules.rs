//! Strategy names and the declarative rule list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A fetch strategy applied to a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Serve a fresh cached entry, otherwise go to the network.
    CacheFirst,
    /// Go to the network, fall back to the cache when it fails.
    NetworkFirst,
    /// Serve the cached entry now and refresh it in the background.
    StaleWhileRevalidate,
    /// Never touch the cache.
    NetworkOnly,
    /// Never touch the network.
    CacheOnly,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::NetworkOnly => "network-only",
            Strategy::CacheOnly => "cache-only",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment mode.
///
/// Development shortens the expiration window to one minute and prefers
/// network-first for rules that do not name a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
        }
    }

    /// Strategy for rules that leave theirs unset.
    pub fn default_strategy(&self) -> Strategy {
        match self {
            Environment::Production => Strategy::StaleWhileRevalidate,
            Environment::Development => Strategy::NetworkFirst,
        }
    }
}

/// One entry of the ordered rule list.
///
/// `pattern` is a regular expression tested against both the absolute URL
/// and the path of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub pattern: String,

    /// `None` selects [`Environment::default_strategy`].
    #[serde(default)]
    pub strategy: Option<Strategy>,
}

impl RuleConfig {
    pub fn new(pattern: impl Into<String>, strategy: Option<Strategy>) -> Self {
        Self { pattern: pattern.into(), strategy }
    }
}

pub(crate) fn default_rules() -> Vec<RuleConfig> {
    vec![
        // PWA assets
        RuleConfig::new(r"^/pwa/.+\.(png|jpg|jpeg|webp)$", Some(Strategy::CacheFirst)),
        // Astro build output
        RuleConfig::new(
            r"^/_astro/.+\.(css|js|png|webp|jpg|jpeg|gif|svg|woff|woff2|eot|ttf|otf)$",
            Some(Strategy::CacheFirst),
        ),
        RuleConfig::new(r"^https://fonts\.googleapis\.com/", Some(Strategy::CacheFirst)),
        RuleConfig::new(r"^https://fonts\.gstatic\.com/", Some(Strategy::CacheFirst)),
        // Homepage, then the catch-all. Keep the catch-all last.
        RuleConfig::new(r"^/$", None),
        RuleConfig::new(r"^/.*$", None),
    ]
}
