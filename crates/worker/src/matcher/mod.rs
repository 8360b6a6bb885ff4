//! Request classification.
//!
//! Decides, for a request URL, whether it may touch the cache and which
//! strategy handles it:
//!
//! 1. URLs that do not resolve are never cached.
//! 2. Exclusion globs, tested on the path and on path+query, win over every rule.
//! 3. Rules are tested in order against the absolute URL and the path; the
//!    first match wins.
//! 4. Unmatched preload URLs fall back to cache-first; anything else goes to
//!    the network uncached.

pub mod glob;

use std::sync::Arc;

use regex::Regex;
use swcache_core::{AppConfig, Error, Strategy};
use url::Url;

use crate::fetch::resolve;

pub use glob::glob_to_regex;

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    strategy: Strategy,
}

impl Rule {
    pub fn new(pattern: &str, strategy: Strategy) -> Result<Self, Error> {
        let pattern = Regex::new(pattern).map_err(|e| Error::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(Self { pattern, strategy })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    fn matches(&self, url: &Url) -> bool {
        self.pattern.is_match(url.as_str()) || self.pattern.is_match(url.path())
    }
}

/// Paths that are never cached.
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    patterns: Vec<Regex>,
}

impl ExclusionList {
    pub fn new<S: AsRef<str>>(globs: &[S]) -> Result<Self, Error> {
        let patterns = globs
            .iter()
            .map(|g| glob_to_regex(g.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, url: &Url) -> bool {
        let path = url.path();
        let path_and_query = match url.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        self.patterns
            .iter()
            .any(|re| re.is_match(path) || re.is_match(&path_and_query))
    }
}

/// Outcome of classifying a URL, with the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The URL did not parse or resolve.
    Invalid,
    /// An exclusion glob matched.
    Excluded,
    /// Rule at `index` matched.
    Rule { index: usize, strategy: Strategy },
    /// No rule matched but the URL is on the preload list.
    Preload,
    /// Nothing matched.
    Unmatched,
}

impl Classification {
    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            Classification::Rule { strategy, .. } => Some(*strategy),
            Classification::Preload => Some(Strategy::CacheFirst),
            Classification::Invalid | Classification::Excluded | Classification::Unmatched => None,
        }
    }
}

/// Ordered rule list, exclusion list and preload list.
///
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    origin: Url,
    rules: Arc<[Rule]>,
    exclusions: ExclusionList,
    preload: Arc<[Url]>,
}

impl PatternMatcher {
    pub fn new(origin: Url, rules: Vec<Rule>, exclusions: ExclusionList, preload: Vec<Url>) -> Self {
        Self { origin, rules: rules.into(), exclusions, preload: preload.into() }
    }

    /// Compile the rule, exclusion and preload lists from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let rules = config
            .rules
            .iter()
            .map(|rule| Rule::new(&rule.pattern, config.rule_strategy(rule)))
            .collect::<Result<Vec<_>, _>>()?;

        let exclusions = ExclusionList::new(&config.exclusions)?;

        let preload = config
            .preload_urls
            .iter()
            .map(|u| resolve(&origin, u).map_err(|e| Error::InvalidUrl(format!("{u}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(origin, rules, exclusions, preload))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Preload URLs, resolved against the origin.
    pub fn preload_urls(&self) -> &[Url] {
        &self.preload
    }

    /// Strategy for `url`, or `None` to bypass the cache entirely.
    pub fn classify(&self, url: &str) -> Option<Strategy> {
        self.explain(url).strategy()
    }

    /// Classify `url` and report why.
    pub fn explain(&self, url: &str) -> Classification {
        let url = match resolve(&self.origin, url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url, error = %e, "unparseable request URL; passing through");
                return Classification::Invalid;
            }
        };
        self.explain_url(&url)
    }

    /// Classify an already-resolved URL.
    pub fn explain_url(&self, url: &Url) -> Classification {
        if self.exclusions.is_excluded(url) {
            return Classification::Excluded;
        }

        if let Some((index, rule)) = self.rules.iter().enumerate().find(|(_, rule)| rule.matches(url)) {
            return Classification::Rule { index, strategy: rule.strategy };
        }

        let preloaded = self
            .preload
            .iter()
            .any(|p| p.origin() == url.origin() && p.path() == url.path());
        if preloaded { Classification::Preload } else { Classification::Unmatched }
    }
}
