//! Which responses may be written to the cache.

use url::Url;

use crate::fetch::{Response, is_http};

/// Why a response was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Opaque,
    Redirected,
    NoStore,
    UnsupportedScheme,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Opaque => "opaque",
            SkipReason::Redirected => "redirected",
            SkipReason::NoStore => "no-store",
            SkipReason::UnsupportedScheme => "unsupported-scheme",
        }
    }
}

/// Check a response against the store policy.
///
/// Status is not checked here; each strategy decides which statuses it keeps.
pub fn check_storable(request_url: &Url, response: &Response) -> Result<(), SkipReason> {
    if !is_http(request_url) {
        return Err(SkipReason::UnsupportedScheme);
    }
    if response.is_opaque() {
        return Err(SkipReason::Opaque);
    }
    if response.redirected {
        return Err(SkipReason::Redirected);
    }
    let no_store = response
        .headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("cache-control"))
        .flat_map(|(_, value)| value.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-store"));
    if no_store {
        return Err(SkipReason::NoStore);
    }
    Ok(())
}
