//! URL resolution and canonicalization for cache keys.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request URL against the worker origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references against `origin`
/// 3. Lowercase the host (done by the parser for special schemes)
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
///
/// Schemes are not filtered here; the store policy refuses non-http(s) writes.
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    parsed.set_fragment(None);

    Ok(parsed)
}

/// Whether `url` shares scheme, host and port with `origin`.
pub fn is_same_origin(origin: &Url, url: &Url) -> bool {
    origin.origin() == url.origin()
}

/// Whether a URL can be written to the cache.
pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
