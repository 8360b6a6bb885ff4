//! Network access for the strategy engine.
//!
//! ### Request semantics
//! - Relative URLs resolve against the worker origin; fragments are dropped.
//! - `same-origin` mode refuses cross-origin URLs before any I/O.
//! - Cookie and Authorization headers are only forwarded when the
//!   credentials policy allows it for the target origin.
//!
//! ### Response classification
//! - Same-origin final URL: `basic`.
//! - Cross-origin under `cors` mode: `cors`, fully readable.
//! - Cross-origin under `no-cors` mode: `opaque`, status 0, no headers, no body.
//! - A final URL different from the requested one marks the response redirected.

pub mod request;
pub mod url;

use std::time::{Duration, Instant};

use reqwest::{Client, header};
use swcache_core::{AppConfig, Error};

pub use reqwest::Method;
pub use request::{Credentials, Request, RequestMode, Response, ResponseKind, ResponseSource};
pub use url::{UrlError, is_http, is_same_origin, resolve};

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Origin the worker is scoped to.
    pub origin: ::url::Url,

    /// User agent string (default: "swcache/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    /// Derive the network settings from the worker configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        })
    }
}

/// The network as seen by the worker.
///
/// Implementations resolve with a response for any HTTP status and fail
/// only when no response was received at all.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// reqwest-backed network.
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new network client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn sends_credentials(&self, request: &Request, same_origin: bool) -> bool {
        match request.credentials {
            Credentials::Include => true,
            Credentials::SameOrigin => same_origin,
            Credentials::Omit => false,
        }
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = resolve(&self.config.origin, &request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let same_origin = is_same_origin(&self.config.origin, &url);

        if request.mode == RequestMode::SameOrigin && !same_origin {
            return Err(Error::Network(format!("cross-origin request to {url} refused in same-origin mode")));
        }

        let with_credentials = self.sends_credentials(request, same_origin);
        let mut builder = self.http.request(request.method.clone(), url.as_str());
        for (name, value) in &request.headers {
            let is_credential = name.eq_ignore_ascii_case(header::COOKIE.as_str())
                || name.eq_ignore_ascii_case(header::AUTHORIZATION.as_str());
            if is_credential && !with_credentials {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{url}: {e}"))
            } else {
                Error::Network(format!("{url}: {e}"))
            }
        })?;

        let final_url = response.url().clone();
        let redirected = final_url != url;

        let kind = if is_same_origin(&self.config.origin, &final_url) {
            ResponseKind::Basic
        } else if request.mode == RequestMode::Cors {
            ResponseKind::Cors
        } else {
            tracing::debug!(url = %final_url, "cross-origin no-cors response is opaque");
            let mut opaque = Response::opaque(final_url.as_str());
            opaque.redirected = redirected;
            return Ok(opaque);
        };

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {final_url}: {e}")))?;

        tracing::debug!(
            url = %url,
            final_url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "network fetch complete"
        );

        Ok(Response {
            url: final_url.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            kind,
            redirected,
            source: ResponseSource::Network,
        })
    }
}
