//! Request and response values passed between the engine and the network.

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use swcache_core::CachedResponse;

/// Request mode, controlling what a cross-origin response exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Cross-origin requests fail outright.
    SameOrigin,
    /// Cross-origin responses are readable.
    Cors,
    /// Cross-origin responses come back opaque.
    NoCors,
}

/// When cookies and authorization headers are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    Omit,
    SameOrigin,
    Include,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Absolute URL, or a path relative to the worker origin.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub mode: RequestMode,
    pub credentials: Credentials,
}

impl Request {
    /// A request with the defaults a page uses for subresources.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            mode: RequestMode::NoCors,
            credentials: Credentials::SameOrigin,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

/// How much of a response the caller may inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Cross-origin response readable under CORS.
    Cors,
    /// Cross-origin no-cors response: status 0, no headers, empty body.
    Opaque,
    /// Built locally, not received from anywhere.
    Default,
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Synthetic,
}

/// A response handed back to the page.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseKind,
    pub redirected: bool,
    pub source: ResponseSource,
}

impl Response {
    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_opaque(&self) -> bool {
        self.kind == ResponseKind::Opaque
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// An opaque response as seen by a no-cors caller.
    pub fn opaque(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 0,
            status_text: String::new(),
            headers: Vec::new(),
            body: Bytes::new(),
            kind: ResponseKind::Opaque,
            redirected: false,
            source: ResponseSource::Network,
        }
    }

    /// Empty `204 No Content`, returned by network-only when the network fails.
    pub fn no_content(url: impl Into<String>) -> Self {
        Self::synthetic(url, 204, "No Content", Bytes::new())
    }

    /// `504`, returned by cache-only on a miss.
    pub fn unavailable_offline(url: impl Into<String>) -> Self {
        let mut response = Self::synthetic(url, 504, "Gateway Timeout", Bytes::from_static(b"Not available offline"));
        response.headers.push(("Content-Type".into(), "text/plain; charset=utf-8".into()));
        response
    }

    fn synthetic(url: impl Into<String>, status: u16, status_text: &str, body: Bytes) -> Self {
        Self {
            url: url.into(),
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body,
            kind: ResponseKind::Default,
            redirected: false,
            source: ResponseSource::Synthetic,
        }
    }

    /// Rebuild a response from a stored entry.
    pub fn from_cached(url: impl Into<String>, cached: CachedResponse) -> Self {
        Self {
            url: url.into(),
            status: cached.status,
            status_text: cached.status_text,
            headers: cached.headers,
            body: Bytes::from(cached.body),
            kind: ResponseKind::Basic,
            redirected: false,
            source: ResponseSource::Cache,
        }
    }

    /// The storable part of this response.
    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse::new(self.status, self.status_text.clone(), self.headers.clone(), self.body.to_vec())
    }
}
