//! The five fetch strategies.
//!
//! | Strategy               | Cache read          | Network            | Cache write       |
//! |------------------------|---------------------|--------------------|-------------------|
//! | cache-first            | fresh entry wins    | on miss or stale   | OK responses      |
//! | network-first          | on network failure  | always first       | OK responses      |
//! | stale-while-revalidate | any entry wins      | background refresh | OK responses      |
//! | network-only           | never               | always             | never             |
//! | cache-only             | always              | never              | never             |
//!
//! Cache failures never fail a request: reads degrade to a miss and writes
//! are dropped with a warning.

pub mod policy;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use swcache_core::{CacheNamespace, CachedResponse, Error, Strategy};
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::{Credentials, Network, Request, RequestMode, Response, resolve};

pub use policy::{SkipReason, check_storable};

/// Applies a strategy to a request over one cache namespace.
#[derive(Clone)]
pub struct StrategyEngine {
    namespace: CacheNamespace,
    network: Arc<dyn Network>,
    origin: Url,
    expiration: Duration,
}

impl StrategyEngine {
    pub fn new(namespace: CacheNamespace, network: Arc<dyn Network>, origin: Url, expiration: Duration) -> Self {
        Self { namespace, network, origin, expiration }
    }

    pub fn namespace(&self) -> &CacheNamespace {
        &self.namespace
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Resolve `request` with `strategy`.
    ///
    /// Non-GET requests bypass the cache and go straight to the network.
    pub async fn handle(&self, strategy: Strategy, request: &Request) -> Result<Response, Error> {
        if !request.is_get() {
            return self.network.fetch(request).await;
        }

        let url = resolve(&self.origin, &request.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", request.url)))?;
        tracing::debug!(url = %url, strategy = %strategy, "handling request");

        match strategy {
            Strategy::CacheFirst => self.cache_first(request, &url).await,
            Strategy::NetworkFirst => self.network_first(request, &url).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, &url).await,
            Strategy::NetworkOnly => Ok(self.network_only(request, &url).await),
            Strategy::CacheOnly => Ok(self.cache_only(&url).await),
        }
    }

    async fn cache_first(&self, request: &Request, url: &Url) -> Result<Response, Error> {
        let cached = self.read(url).await;

        if let Some(entry) = cached.as_ref().filter(|e| e.is_fresh(Utc::now(), self.expiration)) {
            tracing::debug!(url = %url, "cache hit (fresh)");
            return Ok(Response::from_cached(url.as_str(), entry.clone()));
        }

        let refetch = request
            .clone()
            .with_credentials(Credentials::SameOrigin)
            .with_mode(RequestMode::Cors);

        match self.network.fetch(&refetch).await {
            Ok(response) if response.is_opaque() => Ok(response),
            Ok(response) if response.ok() => {
                self.write(url, &response).await;
                Ok(response)
            }
            Ok(response) => match cached {
                Some(entry) => {
                    tracing::debug!(url = %url, status = response.status, "non-OK network response; serving cached entry");
                    Ok(Response::from_cached(url.as_str(), entry))
                }
                None => Ok(response),
            },
            Err(e) => match cached {
                Some(entry) => {
                    tracing::warn!(url = %url, error = %e, "network failed; serving stale cached entry");
                    Ok(Response::from_cached(url.as_str(), entry))
                }
                None => Err(e),
            },
        }
    }

    async fn network_first(&self, request: &Request, url: &Url) -> Result<Response, Error> {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    self.write(url, &response).await;
                }
                Ok(response)
            }
            Err(e) => match self.read(url).await {
                Some(entry) => {
                    tracing::warn!(url = %url, error = %e, "network failed; serving cached entry");
                    Ok(Response::from_cached(url.as_str(), entry))
                }
                None => Err(e),
            },
        }
    }

    async fn stale_while_revalidate(&self, request: &Request, url: &Url) -> Result<Response, Error> {
        match self.read(url).await {
            Some(entry) => {
                self.spawn_revalidate(request.clone(), url.clone());
                Ok(Response::from_cached(url.as_str(), entry))
            }
            None => {
                let response = self.network.fetch(request).await?;
                if response.ok() {
                    self.write(url, &response).await;
                }
                Ok(response)
            }
        }
    }

    /// Refresh `url` in a detached task.
    pub fn spawn_revalidate(&self, request: Request, url: Url) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move { engine.revalidate(&request, &url).await })
    }

    /// Refetch and overwrite the cached entry. Non-OK responses and failures
    /// leave the existing entry alone.
    pub async fn revalidate(&self, request: &Request, url: &Url) {
        match self.network.fetch(request).await {
            Ok(response) if response.ok() => self.write(url, &response).await,
            Ok(response) => {
                tracing::debug!(url = %url, status = response.status, "revalidation returned non-OK; keeping cached entry")
            }
            Err(e) => tracing::warn!(url = %url, error = %e, "background revalidation failed"),
        }
    }

    async fn network_only(&self, request: &Request, url: &Url) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "network-only fetch failed; returning empty response");
                Response::no_content(url.as_str())
            }
        }
    }

    async fn cache_only(&self, url: &Url) -> Response {
        match self.read(url).await {
            Some(entry) => Response::from_cached(url.as_str(), entry),
            None => {
                tracing::debug!(url = %url, "cache-only miss");
                Response::unavailable_offline(url.as_str())
            }
        }
    }

    async fn read(&self, url: &Url) -> Option<CachedResponse> {
        match self.namespace.lookup(url.as_str()).await {
            Ok(entry) => {
                if entry.is_none() {
                    tracing::debug!(url = %url, "cache miss");
                }
                entry
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Stamp and store `response` if the store policy allows it.
    async fn write(&self, url: &Url, response: &Response) {
        if let Err(reason) = check_storable(url, response) {
            tracing::debug!(url = %url, reason = reason.as_str(), "not caching response");
            return;
        }
        let entry = response.to_cached().stamped(Utc::now());
        match self.namespace.put(url.as_str(), &entry).await {
            Ok(()) => tracing::debug!(url = %url, status = response.status, "cached response"),
            Err(e) => tracing::warn!(url = %url, error = %e, "cache write failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResponseSource;
    use crate::test_support::{ORIGIN, ScriptedNetwork, response};
    use chrono::TimeDelta;
    use reqwest::Method;
    use swcache_core::{CACHED_AT_HEADER, CacheDb};

    const DAY: Duration = Duration::from_secs(86_400);

    async fn engine() -> (StrategyEngine, Arc<ScriptedNetwork>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let namespace = CacheNamespace::open(&db, "site-name-v1").await.unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        let engine = StrategyEngine::new(namespace, network.clone(), Url::parse(ORIGIN).unwrap(), DAY);
        (engine, network)
    }

    async fn seed(engine: &StrategyEngine, path: &str, body: &str, age: TimeDelta) {
        let entry = CachedResponse::new(200, "OK", vec![], body.as_bytes().to_vec()).stamped(Utc::now() - age);
        engine
            .namespace()
            .put(&format!("{ORIGIN}{path}"), &entry)
            .await
            .unwrap();
    }

    async fn cached_body(engine: &StrategyEngine, path: &str) -> Option<Vec<u8>> {
        engine
            .namespace()
            .lookup(&format!("{ORIGIN}{path}"))
            .await
            .unwrap()
            .map(|e| e.body)
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let (engine, network) = engine().await;
        network.respond("/pwa/icon.png", 200, "png");

        let response = engine.handle(Strategy::CacheFirst, &Request::get("/pwa/icon.png")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(&response.body[..], b"png");

        let stored = engine.namespace().lookup(&format!("{ORIGIN}/pwa/icon.png")).await.unwrap().unwrap();
        assert!(stored.header(CACHED_AT_HEADER).is_some());
        assert_eq!(stored.header("content-type"), Some("text/plain"));
        assert_eq!(stored.status_text, "OK");
    }

    #[tokio::test]
    async fn test_cache_first_fresh_hit_skips_network() {
        let (engine, network) = engine().await;
        seed(&engine, "/a.css", "cached", TimeDelta::hours(1)).await;

        let response = engine.handle(Strategy::CacheFirst, &Request::get("/a.css")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(&response.body[..], b"cached");
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_stale_refetches() {
        let (engine, network) = engine().await;
        seed(&engine, "/a.css", "old", TimeDelta::days(2)).await;
        network.respond("/a.css", 200, "new");

        let response = engine.handle(Strategy::CacheFirst, &Request::get("/a.css")).await.unwrap();
        assert_eq!(&response.body[..], b"new");
        assert_eq!(network.calls(), 1);
        assert_eq!(cached_body(&engine, "/a.css").await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_cache_first_stale_served_when_offline() {
        let (engine, network) = engine().await;
        seed(&engine, "/a.css", "old", TimeDelta::days(2)).await;
        network.set_offline(true);

        let response = engine.handle(Strategy::CacheFirst, &Request::get("/a.css")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(&response.body[..], b"old");
    }

    #[tokio::test]
    async fn test_cache_first_prefers_stale_over_error_status() {
        let (engine, network) = engine().await;
        seed(&engine, "/a.css", "old", TimeDelta::days(2)).await;
        network.respond("/a.css", 500, "boom");

        let response = engine.handle(Strategy::CacheFirst, &Request::get("/a.css")).await.unwrap();
        assert_eq!(&response.body[..], b"old");
        assert_eq!(cached_body(&engine, "/a.css").await.unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_cache_first_offline_miss_is_error() {
        let (engine, network) = engine().await;
        network.set_offline(true);
        let result = engine.handle(Strategy::CacheFirst, &Request::get("/missing")).await;
        assert!(result.unwrap_err().is_network());
    }

    #[tokio::test]
    async fn test_cache_first_unstamped_entry_is_not_fresh() {
        let (engine, network) = engine().await;
        let foreign = CachedResponse::new(200, "OK", vec![], b"foreign".to_vec());
        engine.namespace().put(&format!("{ORIGIN}/f"), &foreign).await.unwrap();
        network.respond("/f", 200, "fresh");

        let response = engine.handle(Strategy::CacheFirst, &Request::get("/f")).await.unwrap();
        assert_eq!(&response.body[..], b"fresh");
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_opaque_returned_uncached() {
        let (engine, network) = engine().await;
        let url = "https://cdn.example.net/lib.js";
        network.respond_with(url, crate::fetch::Response::opaque(url));

        let response = engine.handle(Strategy::CacheFirst, &Request::get(url)).await.unwrap();
        assert!(response.is_opaque());
        assert!(engine.namespace().lookup(url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_caches_ok_only() {
        let (engine, network) = engine().await;
        network.respond("/page", 200, "page");
        network.respond("/gone", 404, "nope");

        engine.handle(Strategy::NetworkFirst, &Request::get("/page")).await.unwrap();
        let missing = engine.handle(Strategy::NetworkFirst, &Request::get("/gone")).await.unwrap();

        assert_eq!(missing.status, 404);
        assert_eq!(cached_body(&engine, "/page").await.unwrap(), b"page");
        assert!(cached_body(&engine, "/gone").await.is_none());
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let (engine, network) = engine().await;
        seed(&engine, "/page", "offline copy", TimeDelta::days(3)).await;
        network.set_offline(true);

        let response = engine.handle(Strategy::NetworkFirst, &Request::get("/page")).await.unwrap();
        assert_eq!(&response.body[..], b"offline copy");

        let result = engine.handle(Strategy::NetworkFirst, &Request::get("/other")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_no_store_not_cached() {
        let (engine, network) = engine().await;
        let mut private = response(&format!("{ORIGIN}/me"), 200, "me");
        private.headers.push(("Cache-Control".into(), "no-store".into()));
        network.respond_with("/me", private);

        engine.handle(Strategy::NetworkFirst, &Request::get("/me")).await.unwrap();
        assert!(cached_body(&engine, "/me").await.is_none());
    }

    #[tokio::test]
    async fn test_swr_serves_cache_and_refreshes() {
        let (engine, network) = engine().await;
        seed(&engine, "/feed", "v1", TimeDelta::days(5)).await;
        network.respond("/feed", 200, "v2");

        let response = engine
            .handle(Strategy::StaleWhileRevalidate, &Request::get("/feed"))
            .await
            .unwrap();
        assert_eq!(&response.body[..], b"v1");

        for _ in 0..100 {
            if cached_body(&engine, "/feed").await.as_deref() == Some(b"v2".as_slice()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background revalidation never updated the cache");
    }

    #[tokio::test]
    async fn test_swr_revalidate_keeps_entry_on_error_status() {
        let (engine, network) = engine().await;
        seed(&engine, "/feed", "v1", TimeDelta::minutes(1)).await;
        network.respond("/feed", 503, "down");

        let url = Url::parse(&format!("{ORIGIN}/feed")).unwrap();
        engine.revalidate(&Request::get("/feed"), &url).await;
        assert_eq!(cached_body(&engine, "/feed").await.unwrap(), b"v1");

        network.set_offline(true);
        engine.spawn_revalidate(Request::get("/feed"), url).await.unwrap();
        assert_eq!(cached_body(&engine, "/feed").await.unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_swr_miss_returns_network_response() {
        let (engine, network) = engine().await;
        network.respond("/new", 500, "err");

        let response = engine
            .handle(Strategy::StaleWhileRevalidate, &Request::get("/new"))
            .await
            .unwrap();
        assert_eq!(response.status, 500);
        assert!(cached_body(&engine, "/new").await.is_none());
    }

    #[tokio::test]
    async fn test_network_only_failure_is_no_content() {
        let (engine, network) = engine().await;
        network.set_offline(true);

        let response = engine.handle(Strategy::NetworkOnly, &Request::get("/beacon")).await.unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.source, ResponseSource::Synthetic);
        assert!(cached_body(&engine, "/beacon").await.is_none());
    }

    #[tokio::test]
    async fn test_network_only_never_writes() {
        let (engine, network) = engine().await;
        network.respond("/live", 200, "live");
        engine.handle(Strategy::NetworkOnly, &Request::get("/live")).await.unwrap();
        assert!(cached_body(&engine, "/live").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_only() {
        let (engine, network) = engine().await;
        seed(&engine, "/offline.html", "offline", TimeDelta::days(30)).await;

        let hit = engine.handle(Strategy::CacheOnly, &Request::get("/offline.html")).await.unwrap();
        assert_eq!(&hit.body[..], b"offline");

        let miss = engine.handle(Strategy::CacheOnly, &Request::get("/nothing")).await.unwrap();
        assert_eq!(miss.status, 504);
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_get_goes_to_network() {
        let (engine, network) = engine().await;
        seed(&engine, "/api", "cached", TimeDelta::minutes(1)).await;
        network.respond("/api", 200, "posted");

        let response = engine
            .handle(Strategy::CacheOnly, &Request::new(Method::POST, "/api"))
            .await
            .unwrap();
        assert_eq!(&response.body[..], b"posted");
        assert_eq!(network.calls(), 1);
    }
}
