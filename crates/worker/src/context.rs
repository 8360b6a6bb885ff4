//! Owned worker state and the event dispatcher.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use swcache_core::{AppConfig, CacheDb, CacheNamespace, CachedResponse, Error};
use tokio::sync::oneshot;

use crate::control::{self, ControlChannel, ControlHandle};
use crate::fetch::{Network, Request, Response, resolve};
use crate::lifecycle::{ClientHost, LifecycleController, LifecycleState};
use crate::matcher::PatternMatcher;
use crate::notify;
use crate::scheduler::ExpiryScheduler;
use crate::strategy::StrategyEngine;

/// An event delivered to the worker.
#[derive(Debug)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Message { data: Value, reply: Option<oneshot::Sender<Value>> },
    Push(Option<Bytes>),
    NotificationClick { url: Option<String> },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::Activate => "activate",
            Event::Fetch(_) => "fetch",
            Event::Message { .. } => "message",
            Event::Push(_) => "push",
            Event::NotificationClick { .. } => "notificationclick",
        }
    }
}

/// Everything one worker instance owns.
pub struct WorkerContext {
    config: AppConfig,
    namespace: CacheNamespace,
    network: Arc<dyn Network>,
    host: Arc<dyn ClientHost>,
    matcher: PatternMatcher,
    engine: StrategyEngine,
    lifecycle: LifecycleController,
    scheduler: ExpiryScheduler,
    control: ControlChannel,
}

impl WorkerContext {
    pub fn new(
        config: AppConfig, db: CacheDb, network: Arc<dyn Network>, host: Arc<dyn ClientHost>,
    ) -> Result<Self, Error> {
        let matcher = PatternMatcher::from_config(&config)?;
        let namespace = CacheNamespace::attach(&db, &config.cache_name());
        let engine = StrategyEngine::new(
            namespace.clone(),
            network.clone(),
            matcher.origin().clone(),
            config.expiration(),
        );
        let lifecycle =
            LifecycleController::new(namespace.clone(), network.clone(), host.clone(), matcher.preload_urls().to_vec());
        let scheduler = ExpiryScheduler::new(namespace.clone(), &config);
        let control = ControlChannel::new(&config, scheduler.clone());

        Ok(Self { config, namespace, network, host, matcher, engine, lifecycle, scheduler, control })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn namespace(&self) -> &CacheNamespace {
        &self.namespace
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn scheduler(&self) -> &ExpiryScheduler {
        &self.scheduler
    }

    pub fn control(&self) -> &ControlChannel {
        &self.control
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Route an event to its handler.
    ///
    /// Only fetch events produce a response. Install also activates, since
    /// the worker never waits for older instances to exit.
    pub async fn dispatch(&self, event: Event) -> Result<Option<Response>, Error> {
        tracing::debug!(event = event.kind(), "dispatch");
        match event {
            Event::Install => {
                self.lifecycle.install().await?;
                self.lifecycle.activate().await;
                Ok(None)
            }
            Event::Activate => {
                self.lifecycle.activate().await;
                Ok(None)
            }
            Event::Fetch(request) => self.handle_fetch(request).await.map(Some),
            Event::Message { data, reply } => {
                self.control.handle(&data, reply).await;
                Ok(None)
            }
            Event::Push(data) => {
                notify::handle_push(self.host.as_ref(), data.as_deref()).await;
                Ok(None)
            }
            Event::NotificationClick { url } => {
                let origin = self.matcher.origin();
                if let Err(e) = notify::handle_notification_click(self.host.as_ref(), origin, url.as_deref()).await {
                    tracing::warn!(error = %e, "failed to handle notification click");
                }
                Ok(None)
            }
        }
    }

    /// Resolve a fetch.
    ///
    /// While not active, and for non-GET methods, the request goes straight
    /// to the network. Unclassified requests are fetched without caching.
    pub async fn handle_fetch(&self, request: Request) -> Result<Response, Error> {
        if !self.lifecycle.is_active() || !request.is_get() {
            return self.network.fetch(&request).await;
        }

        // Batch runs detached; the handle is only useful to tests.
        let _ = self.scheduler.maybe_schedule().await;

        match self.matcher.classify(&request.url) {
            Some(strategy) => self.engine.handle(strategy, &request).await,
            None => {
                tracing::debug!(url = %request.url, "not cacheable; passing through");
                self.network.fetch(&request).await
            }
        }
    }

    /// Stop intercepting fetches.
    pub fn supersede(&self) {
        self.lifecycle.mark_superseded();
    }

    /// Start answering control requests; returns the page-side handle.
    pub fn spawn_control(self: &Arc<Self>) -> ControlHandle {
        let (handle, mut rx) = control::channel(16, self.config.control_timeout());
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let event = Event::Message { data: request.data, reply: Some(request.reply) };
                if let Err(e) = ctx.dispatch(event).await {
                    tracing::warn!(error = %e, "control message failed");
                }
            }
        });
        handle
    }

    /// The current namespace's entry for `url`.
    pub async fn cache_lookup(&self, url: &str) -> Result<Option<CachedResponse>, Error> {
        let url = self.resolve(url)?;
        self.namespace.lookup(url.as_str()).await
    }

    /// Delete one entry, or every entry when `url` is `None`. Returns the
    /// number of entries removed.
    pub async fn cache_purge(&self, url: Option<&str>) -> Result<usize, Error> {
        match url {
            Some(url) => {
                let url = self.resolve(url)?;
                Ok(usize::from(self.namespace.delete(url.as_str()).await?))
            }
            None => {
                let mut removed = 0;
                for key in self.namespace.keys().await? {
                    if self.namespace.delete(&key).await? {
                        removed += 1;
                    }
                }
                tracing::info!(namespace = self.namespace.name(), removed, "purged cache namespace");
                Ok(removed)
            }
        }
    }

    fn resolve(&self, url: &str) -> Result<url::Url, Error> {
        resolve(self.matcher.origin(), url).map_err(|e| Error::InvalidInput(format!("{url}: {e}")))
    }
}
