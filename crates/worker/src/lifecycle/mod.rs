//! Install, activate and supersede.
//!
//! `Installing -> Installed -> Active -> Superseded`. Install primes the
//! preload list and moves straight on to activation; activation retires
//! every namespace but the current one and claims open pages.

pub mod host;

use std::sync::{Arc, RwLock};

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use swcache_core::cache::INSTALLED_AT_KEY;
use swcache_core::{CacheNamespace, Error};
use url::Url;

use crate::fetch::{Network, Request};
use crate::strategy::check_storable;

pub use host::{ClientHost, HeadlessHost, Notification, WindowClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    Installed,
    Active,
    Superseded,
}

/// Counts from an install.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub preloaded: usize,
    pub failed: usize,
}

/// Counts from an activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub deleted: usize,
    pub failed: usize,
}

pub struct LifecycleController {
    namespace: CacheNamespace,
    network: Arc<dyn Network>,
    host: Arc<dyn ClientHost>,
    preload: Vec<Url>,
    state: RwLock<LifecycleState>,
}

impl LifecycleController {
    pub fn new(
        namespace: CacheNamespace, network: Arc<dyn Network>, host: Arc<dyn ClientHost>, preload: Vec<Url>,
    ) -> Self {
        Self { namespace, network, host, preload, state: RwLock::new(LifecycleState::Installing) }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.read().map(|s| *s).unwrap_or(LifecycleState::Superseded)
    }

    pub fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    fn transition(&self, next: LifecycleState) {
        match self.state.write() {
            Ok(mut state) => {
                if *state != next {
                    tracing::info!(from = ?*state, to = ?next, namespace = self.namespace.name(), "lifecycle transition");
                    *state = next;
                }
            }
            Err(e) => tracing::warn!(error = %e, "lifecycle state lock poisoned"),
        }
    }

    /// Create the namespace, preload, and record the install time.
    ///
    /// Preload failures are logged and counted; only a failure to create the
    /// namespace fails the install.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(LifecycleState::Installing);
        self.namespace.db().create_namespace(self.namespace.name()).await?;

        let outcomes = join_all(self.preload.iter().map(|url| self.preload_one(url))).await;
        let preloaded = outcomes.iter().filter(|ok| **ok).count();
        let report = InstallReport { preloaded, failed: outcomes.len() - preloaded };

        let now_ms = Utc::now().timestamp_millis();
        match self.namespace.db().set_state_millis_if_absent(INSTALLED_AT_KEY, now_ms).await {
            Ok(installed_at) => tracing::debug!(installed_at, "install time recorded"),
            Err(e) => tracing::warn!(error = %e, "failed to persist install time"),
        }

        tracing::info!(
            namespace = self.namespace.name(),
            preloaded = report.preloaded,
            failed = report.failed,
            "install complete"
        );
        self.transition(LifecycleState::Installed);
        Ok(report)
    }

    async fn preload_one(&self, url: &Url) -> bool {
        let response = match self.network.fetch(&Request::get(url.as_str())).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "preload fetch failed");
                return false;
            }
        };
        if !response.ok() {
            tracing::warn!(url = %url, status = response.status, "preload returned non-OK status");
            return false;
        }
        if let Err(reason) = check_storable(url, &response) {
            tracing::warn!(url = %url, reason = reason.as_str(), "preload response not storable");
            return false;
        }
        let entry = response.to_cached().stamped(Utc::now());
        match self.namespace.put(url.as_str(), &entry).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "preload write failed");
                false
            }
        }
    }

    /// Delete old namespaces and claim clients. Safe to repeat.
    ///
    /// Ignored until an install has completed.
    pub async fn activate(&self) -> ActivateReport {
        let mut report = ActivateReport::default();
        if self.state() == LifecycleState::Installing {
            tracing::warn!(namespace = self.namespace.name(), "activate before install completed; ignoring");
            return report;
        }
        let db = self.namespace.db();

        match db.namespace_names().await {
            Ok(names) => {
                for name in names.iter().filter(|n| n.as_str() != self.namespace.name()) {
                    match db.delete_namespace(name).await {
                        Ok(_) => {
                            tracing::info!(namespace = %name, "deleted old cache namespace");
                            report.deleted += 1;
                        }
                        Err(e) => {
                            tracing::warn!(namespace = %name, error = %e, "failed to delete old cache namespace");
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to list cache namespaces"),
        }

        if let Err(e) = self.host.claim().await {
            tracing::warn!(error = %e, "failed to claim clients");
        }

        if self.state() != LifecycleState::Superseded {
            self.transition(LifecycleState::Active);
        }
        report
    }

    /// Stop intercepting fetches.
    pub fn mark_superseded(&self) {
        self.transition(LifecycleState::Superseded);
    }
}
