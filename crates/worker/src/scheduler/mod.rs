//! Background eviction of expired cache entries.
//!
//! A cleanup is attempted on qualifying fetch events. It proceeds only when:
//! - cleanup is enabled,
//! - no other cleanup is pending in this process (atomic flag),
//! - the grace period since install has elapsed,
//! - the interval since the last persisted cleanup has elapsed.
//!
//! `sw-last-cleanup` is persisted before the batch is scheduled so a second
//! process sharing the database sees the slot as taken.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use swcache_core::cache::{INSTALLED_AT_KEY, LAST_CLEANUP_KEY};
use swcache_core::{AppConfig, CacheNamespace, Error};
use tokio::task::JoinHandle;

/// Outcome of one cleanup batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Entries without a parseable `cached-at` header.
    pub skipped_unstamped: usize,
}

/// Snapshot returned by [`ExpiryScheduler::cleanup_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupStatus {
    pub now: DateTime<Utc>,
    pub installed_at: Option<DateTime<Utc>>,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub since_install: Option<TimeDelta>,
    pub since_last_cleanup: Option<TimeDelta>,
    pub next_cleanup: Option<DateTime<Utc>>,
    pub pending: bool,
}

enum Eviction {
    Kept,
    Deleted,
    Unstamped,
    Failed,
}

/// Clears the pending flag on drop, including on panic.
struct PendingGuard(Arc<AtomicBool>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ExpiryScheduler {
    namespace: CacheNamespace,
    enabled: bool,
    interval: Duration,
    grace: Duration,
    delay: Duration,
    expiration: Duration,
    pending: Arc<AtomicBool>,
}

impl ExpiryScheduler {
    pub fn new(namespace: CacheNamespace, config: &AppConfig) -> Self {
        Self {
            namespace,
            enabled: config.cleanup_enabled,
            interval: config.cleanup_interval(),
            grace: config.cleanup_grace(),
            delay: config.cleanup_delay(),
            expiration: config.expiration(),
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub async fn maybe_schedule(&self) -> Option<JoinHandle<CleanupReport>> {
        self.maybe_schedule_at(Utc::now()).await
    }

    /// Schedule a cleanup batch if one is due at `now`.
    ///
    /// Returns the batch handle when a batch was scheduled.
    pub async fn maybe_schedule_at(&self, now: DateTime<Utc>) -> Option<JoinHandle<CleanupReport>> {
        if !self.enabled {
            return None;
        }
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("cleanup already pending");
            return None;
        }
        let guard = PendingGuard(self.pending.clone());

        match self.claim_slot(now).await {
            Ok(true) => {
                tracing::info!(delay_ms = self.delay.as_millis() as u64, "cleanup scheduled");
                let scheduler = self.clone();
                Some(tokio::spawn(async move {
                    let _guard = guard;
                    tokio::time::sleep(scheduler.delay).await;
                    scheduler.run_cleanup(Utc::now()).await
                }))
            }
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cleanup state; skipping cleanup");
                None
            }
        }
    }

    /// Check grace and interval, then persist `last-cleanup = now`.
    async fn claim_slot(&self, now: DateTime<Utc>) -> Result<bool, Error> {
        let db = self.namespace.db();
        let now_ms = now.timestamp_millis();
        let state = db.cleanup_state().await?;

        let installed_at = match state.installed_at {
            Some(t) => t,
            None => db.set_state_millis_if_absent(INSTALLED_AT_KEY, now_ms).await?,
        };
        if now_ms.saturating_sub(installed_at) < millis(self.grace) {
            tracing::debug!(installed_at, "cleanup grace period not elapsed");
            return Ok(false);
        }
        if let Some(last) = state.last_cleanup {
            if now_ms.saturating_sub(last) < millis(self.interval) {
                tracing::debug!(last_cleanup = last, "cleanup interval not elapsed");
                return Ok(false);
            }
        }

        let effective = db.advance_state_millis(LAST_CLEANUP_KEY, now_ms).await?;
        Ok(effective == now_ms)
    }

    /// Delete every stamped entry older than the expiration window at `now`.
    pub async fn run_cleanup(&self, now: DateTime<Utc>) -> CleanupReport {
        let keys = match self.namespace.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(namespace = self.namespace.name(), error = %e, "cleanup could not list entries");
                return CleanupReport::default();
            }
        };

        let outcomes = join_all(keys.iter().map(|url| self.evict_if_expired(url, now))).await;

        let mut report = CleanupReport { scanned: keys.len(), ..Default::default() };
        for outcome in outcomes {
            match outcome {
                Eviction::Kept => {}
                Eviction::Deleted => report.deleted += 1,
                Eviction::Unstamped => report.skipped_unstamped += 1,
                Eviction::Failed => report.failed += 1,
            }
        }

        tracing::info!(
            namespace = self.namespace.name(),
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            skipped_unstamped = report.skipped_unstamped,
            "cleanup finished"
        );
        report
    }

    async fn evict_if_expired(&self, url: &str, now: DateTime<Utc>) -> Eviction {
        let entry = match self.namespace.lookup(url).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Eviction::Kept,
            Err(e) => {
                tracing::warn!(url, error = %e, "cleanup could not read entry");
                return Eviction::Failed;
            }
        };

        match entry.is_expired(now, self.expiration) {
            None => Eviction::Unstamped,
            Some(false) => Eviction::Kept,
            Some(true) => match self.namespace.delete(url).await {
                Ok(_) => Eviction::Deleted,
                Err(e) => {
                    tracing::warn!(url, error = %e, "cleanup could not delete entry");
                    Eviction::Failed
                }
            },
        }
    }

    /// Persisted cleanup timestamps with derived durations.
    ///
    /// Before the first cleanup, the next one is due at install + grace.
    /// A due time past the representable range saturates to the maximum.
    pub async fn cleanup_status(&self, now: DateTime<Utc>) -> Result<CleanupStatus, Error> {
        let state = self.namespace.db().cleanup_state().await?;
        let installed_at = state.installed_at_time();
        let last_cleanup = state.last_cleanup_time();

        let first_allowed = installed_at.map(|t| after(t, self.grace));
        let next_cleanup = match last_cleanup {
            None => first_allowed,
            Some(last) => {
                let by_interval = after(last, self.interval);
                Some(first_allowed.map_or(by_interval, |first| first.max(by_interval)))
            }
        };

        Ok(CleanupStatus {
            now,
            installed_at,
            last_cleanup,
            since_install: installed_at.map(|t| now - t),
            since_last_cleanup: last_cleanup.map(|t| now - t),
            next_cleanup,
            pending: self.is_pending(),
        })
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn after(t: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(d)
        .ok()
        .and_then(|d| t.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swcache_core::{CacheDb, CachedResponse};

    const HOUR: i64 = 3_600_000;

    async fn scheduler(config: AppConfig) -> ExpiryScheduler {
        let db = CacheDb::open_in_memory().await.unwrap();
        let namespace = CacheNamespace::open(&db, &config.cache_name()).await.unwrap();
        ExpiryScheduler::new(namespace, &config)
    }

    fn config() -> AppConfig {
        AppConfig { cleanup_delay_ms: 0, ..Default::default() }
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    async fn install_at(s: &ExpiryScheduler, ms: i64) {
        s.namespace.db().set_state_millis_if_absent(INSTALLED_AT_KEY, ms).await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_never_schedules() {
        let s = scheduler(AppConfig { cleanup_enabled: false, ..config() }).await;
        install_at(&s, 0).await;
        assert!(s.maybe_schedule_at(at(100 * HOUR)).await.is_none());
    }

    #[tokio::test]
    async fn test_grace_period_blocks() {
        let s = scheduler(config()).await;
        let installed = 1_700_000_000_000;
        install_at(&s, installed).await;

        assert!(s.maybe_schedule_at(at(installed + 5 * 60_000)).await.is_none());
        assert!(!s.is_pending());
        assert_eq!(s.namespace.db().get_state_millis(LAST_CLEANUP_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_install_time_is_set_lazily() {
        let s = scheduler(config()).await;
        let now = 1_700_000_000_000;
        assert!(s.maybe_schedule_at(at(now)).await.is_none());
        assert_eq!(s.namespace.db().get_state_millis(INSTALLED_AT_KEY).await.unwrap(), Some(now));
    }

    #[tokio::test]
    async fn test_interval_gates_second_run() {
        let s = scheduler(config()).await;
        install_at(&s, 0).await;

        let first = s.maybe_schedule_at(at(HOUR)).await.expect("first cleanup due");
        first.await.unwrap();
        assert_eq!(s.namespace.db().get_state_millis(LAST_CLEANUP_KEY).await.unwrap(), Some(HOUR));

        assert!(s.maybe_schedule_at(at(2 * HOUR)).await.is_none());
        assert!(s.maybe_schedule_at(at(9 * HOUR + 1)).await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_triggers_schedule_once() {
        let s = scheduler(config()).await;
        install_at(&s, 0).await;

        let now = at(HOUR);
        let (a, b, c) = tokio::join!(s.maybe_schedule_at(now), s.maybe_schedule_at(now), s.maybe_schedule_at(now));
        let scheduled: Vec<_> = [a, b, c].into_iter().flatten().collect();
        assert_eq!(scheduled.len(), 1);

        for handle in scheduled {
            handle.await.unwrap();
        }
        assert!(!s.is_pending());
    }

    #[tokio::test]
    async fn test_pending_flag_blocks_until_batch_finishes() {
        let s = scheduler(AppConfig { cleanup_delay_ms: 60_000, ..config() }).await;
        install_at(&s, 0).await;

        let handle = s.maybe_schedule_at(at(HOUR)).await.unwrap();
        assert!(s.is_pending());
        assert!(s.maybe_schedule_at(at(100 * HOUR)).await.is_none());

        handle.abort();
        let _ = handle.await;
        assert!(!s.is_pending());
    }

    #[tokio::test]
    async fn test_run_cleanup_deletes_only_expired_stamped_entries() {
        let s = scheduler(config()).await;
        let now = Utc::now();
        let ns = &s.namespace;

        let body = || b"x".to_vec();
        ns.put("https://example.com/old", &CachedResponse::new(200, "OK", vec![], body()).stamped(now - TimeDelta::days(2)))
            .await
            .unwrap();
        ns.put("https://example.com/new", &CachedResponse::new(200, "OK", vec![], body()).stamped(now - TimeDelta::hours(1)))
            .await
            .unwrap();
        ns.put("https://example.com/foreign", &CachedResponse::new(200, "OK", vec![], body()))
            .await
            .unwrap();

        let report = s.run_cleanup(now).await;
        assert_eq!(report, CleanupReport { scanned: 3, deleted: 1, failed: 0, skipped_unstamped: 1 });

        let mut keys = ns.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["https://example.com/foreign", "https://example.com/new"]);
    }

    #[tokio::test]
    async fn test_unreadable_entry_counts_as_failure_without_aborting() {
        let s = scheduler(config()).await;
        install_at(&s, 0).await;
        let ns = &s.namespace;
        let stamp = Utc::now() - TimeDelta::days(2);

        for path in ["/expired", "/corrupt"] {
            let entry = CachedResponse::new(200, "OK", vec![], b"x".to_vec()).stamped(stamp);
            ns.put(&format!("https://example.com{path}"), &entry).await.unwrap();
        }
        ns.db()
            .set_entry_headers_raw(ns.name(), "https://example.com/corrupt", "{not json")
            .await
            .unwrap();

        let report = s.maybe_schedule_at(at(HOUR)).await.expect("cleanup due").await.unwrap();
        assert_eq!(report, CleanupReport { scanned: 2, deleted: 1, failed: 1, skipped_unstamped: 0 });
        assert_eq!(ns.keys().await.unwrap(), vec!["https://example.com/corrupt".to_string()]);
        assert!(!s.is_pending());
    }

    #[tokio::test]
    async fn test_status_before_first_cleanup_uses_install_time() {
        let s = scheduler(config()).await;
        let installed = 1_700_000_000_000;
        install_at(&s, installed).await;

        let now = at(installed + 5 * 60_000);
        let status = s.cleanup_status(now).await.unwrap();
        assert_eq!(status.last_cleanup, None);
        assert_eq!(status.since_install, Some(TimeDelta::minutes(5)));
        assert_eq!(status.next_cleanup, Some(at(installed + 10 * 60_000)));
        assert!(!status.pending);
    }

    #[tokio::test]
    async fn test_status_saturates_huge_interval() {
        let s = scheduler(AppConfig { cleanup_interval_ms: 1_000_000_000_000_000_000, ..config() }).await;
        install_at(&s, 0).await;
        s.namespace.db().advance_state_millis(LAST_CLEANUP_KEY, HOUR).await.unwrap();

        let status = s.cleanup_status(at(2 * HOUR)).await.unwrap();
        assert_eq!(status.next_cleanup, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[tokio::test]
    async fn test_status_after_cleanup_uses_interval() {
        let s = scheduler(config()).await;
        install_at(&s, 0).await;
        s.namespace.db().advance_state_millis(LAST_CLEANUP_KEY, HOUR).await.unwrap();

        let status = s.cleanup_status(at(2 * HOUR)).await.unwrap();
        assert_eq!(status.next_cleanup, Some(at(9 * HOUR)));
        assert_eq!(status.since_last_cleanup, Some(TimeDelta::hours(1)));
    }
}
