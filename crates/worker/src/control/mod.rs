//! Page-to-worker control messages.
//!
//! Messages are JSON objects with a `type` field and travel with a oneshot
//! reply port. Each message gets exactly one reply or none:
//!
//! - `GET_SW_CONFIG`: version, environment, cache name, expiration and
//!   cleanup settings
//! - `GET_SW_CLEANUP_STATUS`: persisted cleanup timestamps with derived
//!   durations; no reply while cleanup is disabled
//! - anything else: no reply

mod humanize;

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use swcache_core::AppConfig;
use tokio::sync::{mpsc, oneshot};

use crate::scheduler::{CleanupStatus, ExpiryScheduler};

pub use humanize::{humanize, humanize_delta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    #[serde(rename = "GET_SW_CONFIG")]
    GetSwConfig,
    #[serde(rename = "GET_SW_CLEANUP_STATUS")]
    GetSwCleanupStatus,
}

impl ControlMessage {
    /// Parse a message; unknown or malformed messages yield `None`.
    pub fn parse(data: &Value) -> Option<Self> {
        match Self::deserialize(data) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognized control message");
                None
            }
        }
    }
}

/// Reply to `GET_SW_CONFIG`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwConfigReply {
    pub version: String,
    pub environment: String,
    pub cache_name: String,
    pub cache_expiration: String,
    #[serde(default)]
    pub cleanup_enabled: bool,
    #[serde(default)]
    pub cleanup_interval: String,
}

impl SwConfigReply {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            version: config.version.clone(),
            environment: config.environment.as_str().to_string(),
            cache_name: config.cache_name(),
            cache_expiration: humanize(config.expiration()),
            cleanup_enabled: config.cleanup_enabled,
            cleanup_interval: humanize(config.cleanup_interval()),
        }
    }

    /// What a page reports when the worker does not answer in time.
    pub fn fallback() -> Self {
        Self {
            version: "unknown".into(),
            environment: "unknown".into(),
            cache_name: "unknown".into(),
            cache_expiration: "0".into(),
            cleanup_enabled: false,
            cleanup_interval: "0".into(),
        }
    }
}

/// Reply to `GET_SW_CLEANUP_STATUS`. Timestamps are RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStatusReply {
    pub last_cleanup: Option<String>,
    pub installed_at: Option<String>,
    pub now: String,
    pub time_since_last_cleanup: Option<String>,
    pub time_since_install: Option<String>,
    pub next_cleanup: Option<String>,
    pub cleanup_interval: String,
    pub cleanup_pending: bool,
}

impl CleanupStatusReply {
    pub fn from_status(status: &CleanupStatus, interval: Duration) -> Self {
        Self {
            last_cleanup: status.last_cleanup.map(rfc3339),
            installed_at: status.installed_at.map(rfc3339),
            now: rfc3339(status.now),
            time_since_last_cleanup: status.since_last_cleanup.map(humanize_delta),
            time_since_install: status.since_install.map(humanize_delta),
            next_cleanup: status.next_cleanup.map(rfc3339),
            cleanup_interval: humanize(interval),
            cleanup_pending: status.pending,
        }
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Worker-side responder.
#[derive(Clone)]
pub struct ControlChannel {
    config: SwConfigReply,
    scheduler: ExpiryScheduler,
}

impl ControlChannel {
    pub fn new(config: &AppConfig, scheduler: ExpiryScheduler) -> Self {
        Self { config: SwConfigReply::from_config(config), scheduler }
    }

    pub fn sw_config(&self) -> SwConfigReply {
        self.config.clone()
    }

    /// Cleanup status at `now`, or `None` when cleanup is disabled or the
    /// state cannot be read.
    pub async fn cleanup_status(&self, now: DateTime<Utc>) -> Option<CleanupStatusReply> {
        if !self.scheduler.is_enabled() {
            return None;
        }
        match self.scheduler.cleanup_status(now).await {
            Ok(status) => Some(CleanupStatusReply::from_status(&status, self.scheduler.interval())),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cleanup status");
                None
            }
        }
    }

    /// The reply payload for `data`, if any.
    pub async fn respond(&self, data: &Value) -> Option<Value> {
        let reply = match ControlMessage::parse(data)? {
            ControlMessage::GetSwConfig => serde_json::to_value(self.sw_config()),
            ControlMessage::GetSwCleanupStatus => serde_json::to_value(self.cleanup_status(Utc::now()).await?),
        };
        match reply {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode control reply");
                None
            }
        }
    }

    /// Answer `data` on `reply`. A dropped reply port is not an error.
    pub async fn handle(&self, data: &Value, reply: Option<oneshot::Sender<Value>>) {
        let Some(reply) = reply else {
            tracing::debug!("control message without reply port");
            return;
        };
        if let Some(value) = self.respond(data).await {
            if reply.send(value).is_err() {
                tracing::debug!("control reply port closed before reply");
            }
        }
    }
}

/// A control message with its reply port, as queued by [`ControlHandle`].
#[derive(Debug)]
pub struct ControlRequest {
    pub data: Value,
    pub reply: oneshot::Sender<Value>,
}

/// Page-side requester with a bounded wait.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
    timeout: Duration,
}

/// Create a connected handle and the receiver the worker drains.
pub fn channel(capacity: usize, timeout: Duration) -> (ControlHandle, mpsc::Receiver<ControlRequest>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ControlHandle { tx, timeout }, rx)
}

impl ControlHandle {
    /// Send `data` and wait for the reply.
    ///
    /// `None` when the worker is gone, sends no reply, or misses the timeout.
    pub async fn request(&self, data: Value) -> Option<Value> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ControlRequest { data, reply }).await.is_err() {
            tracing::warn!("control channel closed");
            return None;
        }
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "control request timed out");
                None
            }
        }
    }

    /// Worker configuration, or [`SwConfigReply::fallback`].
    pub async fn sw_config(&self) -> SwConfigReply {
        let reply = self.request(serde_json::json!({ "type": "GET_SW_CONFIG" })).await;
        reply
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_else(SwConfigReply::fallback)
    }

    /// Cleanup status, or `None` when the worker sends none in time.
    pub async fn cleanup_status(&self) -> Option<CleanupStatusReply> {
        let reply = self.request(serde_json::json!({ "type": "GET_SW_CLEANUP_STATUS" })).await?;
        serde_json::from_value(reply).ok()
    }
}
