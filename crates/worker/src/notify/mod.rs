//! Push delivery and notification clicks.

use serde::Deserialize;
use swcache_core::Error;
use url::Url;

use crate::fetch::resolve;
use crate::lifecycle::{ClientHost, Notification};

pub const DEFAULT_TITLE: &str = "New Notification";
pub const DEFAULT_BODY: &str = "You have a new message.";
pub const DEFAULT_ICON: &str = "/pwa/icon-192x192.png";
pub const DEFAULT_URL: &str = "/";

#[derive(Debug, Default, Deserialize)]
struct PushPayload {
    #[serde(default)]
    notification: PushNotification,
}

#[derive(Debug, Default, Deserialize)]
struct PushNotification {
    title: Option<String>,
    body: Option<String>,
    image: Option<String>,
    click_action: Option<String>,
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

/// Build the notification for a push payload.
///
/// Returns `None` for an empty or unparseable payload.
pub fn parse_push(data: Option<&[u8]>) -> Option<Notification> {
    let data = match data {
        Some(data) if !data.is_empty() => data,
        _ => {
            tracing::warn!("push event without data");
            return None;
        }
    };
    let payload: PushPayload = match serde_json::from_slice(data) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "malformed push payload");
            return None;
        }
    };
    let n = payload.notification;
    Some(Notification {
        title: non_empty(n.title, DEFAULT_TITLE),
        body: non_empty(n.body, DEFAULT_BODY),
        icon: non_empty(n.image, DEFAULT_ICON),
        url: non_empty(n.click_action, DEFAULT_URL),
    })
}

/// Surface a push payload through the host. Returns whether one was shown.
pub async fn handle_push(host: &dyn ClientHost, data: Option<&[u8]>) -> bool {
    let Some(notification) = parse_push(data) else {
        return false;
    };
    match host.show_notification(&notification).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "failed to show notification");
            false
        }
    }
}

/// Focus a page already showing `url`, else open one.
///
/// The target and each window's URL are resolved against `origin` before
/// comparing, so `/inbox` matches a window at `https://site/inbox`.
pub async fn handle_notification_click(host: &dyn ClientHost, origin: &Url, url: Option<&str>) -> Result<(), Error> {
    let raw = url.filter(|u| !u.is_empty()).unwrap_or(DEFAULT_URL);
    let target = resolve(origin, raw).map_err(|e| Error::InvalidInput(format!("{raw}: {e}")))?;

    let clients = host.window_clients().await?;
    let existing = clients
        .iter()
        .find(|c| resolve(origin, &c.url).is_ok_and(|u| u == target));
    match existing {
        Some(client) => host.focus(&client.id).await,
        None => host.open_window(target.as_str()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::HeadlessHost;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let n = parse_push(Some(r#"{"notification": {"title": "Hi"}}"#.as_bytes())).unwrap();
        assert_eq!(n.title, "Hi");
        assert_eq!(n.body, DEFAULT_BODY);
        assert_eq!(n.icon, DEFAULT_ICON);
        assert_eq!(n.url, DEFAULT_URL);

        let bare = parse_push(Some("{}".as_bytes())).unwrap();
        assert_eq!(bare.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_full_payload() {
        let payload = r#"{"notification": {"title": "T", "body": "B", "image": "/i.png", "click_action": "/inbox"}}"#.as_bytes();
        let n = parse_push(Some(payload)).unwrap();
        assert_eq!(n, Notification { title: "T".into(), body: "B".into(), icon: "/i.png".into(), url: "/inbox".into() });
    }

    #[test]
    fn test_empty_or_malformed_dropped() {
        assert!(parse_push(None).is_none());
        assert!(parse_push(Some("".as_bytes())).is_none());
        assert!(parse_push(Some("not json".as_bytes())).is_none());
    }

    #[tokio::test]
    async fn test_push_shows_notification() {
        let host = HeadlessHost::new();
        assert!(handle_push(&host, Some(r#"{"notification": {}}"#.as_bytes())).await);
        assert!(!handle_push(&host, None).await);
        assert_eq!(host.notifications().len(), 1);
    }

    fn origin() -> Url {
        Url::parse("https://example.com").unwrap()
    }

    #[tokio::test]
    async fn test_click_opens_then_focuses() {
        let host = HeadlessHost::new();
        handle_notification_click(&host, &origin(), Some("/inbox")).await.unwrap();
        handle_notification_click(&host, &origin(), Some("/inbox")).await.unwrap();
        handle_notification_click(&host, &origin(), None).await.unwrap();

        let urls: Vec<_> = host.window_clients().await.unwrap().into_iter().map(|c| c.url).collect();
        assert_eq!(urls, vec!["https://example.com/inbox", "https://example.com/"]);
    }

    #[tokio::test]
    async fn test_click_focuses_window_reported_with_absolute_url() {
        let host = HeadlessHost::new();
        host.open_window("https://example.com/inbox").await.unwrap();

        handle_notification_click(&host, &origin(), Some("/inbox")).await.unwrap();
        assert_eq!(host.window_clients().await.unwrap().len(), 1);

        handle_notification_click(&host, &origin(), Some("https://example.com/inbox#top")).await.unwrap();
        assert_eq!(host.window_clients().await.unwrap().len(), 1);
    }
}
