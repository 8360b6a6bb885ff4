//! The pages and notification surface the worker serves.

use std::sync::Mutex;

use serde::Serialize;
use swcache_core::Error;

/// An open page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}

/// A notification to surface to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    /// Opened or focused when the notification is clicked.
    pub url: String,
}

/// Host environment operations the worker calls into.
#[async_trait::async_trait]
pub trait ClientHost: Send + Sync {
    /// Take control of every open page.
    async fn claim(&self) -> Result<(), Error>;

    /// Open pages, including ones not yet controlled.
    async fn window_clients(&self) -> Result<Vec<WindowClient>, Error>;

    async fn focus(&self, client_id: &str) -> Result<(), Error>;

    async fn open_window(&self, url: &str) -> Result<(), Error>;

    async fn show_notification(&self, notification: &Notification) -> Result<(), Error>;
}

/// A host with no pages.
///
/// Claims succeed trivially, notifications are logged and kept for
/// inspection, and opened windows are recorded as clients.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    clients: Mutex<Vec<WindowClient>>,
    notifications: Mutex<Vec<Notification>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().map(|n| n.clone()).unwrap_or_default()
    }

    fn lock_err<T>(_: T) -> Error {
        Error::Host("host state lock poisoned".into())
    }
}

#[async_trait::async_trait]
impl ClientHost for HeadlessHost {
    async fn claim(&self) -> Result<(), Error> {
        tracing::debug!("claimed clients");
        Ok(())
    }

    async fn window_clients(&self) -> Result<Vec<WindowClient>, Error> {
        Ok(self.clients.lock().map_err(Self::lock_err)?.clone())
    }

    async fn focus(&self, client_id: &str) -> Result<(), Error> {
        let clients = self.clients.lock().map_err(Self::lock_err)?;
        if clients.iter().any(|c| c.id == client_id) {
            tracing::info!(client_id, "focused client");
            Ok(())
        } else {
            Err(Error::Host(format!("no client with id {client_id}")))
        }
    }

    async fn open_window(&self, url: &str) -> Result<(), Error> {
        let mut clients = self.clients.lock().map_err(Self::lock_err)?;
        let id = format!("window-{}", clients.len() + 1);
        tracing::info!(url, id = %id, "opened window");
        clients.push(WindowClient { id, url: url.to_string() });
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<(), Error> {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            url = %notification.url,
            "notification"
        );
        self.notifications
            .lock()
            .map_err(Self::lock_err)?
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_headless_host_records_windows() {
        let host = HeadlessHost::new();
        assert!(host.window_clients().await.unwrap().is_empty());

        host.open_window("/inbox").await.unwrap();
        let clients = host.window_clients().await.unwrap();
        assert_eq!(clients, vec![WindowClient { id: "window-1".into(), url: "/inbox".into() }]);

        host.focus("window-1").await.unwrap();
        assert!(matches!(host.focus("window-9").await, Err(Error::Host(_))));
    }

    #[tokio::test]
    async fn test_headless_host_keeps_notifications() {
        let host = HeadlessHost::new();
        let n = Notification { title: "t".into(), body: "b".into(), icon: "/i.png".into(), url: "/".into() };
        host.show_notification(&n).await.unwrap();
        assert_eq!(host.notifications(), vec![n]);
    }
}
