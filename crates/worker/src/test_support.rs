//! In-process network double for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use swcache_core::Error;
use url::Url;

use crate::fetch::{Network, Request, Response, ResponseKind, ResponseSource, resolve};

pub(crate) const ORIGIN: &str = "https://example.com";

/// Serves scripted responses by absolute URL and records every call.
pub(crate) struct ScriptedNetwork {
    origin: Url,
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self {
            origin: Url::parse(ORIGIN).unwrap(),
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &'static str) {
        let response = response(&self.absolute(url), status, body);
        self.respond_with(url, response);
    }

    pub(crate) fn respond_with(&self, url: &str, response: Response) {
        let key = self.absolute(url);
        self.routes.lock().unwrap().insert(key, response);
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn absolute(&self, url: &str) -> String {
        resolve(&self.origin, url).unwrap().to_string()
    }
}

pub(crate) fn response(url: &str, status: u16, body: &'static str) -> Response {
    Response {
        url: url.to_string(),
        status,
        status_text: if status == 200 { "OK".into() } else { String::new() },
        headers: vec![("content-type".into(), "text/plain".into())],
        body: Bytes::from_static(body.as_bytes()),
        kind: ResponseKind::Basic,
        redirected: false,
        source: ResponseSource::Network,
    }
}

#[async_trait::async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = self.absolute(&request.url);
        self.calls.lock().unwrap().push(url.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{url}: offline")));
        }
        let routed = self.routes.lock().unwrap().get(&url).cloned();
        Ok(routed.unwrap_or_else(|| response(&url, 404, "not found")))
    }
}
