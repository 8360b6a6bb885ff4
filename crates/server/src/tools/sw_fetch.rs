//! sw_fetch tool implementation.
//!
//! Sends a request through the worker as a page would, so the configured
//! rules and strategies decide between cache and network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::Error;
use swcache_worker::{Credentials, Event, Method, Request, RequestMode, WorkerContext};

use super::json_result;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path relative to the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests use the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "no-cors" (default), "cors" or "same-origin".
    #[serde(default)]
    pub mode: Option<String>,

    /// Credentials policy: "same-origin" (default), "include" or "omit".
    #[serde(default)]
    pub credentials: Option<String>,

    /// Extra request headers.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// "network", "cache" or "synthetic".
    pub source: String,
    /// "basic", "cors", "opaque" or "default".
    pub kind: String,
    pub redirected: bool,
    /// Strategy the rules selected, if the request was cacheable.
    pub strategy: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
}

fn parse_mode(mode: Option<&str>) -> Result<RequestMode, Error> {
    match mode.unwrap_or("no-cors") {
        "no-cors" => Ok(RequestMode::NoCors),
        "cors" => Ok(RequestMode::Cors),
        "same-origin" => Ok(RequestMode::SameOrigin),
        other => Err(Error::InvalidInput(format!("unsupported mode: {other}"))),
    }
}

fn parse_credentials(credentials: Option<&str>) -> Result<Credentials, Error> {
    match credentials.unwrap_or("same-origin") {
        "same-origin" => Ok(Credentials::SameOrigin),
        "include" => Ok(Credentials::Include),
        "omit" => Ok(Credentials::Omit),
        other => Err(Error::InvalidInput(format!("unsupported credentials: {other}"))),
    }
}

fn label<T: Serialize>(value: T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(ctx: &WorkerContext, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let method = Method::from_bytes(params.method.to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", params.method)))?;

    let mut request = Request::new(method, params.url.clone())
        .with_mode(parse_mode(params.mode.as_deref())?)
        .with_credentials(parse_credentials(params.credentials.as_deref())?);
    request.headers = params.headers;

    let strategy = if request.is_get() { ctx.matcher().classify(&request.url) } else { None };

    let response = ctx
        .dispatch(Event::Fetch(request))
        .await?
        .ok_or_else(|| Error::InvalidInput("fetch produced no response".into()))?;

    let output = SwFetchOutput {
        url: response.url.clone(),
        status: response.status,
        status_text: response.status_text.clone(),
        source: label(response.source),
        kind: label(response.kind),
        redirected: response.redirected,
        strategy: strategy.map(|s| s.as_str().to_string()),
        headers: response.headers.clone(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
    };

    json_result(&output)
}
