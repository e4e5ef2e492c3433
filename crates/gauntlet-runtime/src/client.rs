//! HTTP client for node APIs
//!
//! Every call returns a [`CallOutcome`] instead of an error so callers decide
//! explicitly what a failed request means for them. Bodies are kept as text;
//! JSON is parsed on demand and a non-JSON body is never a failure.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gauntlet_core::NodeDescriptor;
use reqwest::Method;
use serde::Serialize;
use tracing::trace;

use crate::config::NodeConfig;
use crate::error::Result;

/// Header carrying the node API credential
pub const API_TOKEN_HEADER: &str = "X-API-Token";

// ----------------------------------------------------------------------------
// Call Outcome
// ----------------------------------------------------------------------------

/// Why a request produced no HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    Timeout,
    Connect(String),
    Transport(String),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Timeout => f.write_str("request timed out"),
            CallError::Connect(e) => write!(f, "connection failed: {}", e),
            CallError::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CallError::Timeout
        } else if e.is_connect() {
            CallError::Connect(e.to_string())
        } else {
            CallError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// True for any 2xx response
    pub success: bool,
    /// 0 when no response arrived
    pub status_code: u16,
    pub body: String,
    pub error: Option<CallError>,
    pub elapsed: Duration,
}

impl CallOutcome {
    fn failed(error: CallError, elapsed: Duration) -> Self {
        Self {
            success: false,
            status_code: 0,
            body: String::new(),
            error: Some(error),
            elapsed,
        }
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.error, Some(CallError::Timeout))
    }
}

// ----------------------------------------------------------------------------
// Targets
// ----------------------------------------------------------------------------

/// Resolved endpoints of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTarget {
    pub id: String,
    pub http_url: String,
    pub admin_url: String,
    pub http_port: u16,
}

impl NodeTarget {
    pub fn from_descriptor(node: &NodeDescriptor, host: &str) -> Self {
        Self {
            id: node.id.clone(),
            http_url: node.http_base_url(host),
            admin_url: node.admin_base_url(host),
            http_port: node.http_port,
        }
    }
}

// ----------------------------------------------------------------------------
// Node Client
// ----------------------------------------------------------------------------

struct ClientSettings {
    host: String,
    prefix: String,
    api_token: Option<String>,
    timeout: Duration,
}

/// Thin request/response wrapper shared by every component
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    settings: Arc<ClientSettings>,
}

impl NodeClient {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            settings: Arc::new(ClientSettings {
                host: config.api_host.clone(),
                prefix: config.api_prefix.trim_end_matches('/').to_string(),
                api_token: config.api_token.clone(),
                timeout: config.request_timeout(),
            }),
        })
    }

    pub fn host(&self) -> &str {
        &self.settings.host
    }

    pub fn default_timeout(&self) -> Duration {
        self.settings.timeout
    }

    pub fn target(&self, node: &NodeDescriptor) -> NodeTarget {
        NodeTarget::from_descriptor(node, &self.settings.host)
    }

    /// Full URL of an API route on the node's HTTP port
    pub fn api_url(&self, target: &NodeTarget, route: &str) -> String {
        format!("{}{}{}", target.http_url, self.settings.prefix, route)
    }

    pub async fn health(&self, target: &NodeTarget, timeout: Duration) -> CallOutcome {
        let url = format!("{}/health", target.http_url);
        self.send(self.http.get(url).timeout(timeout)).await
    }

    pub async fn node_info(&self, target: &NodeTarget) -> CallOutcome {
        self.get(target, "/node/info").await
    }

    pub async fn neighbor_list(&self, target: &NodeTarget, timeout: Duration) -> CallOutcome {
        let url = self.api_url(target, "/neighbor/list");
        self.send(self.authorized(self.http.get(url)).timeout(timeout)).await
    }

    /// Number of neighbors reported by the node, `None` when unavailable
    pub async fn neighbor_count(&self, target: &NodeTarget, timeout: Duration) -> Option<i64> {
        let outcome = self.neighbor_list(target, timeout).await;
        if !outcome.success {
            return None;
        }
        count_neighbors(&outcome.json()?)
    }

    pub async fn bulletin_publish(&self, target: &NodeTarget, topic: &str, content: &str) -> CallOutcome {
        let body = serde_json::json!({
            "topic": topic,
            "content": content,
            "type": "announcement",
        });
        self.post_json(target, "/bulletin/publish", &body).await
    }

    pub async fn message_send(&self, target: &NodeTarget, to: &str, content: &str) -> CallOutcome {
        let body = serde_json::json!({ "to": to, "content": content });
        self.post_json(target, "/message/send", &body).await
    }

    /// GET an API route, `route` may carry a query string
    pub async fn get(&self, target: &NodeTarget, route: &str) -> CallOutcome {
        let url = self.api_url(target, route);
        self.send(self.authorized(self.http.get(url))).await
    }

    /// GET an API route with url-encoded query parameters
    pub async fn get_query(&self, target: &NodeTarget, route: &str, params: &[(&str, &str)]) -> CallOutcome {
        let url = self.api_url(target, route);
        self.send(self.authorized(self.http.get(url)).query(params)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        target: &NodeTarget,
        route: &str,
        body: &T,
    ) -> CallOutcome {
        let url = self.api_url(target, route);
        self.send(self.authorized(self.http.post(url)).json(body)).await
    }

    /// POST an arbitrary body labelled as JSON
    pub async fn post_raw(&self, target: &NodeTarget, route: &str, body: impl Into<String>) -> CallOutcome {
        let url = self.api_url(target, route);
        let request = self
            .authorized(self.http.post(url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.into());
        self.send(request).await
    }

    /// Request a privileged URL carrying only the given token, if any
    pub async fn privileged(&self, method: Method, url: &str, token: Option<&str>) -> CallOutcome {
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.header(API_TOKEN_HEADER, token);
        }
        self.send(request).await
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.settings.api_token {
            Some(token) => request.header(API_TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> CallOutcome {
        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                trace!(error = %e, "Request failed");
                return CallOutcome::failed(e.into(), started.elapsed());
            }
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                trace!(%status, error = %e, "Response body unreadable");
                String::new()
            }
        };
        CallOutcome {
            success: status.is_success(),
            status_code: status.as_u16(),
            body,
            error: None,
            elapsed: started.elapsed(),
        }
    }
}

fn count_neighbors(json: &serde_json::Value) -> Option<i64> {
    let root = json.get("data").unwrap_or(json);
    if let Some(list) = root.get("neighbors").and_then(|v| v.as_array()) {
        return Some(list.len() as i64);
    }
    if let Some(count) = root.get("count").and_then(|v| v.as_i64()) {
        return Some(count);
    }
    root.as_array().map(|list| list.len() as i64)
}
