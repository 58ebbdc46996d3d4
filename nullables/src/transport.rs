//! Nullable HTTP transport: scripted replies per path, every call recorded.

use async_trait::async_trait;
use modhub_session::{HttpResponse, HttpTransport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request seen by the transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    /// Path part of `url`, e.g. `/health`.
    pub path: String,
    /// Query pairs as given by the caller, not encoded.
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// When the call started, on tokio's (possibly paused) clock.
    pub at: Instant,
}

#[derive(Debug, Clone)]
enum Outcome {
    Response(HttpResponse),
    Error(TransportError),
}

#[derive(Debug, Clone)]
struct Reply {
    outcome: Outcome,
    delay: Duration,
}

#[derive(Default)]
struct Script {
    /// Served first, one reply per call.
    once: VecDeque<Reply>,
    /// Served whenever `once` is empty.
    sticky: Option<Reply>,
}

#[derive(Default)]
struct State {
    scripts: HashMap<String, Script>,
    calls: Vec<RecordedCall>,
}

/// A test [`HttpTransport`].
///
/// Replies are scripted per URL path. A path with no script fails with a
/// connection error, like a server that is down. Clones share the script
/// and the call log.
#[derive(Clone, Default)]
pub struct NullTransport {
    state: Arc<Mutex<State>>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `/health` endpoint answers `{"status":"ok"}`.
    pub fn healthy() -> Self {
        let transport = Self::new();
        transport.respond("/health", 200, r#"{"status":"ok"}"#);
        transport
    }

    fn script(&self, path: &str, sticky: bool, outcome: Outcome, delay: Duration) -> &Self {
        let mut state = self.state.lock().unwrap();
        let script = state.scripts.entry(path.to_string()).or_default();
        let reply = Reply { outcome, delay };
        if sticky {
            script.once.clear();
            script.sticky = Some(reply);
        } else {
            script.once.push_back(reply);
        }
        self
    }

    /// Answer every call to `path` with `status` and `body`.
    pub fn respond(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        let outcome = Outcome::Response(HttpResponse::new(status, body));
        self.script(path, true, outcome, Duration::ZERO)
    }

    /// Answer every call to `path` after `delay`.
    pub fn respond_after(
        &self,
        path: &str,
        delay: Duration,
        status: u16,
        body: impl Into<Vec<u8>>,
    ) -> &Self {
        let outcome = Outcome::Response(HttpResponse::new(status, body));
        self.script(path, true, outcome, delay)
    }

    /// Answer the next call to `path` only.
    pub fn respond_once(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        let outcome = Outcome::Response(HttpResponse::new(status, body));
        self.script(path, false, outcome, Duration::ZERO)
    }

    /// Answer the next call to `path` only, after `delay`.
    pub fn respond_once_after(
        &self,
        path: &str,
        delay: Duration,
        status: u16,
        body: impl Into<Vec<u8>>,
    ) -> &Self {
        let outcome = Outcome::Response(HttpResponse::new(status, body));
        self.script(path, false, outcome, delay)
    }

    /// Fail every call to `path` with `error`.
    pub fn fail(&self, path: &str, error: TransportError) -> &Self {
        self.script(path, true, Outcome::Error(error), Duration::ZERO)
    }

    /// Fail every call to `path` with `error` after `delay`.
    pub fn fail_after(&self, path: &str, delay: Duration, error: TransportError) -> &Self {
        self.script(path, true, Outcome::Error(error), delay)
    }

    /// Forget the script of `path`; calls to it fail to connect again.
    pub fn clear(&self, path: &str) -> &Self {
        self.state.lock().unwrap().scripts.remove(path);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls whose path is `path`.
    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.path == path)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    fn record(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Option<Reply> {
        let path = path_of(url);
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            method,
            url: url.to_string(),
            path: path.clone(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.cloned(),
            at: Instant::now(),
        });
        let script = state.scripts.get_mut(&path)?;
        script.once.pop_front().or_else(|| script.sticky.clone())
    }

    async fn answer(&self, url: &str, reply: Option<Reply>) -> Result<HttpResponse, TransportError> {
        let Some(reply) = reply else {
            return Err(TransportError::Connect(format!("nothing listening at {url}")));
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        match reply.outcome {
            Outcome::Response(response) => Ok(response),
            Outcome::Error(error) => Err(error),
        }
    }
}

/// `https://host:port/a/b?x=1` -> `/a/b`.
fn path_of(url: &str) -> String {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = after_scheme
        .find('/')
        .map_or("/", |index| &after_scheme[index..]);
    path.split('?').next().unwrap_or(path).to_string()
}

#[async_trait]
impl HttpTransport for NullTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let reply = self.record(Method::Get, url, query, None);
        self.answer(url, reply).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let reply = self.record(Method::Post, url, &[], Some(body));
        self.answer(url, reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_paths() {
        assert_eq!(path_of("https://agg.example/health"), "/health");
        assert_eq!(path_of("http://127.0.0.1:8080/delete/ab?x=1"), "/delete/ab");
        assert_eq!(path_of("https://agg.example"), "/");
    }

    #[tokio::test]
    async fn once_replies_take_precedence() {
        let transport = NullTransport::healthy();
        transport.respond_once("/health", 503, "busy");
        let timeout = Duration::from_secs(1);

        let first = transport.get("https://a/health", &[], timeout).await.unwrap();
        let second = transport.get("https://a/health", &[], timeout).await.unwrap();
        assert_eq!(first.status, 503);
        assert_eq!(second.status, 200);
        assert_eq!(transport.calls_to("/health").len(), 2);
    }

    #[tokio::test]
    async fn unscripted_path_fails_to_connect() {
        let transport = NullTransport::new();
        let result = transport
            .get("https://a/games", &[("sort", "top")], Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
        assert_eq!(transport.calls()[0].query, vec![("sort".into(), "top".into())]);
    }
}
