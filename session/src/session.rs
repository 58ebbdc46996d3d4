//! The aggregation server session.

use modhub_store::KeyValueStore;
use modhub_types::Timestamp;
use modhub_utils::{format_duration, Backoff, CancelReason, CancellationToken};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    normalize_server_url, HealthResponse, HttpResponse, HttpTransport, InFlightRegistry,
    PaginatedEventsRequest, PaginatedEventsResponse, ServerState, SessionConfig, SessionError,
    SessionEvent, SessionStatus, Transition,
};

/// Registry key of the games listing.
const GAMES_KEY: &str = "games";

/// Handle to an aggregation server session.
///
/// Cheap to clone; all clones share the same state, retry loop and
/// in-flight requests.
#[derive(Clone)]
pub struct AggregationSession {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn KeyValueStore>,
    core: Mutex<Core>,
    /// Lock order: `core` before `requests`.
    requests: Mutex<InFlightRegistry>,
    events: broadcast::Sender<SessionEvent>,
}

struct Core {
    state: ServerState,
    retry_count: u32,
    server_url: Option<String>,
    last_checked: Option<Timestamp>,
    last_check_started: Option<Instant>,
    /// Token of the health check in flight, if any.
    health_check: Option<CancellationToken>,
    /// Token of the running retry loop, if any.
    retry_loop: Option<CancellationToken>,
}

impl Inner {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn requests(&self) -> MutexGuard<'_, InFlightRegistry> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Clears the in-flight health check marker when the check ends, including
/// when its future is dropped.
struct CheckGuard<'a> {
    inner: &'a Inner,
    token: CancellationToken,
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        let mut core = self.inner.core();
        if core
            .health_check
            .as_ref()
            .is_some_and(|current| current.same_as(&self.token))
        {
            core.health_check = None;
        }
    }
}

/// Releases a request's registry entry when the request ends, including
/// when the caller drops its future.
struct FlightGuard<'a> {
    inner: &'a Inner,
    key: &'a str,
    generation: u64,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.inner.requests().finish(self.key, self.generation);
    }
}

enum Outbound<'a> {
    Get {
        path: String,
        query: &'a [(&'a str, &'a str)],
    },
    Post {
        path: &'static str,
        body: serde_json::Value,
    },
}

impl AggregationSession {
    /// Open a session.
    ///
    /// Restores the persisted server URL (or falls back to
    /// `config.default_server_url`) and, if there is one, runs the first
    /// health check before returning.
    pub async fn open(
        config: SessionConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);
        let session = Self {
            inner: Arc::new(Inner {
                config,
                transport,
                store,
                core: Mutex::new(Core {
                    state: ServerState::Disabled,
                    retry_count: 0,
                    server_url: None,
                    last_checked: None,
                    last_check_started: None,
                    health_check: None,
                    retry_loop: None,
                }),
                requests: Mutex::new(InFlightRegistry::new()),
                events,
            }),
        };

        let Some(url) = session.initial_url() else {
            info!("aggregation server disabled");
            return Ok(session);
        };
        info!(url = %url, "opening aggregation session");
        session.inner.core().server_url = Some(url);
        session.transition(Transition::To(ServerState::Initializing));
        session.check_health().await;
        Ok(session)
    }

    /// The URL to start with: the persisted one, else the configured default.
    fn initial_url(&self) -> Option<String> {
        let candidate = match self.load_stored_url() {
            Some(stored) if stored.is_empty() => return None,
            Some(stored) => stored,
            None => self.inner.config.default_server_url.clone()?,
        };
        if candidate.trim().is_empty() {
            return None;
        }
        match normalize_server_url(&candidate) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "ignoring unusable server url");
                None
            }
        }
    }

    fn load_stored_url(&self) -> Option<String> {
        let key = &self.inner.config.storage_key;
        match self.inner.store.get(key) {
            Ok(Some(raw)) => match serde_json::from_str::<String>(&raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(key = %key, error = %e, "stored server url is corrupt, ignoring");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to read stored server url");
                None
            }
        }
    }

    fn persist_url(&self, url: &str) {
        let key = &self.inner.config.storage_key;
        let result = serde_json::to_string(url)
            .map_err(|e| SessionError::Encode(e.to_string()))
            .and_then(|encoded| {
                self.inner
                    .store
                    .set(key, &encoded)
                    .map_err(SessionError::from)
            });
        if let Err(e) = result {
            warn!(key = %key, error = %e, "failed to persist server url");
        }
    }

    // ── Configuration ──────────────────────────────────────────────────

    /// Point the session at a new server.
    ///
    /// An empty URL disables the session. An unusable URL is rejected
    /// without touching the current URL or state. Otherwise all pending
    /// work against the previous server is cancelled, the URL is persisted
    /// and a health check runs; the resulting state is returned.
    pub async fn set_server_url(&self, raw: &str) -> Result<ServerState, SessionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.disable();
            return Ok(ServerState::Disabled);
        }
        let url = normalize_server_url(trimmed)?;

        {
            let mut core = self.inner.core();
            if let Some(check) = core.health_check.take() {
                check.cancel(CancelReason::Superseded);
            }
            core.last_check_started = None;
            core.server_url = Some(url.clone());
        }
        let cancelled = self.inner.requests().cancel_all(CancelReason::Superseded);
        info!(url = %url, cancelled, "aggregation server url changed");

        self.persist_url(&url);
        self.transition(Transition::To(ServerState::Initializing));
        Ok(self.check_health().await)
    }

    /// Stop using the aggregation server and remember that choice.
    pub fn disable(&self) {
        {
            let mut core = self.inner.core();
            if let Some(check) = core.health_check.take() {
                check.cancel(CancelReason::Disabled);
            }
            if let Some(retry) = &core.retry_loop {
                retry.cancel(CancelReason::Disabled);
            }
            core.server_url = None;
            core.last_check_started = None;
        }
        let cancelled = self.inner.requests().cancel_all(CancelReason::Disabled);
        info!(cancelled, "aggregation server disabled");
        self.persist_url("");
        self.transition(Transition::To(ServerState::Disabled));
    }

    /// Cancel all pending work without changing the persisted settings.
    pub fn shutdown(&self) {
        {
            let mut core = self.inner.core();
            if let Some(check) = core.health_check.take() {
                check.cancel(CancelReason::Shutdown);
            }
            if let Some(retry) = core.retry_loop.take() {
                retry.cancel(CancelReason::Shutdown);
            }
        }
        self.inner.requests().cancel_all(CancelReason::Shutdown);
        debug!("aggregation session shut down");
    }

    // ── State machine ──────────────────────────────────────────────────

    fn transition(&self, transition: Transition) {
        let next = match transition {
            Transition::Retry | Transition::To(ServerState::Retrying) => ServerState::Retrying,
            Transition::To(state) => state,
        };

        let mut events = Vec::with_capacity(2);
        let mut spawn = None;
        {
            let mut core = self.inner.core();
            if core.state == next {
                return;
            }
            let previous = core.state;
            if previous == ServerState::Retrying {
                if let Some(retry) = core.retry_loop.take() {
                    retry.cancel(CancelReason::RetryStopped);
                }
            }
            core.state = next;
            events.push(SessionEvent::StateChange(next));
            debug!(from = %previous, to = %next, "aggregation session state change");

            if next == ServerState::Retrying {
                let token = CancellationToken::new();
                core.retry_loop = Some(token.clone());
                spawn = Some(token);
            } else if previous == ServerState::Retrying {
                core.retry_count = 0;
                events.push(SessionEvent::Retry(0));
            }
        }

        for event in events {
            self.inner.emit(event);
        }
        if let Some(token) = spawn {
            tokio::spawn(self.clone().retry_loop(token));
        }
    }

    /// Only act on a request outcome if the session is still active; a
    /// response that lands after a state change must not override it.
    fn transition_if_active(&self, transition: Transition) {
        if self.state() == ServerState::Active {
            self.transition(transition);
        }
    }

    async fn retry_loop(self, token: CancellationToken) {
        let config = &self.inner.config;
        let mut backoff = Backoff::new(
            config.backoff_initial(),
            config.backoff_factor,
            config.backoff_ceiling(),
        );

        while !token.is_cancelled() {
            let attempt = {
                let mut core = self.inner.core();
                core.retry_count += 1;
                core.retry_count
            };
            self.inner.emit(SessionEvent::Retry(attempt));
            debug!(
                attempt,
                next_delay = %format_duration(backoff.current()),
                "retrying aggregation server"
            );

            if self.check_health().await == ServerState::Active {
                break;
            }
            if token.run(tokio::time::sleep(backoff.current())).await.is_err() {
                break;
            }
            if backoff.advance().is_none() {
                if !token.is_cancelled() {
                    warn!(attempts = attempt, "aggregation server unreachable, giving up");
                    self.transition(Transition::To(ServerState::Inactive));
                }
                break;
            }
        }
        debug!(reason = ?token.reason(), "retry loop ended");
    }

    // ── Health ─────────────────────────────────────────────────────────

    /// Probe `GET {url}/health` and update the state from the result.
    ///
    /// A no-op (returning the current state) when the session is disabled,
    /// a check is already running, or the previous check started less than
    /// the minimum interval ago.
    pub async fn check_health(&self) -> ServerState {
        let (url, guard) = {
            let mut core = self.inner.core();
            let url = match (&core.server_url, core.state) {
                (_, ServerState::Disabled) | (None, _) => return core.state,
                (Some(url), _) => url.clone(),
            };
            if core.health_check.is_some() {
                debug!("health check already in flight");
                return core.state;
            }
            if let Some(started) = core.last_check_started {
                if started.elapsed() < self.inner.config.health_min_interval() {
                    debug!("health check skipped, checked recently");
                    return core.state;
                }
            }
            let token = CancellationToken::new();
            core.health_check = Some(token.clone());
            core.last_check_started = Some(Instant::now());
            (
                url,
                CheckGuard {
                    inner: &self.inner,
                    token,
                },
            )
        };

        let result = guard.token.run(self.probe(&url)).await;
        drop(guard);

        match result {
            Err(reason) => {
                debug!(%reason, "health check cancelled");
            }
            Ok(Ok(())) => {
                self.inner.core().last_checked = Some(Timestamp::now());
                debug!(url = %url, "aggregation server healthy");
                self.transition(Transition::To(ServerState::Active));
            }
            Ok(Err(e)) => {
                self.inner.core().last_checked = Some(Timestamp::now());
                warn!(url = %url, error = %e, "aggregation server health check failed");
                self.transition(Transition::Retry);
            }
        }
        self.state()
    }

    async fn probe(&self, url: &str) -> Result<(), SessionError> {
        let timeout = self.inner.config.health_timeout();
        let response = tokio::time::timeout(
            timeout,
            self.inner
                .transport
                .get(&format!("{url}/health"), &[], timeout),
        )
        .await
        .map_err(|_| SessionError::Health(format!("timed out after {}", format_duration(timeout))))?
        .map_err(|e| SessionError::Health(e.to_string()))?;

        if response.status != 200 {
            return Err(SessionError::Health(format!("HTTP status {}", response.status)));
        }
        let health: HealthResponse = response
            .json()
            .map_err(|e| SessionError::Health(format!("invalid health response: {e}")))?;
        if !health.is_ok() {
            return Err(SessionError::Health(format!(
                "server reported status {:?}",
                health.status
            )));
        }
        Ok(())
    }

    // ── Requests ───────────────────────────────────────────────────────

    /// Issue one request under `key` without any effect on the session
    /// state.
    async fn exchange(&self, key: &str, outbound: Outbound<'_>) -> Result<HttpResponse, SessionError> {
        // Registered under the core lock so a concurrent `disable` either
        // sees this request or is seen by it.
        let (url, flight) = {
            let core = self.inner.core();
            let url = match (&core.server_url, core.state) {
                (Some(url), ServerState::Active) => url.clone(),
                (_, state) => return Err(SessionError::NotActive(state)),
            };
            (url, self.inner.requests().begin(key))
        };
        let guard = FlightGuard {
            inner: &self.inner,
            key,
            generation: flight.generation,
        };
        let timeout = self.inner.config.request_timeout();
        let transport = &self.inner.transport;
        let call = async {
            match &outbound {
                Outbound::Get { path, query } => {
                    transport.get(&format!("{url}{path}"), query, timeout).await
                }
                Outbound::Post { path, body } => {
                    transport
                        .post_json(&format!("{url}{path}"), body, timeout)
                        .await
                }
            }
        };
        let result = flight.token.run(tokio::time::timeout(timeout, call)).await;
        drop(guard);

        let response = match result {
            Err(reason) => return Err(SessionError::Cancelled(reason)),
            Ok(Err(_)) => {
                return Err(SessionError::Fetch(format!(
                    "request timed out after {}",
                    format_duration(timeout)
                )))
            }
            Ok(Ok(Err(e))) => return Err(SessionError::Fetch(e.to_string())),
            Ok(Ok(Ok(response))) => response,
        };
        match response.status {
            413 => Err(SessionError::PayloadTooLarge),
            _ if response.is_success() => Ok(response),
            status => Err(SessionError::Fetch(format!("HTTP status {status}"))),
        }
    }

    /// [`exchange`](Self::exchange), feeding failures into the state machine.
    async fn send(&self, key: &str, outbound: Outbound<'_>) -> Result<HttpResponse, SessionError> {
        self.exchange(key, outbound)
            .await
            .map_err(|e| self.observe_failure(key, e))
    }

    fn observe_failure(&self, key: &str, error: SessionError) -> SessionError {
        match &error {
            SessionError::PayloadTooLarge => {
                warn!(key, "query too large for aggregation server, deactivating");
                self.transition_if_active(Transition::To(ServerState::Inactive));
            }
            SessionError::Fetch(message) => {
                warn!(key, error = %message, "aggregation request failed");
                self.transition_if_active(Transition::Retry);
            }
            SessionError::Cancelled(reason) => debug!(key, %reason, "aggregation request cancelled"),
            _ => {}
        }
        error
    }

    /// Fetch a page of events. A newer fetch under the same `key` cancels
    /// this one.
    pub async fn fetch(
        &self,
        key: &str,
        request: &PaginatedEventsRequest,
    ) -> Result<PaginatedEventsResponse, SessionError> {
        let body = serde_json::to_value(request).map_err(|e| SessionError::Encode(e.to_string()))?;
        let response = self
            .send(
                key,
                Outbound::Post {
                    path: "/paginated-events",
                    body,
                },
            )
            .await?;
        response.json().map_err(|e| {
            self.observe_failure(key, SessionError::Fetch(format!("invalid response body: {e}")))
        })
    }

    /// List the games known to the server.
    pub async fn games(&self, sort: &str, source: &str) -> Result<Vec<String>, SessionError> {
        let query = [("sort", sort), ("source", source)];
        let response = self
            .send(
                GAMES_KEY,
                Outbound::Get {
                    path: "/games".to_string(),
                    query: &query,
                },
            )
            .await?;
        response.json().map_err(|e| {
            self.observe_failure(GAMES_KEY, SessionError::Fetch(format!("invalid response body: {e}")))
        })
    }

    /// Ask the server to drop an event. Best effort: failures are logged
    /// and do not affect the session state.
    pub async fn delete(&self, event_id: &str) {
        let key = format!("delete:{event_id}");
        let outbound = Outbound::Get {
            path: format!("/delete/{event_id}"),
            query: &[],
        };
        match self.exchange(&key, outbound).await {
            Ok(_) => debug!(event_id, "delete forwarded to aggregation server"),
            Err(e) => debug!(event_id, error = %e, "delete not forwarded"),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn state(&self) -> ServerState {
        self.inner.core().state
    }

    pub fn status(&self) -> SessionStatus {
        let core = self.inner.core();
        SessionStatus {
            state: core.state,
            retry_count: core.retry_count,
            server_url: core.server_url.clone(),
            last_checked: core.last_checked,
        }
    }

    pub fn server_url(&self) -> Option<String> {
        self.inner.core().server_url.clone()
    }

    /// Number of requests currently registered as in flight.
    pub fn pending_requests(&self) -> usize {
        self.inner.requests().len()
    }

    pub fn retry_count(&self) -> u32 {
        self.inner.core().retry_count
    }

    pub fn is_active(&self) -> bool {
        self.state() == ServerState::Active
    }

    /// Whether consumers should query relays directly instead: the server
    /// is off, given up on, or has failed more than two retries in a row.
    pub fn is_relay_fallback_active(&self) -> bool {
        let core = self.inner.core();
        match core.state {
            ServerState::Retrying => core.retry_count > 2,
            ServerState::Inactive | ServerState::Disabled => true,
            ServerState::Initializing | ServerState::Active => false,
        }
    }

    /// Subscribe to state and retry events. Drop the receiver to
    /// unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for AggregationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationSession")
            .field("status", &self.status())
            .finish()
    }
}
