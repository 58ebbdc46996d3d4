//! Session configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::SessionError;

/// Tunables of the aggregation session.
///
/// Loaded from the `[session]` table of the hub config file or built
/// programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Server used when nothing has been persisted yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_server_url: Option<String>,

    /// Settings-store key the server URL is persisted under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Timeout of a single `GET /health`.
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,

    /// Minimum spacing between two health checks.
    #[serde(default = "default_health_min_interval_secs")]
    pub health_min_interval_secs: u64,

    /// First retry delay.
    #[serde(default = "default_backoff_initial_secs")]
    pub backoff_initial_secs: u64,

    /// Retry delay multiplier.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,

    /// Retry delay ceiling; reaching it ends the retry loop.
    #[serde(default = "default_backoff_ceiling_secs")]
    pub backoff_ceiling_secs: u64,

    /// Timeout of content requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Buffered events per subscriber before slow subscribers lag.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_storage_key() -> String {
    "serverUrl".to_string()
}

fn default_health_timeout_secs() -> u64 {
    10
}

fn default_health_min_interval_secs() -> u64 {
    5
}

fn default_backoff_initial_secs() -> u64 {
    5
}

fn default_backoff_factor() -> u32 {
    3
}

fn default_backoff_ceiling_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_event_capacity() -> usize {
    64
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if let Some(url) = &self.default_server_url {
            if !url.trim().is_empty() {
                normalize_server_url(url)
                    .map_err(|e| SessionError::Config(format!("default_server_url: {e}")))?;
            }
        }
        if self.storage_key.is_empty() {
            return Err(SessionError::Config("storage_key must not be empty".into()));
        }
        if self.backoff_factor < 2 {
            return Err(SessionError::Config("backoff_factor must be at least 2".into()));
        }
        if self.backoff_initial_secs == 0 || self.backoff_initial_secs >= self.backoff_ceiling_secs {
            return Err(SessionError::Config(
                "backoff_initial_secs must be positive and below backoff_ceiling_secs".into(),
            ));
        }
        if self.health_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(SessionError::Config("timeouts must be positive".into()));
        }
        if self.event_capacity == 0 {
            return Err(SessionError::Config("event_capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn health_min_interval(&self) -> Duration {
        Duration::from_secs(self.health_min_interval_secs)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_secs(self.backoff_initial_secs)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_secs(self.backoff_ceiling_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_server_url: None,
            storage_key: default_storage_key(),
            health_timeout_secs: default_health_timeout_secs(),
            health_min_interval_secs: default_health_min_interval_secs(),
            backoff_initial_secs: default_backoff_initial_secs(),
            backoff_factor: default_backoff_factor(),
            backoff_ceiling_secs: default_backoff_ceiling_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Validate a user-supplied server URL and bring it to canonical form
/// (trimmed, no trailing slash). Only absolute `http`/`https` URLs with a
/// host are accepted.
pub fn normalize_server_url(raw: &str) -> Result<String, SessionError> {
    let trimmed = raw.trim();
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| SessionError::InvalidServerUrl(format!("{trimmed}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SessionError::InvalidServerUrl(format!(
            "{trimmed}: unsupported scheme {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(SessionError::InvalidServerUrl(format!("{trimmed}: missing host")));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
