use modhub_store::StoreError;
use modhub_utils::CancelReason;
use thiserror::Error;

use crate::ServerState;

/// Failure of a single HTTP exchange, before any status code is seen.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP request failed: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("aggregation server not active (state: {0})")]
    NotActive(ServerState),

    #[error("invalid server url: {0}")]
    InvalidServerUrl(String),

    #[error("query payload too large for the aggregation server")]
    PayloadTooLarge,

    #[error("failed to fetch from aggregation server: {0}")]
    Fetch(String),

    #[error("health check failed: {0}")]
    Health(String),

    #[error("request cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("failed to encode request: {0}")]
    Encode(String),

    #[error("invalid session config: {0}")]
    Config(String),

    #[error("settings store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Whether this is a routine cancellation that callers should ignore
    /// rather than report.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
