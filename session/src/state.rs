//! Session state and the events published when it changes.

use modhub_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Availability of the aggregation server as seen by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    /// No server configured, or explicitly disabled.
    Disabled,
    /// A server URL is set and the first health check is pending.
    Initializing,
    /// The server passed its last health check; requests are allowed.
    Active,
    /// The server was given up on. Only an explicit health check or a new
    /// URL leaves this state.
    Inactive,
    /// The retry loop is probing the server with exponential backoff.
    Retrying,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Retrying => "retrying",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested state change.
///
/// `Retry` is not a state of its own: requesting it moves the session to
/// [`ServerState::Retrying`] and starts the retry loop, or does nothing if
/// the session is already retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(ServerState),
    Retry,
}

/// Notifications published to session subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session entered a new state.
    StateChange(ServerState),
    /// Retry attempt counter; `0` when the retry loop ends.
    Retry(u32),
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: ServerState,
    pub retry_count: u32,
    pub server_url: Option<String>,
    /// Wall-clock time of the last completed health check.
    pub last_checked: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_are_lowercase() {
        assert_eq!(ServerState::Retrying.to_string(), "retrying");
        assert_eq!(
            serde_json::to_string(&ServerState::Initializing).unwrap(),
            "\"initializing\""
        );
    }

    #[test]
    fn status_serializes_all_fields() {
        let status = SessionStatus {
            state: ServerState::Active,
            retry_count: 0,
            server_url: Some("https://agg.example".into()),
            last_checked: Some(Timestamp::new(10)),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["last_checked"], 10);
    }
}
