use modhub_types::PublicKey;
use modhub_utils::CancelReason;
use thiserror::Error;

/// Failure of a single graph query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("relay query failed: {0}")]
    Transport(String),

    #[error("malformed list event from {pubkey}: {reason}")]
    Malformed { pubkey: PublicKey, reason: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum WotError {
    #[error("invalid trust config: {0}")]
    InvalidConfig(String),

    #[error("follow list of root {pubkey} unavailable: {source}")]
    RootFetch {
        pubkey: PublicKey,
        #[source]
        source: GraphError,
    },

    #[error("trust computation cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("invalid graph snapshot: {0}")]
    Snapshot(String),
}
