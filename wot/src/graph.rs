//! The follow-graph collaborator.

use async_trait::async_trait;
use modhub_types::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::GraphError;

/// One `source follows target` relation, as read from a follow-list event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FollowEdge {
    pub source: PublicKey,
    pub target: PublicKey,
}

/// Read access to the social graph on the federated network.
///
/// Implementations wrap a relay client. A key with no published list yields
/// an empty set; errors are reserved for transport failures.
#[async_trait]
pub trait GraphQuery: Send + Sync {
    /// Keys followed by `pubkey`.
    async fn follow_list(&self, pubkey: &PublicKey) -> Result<BTreeSet<PublicKey>, GraphError>;

    /// Keys muted by `pubkey`. Defaults to none.
    async fn mute_list(&self, _pubkey: &PublicKey) -> Result<BTreeSet<PublicKey>, GraphError> {
        Ok(BTreeSet::new())
    }
}

#[async_trait]
impl<G: GraphQuery + ?Sized> GraphQuery for Arc<G> {
    async fn follow_list(&self, pubkey: &PublicKey) -> Result<BTreeSet<PublicKey>, GraphError> {
        (**self).follow_list(pubkey).await
    }

    async fn mute_list(&self, pubkey: &PublicKey) -> Result<BTreeSet<PublicKey>, GraphError> {
        (**self).mute_list(pubkey).await
    }
}
