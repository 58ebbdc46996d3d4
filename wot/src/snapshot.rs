//! A follow graph loaded from a JSON snapshot.
//!
//! Snapshots let the scorer run offline, e.g. from the CLI against a graph
//! exported from a relay. Format:
//!
//! ```json
//! {
//!   "follows": { "<hex>": ["<hex>", "..."] },
//!   "mutes":   { "<hex>": ["<hex>"] }
//! }
//! ```

use async_trait::async_trait;
use modhub_types::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::{FollowEdge, GraphError, GraphQuery, WotError};

/// An in-memory follow/mute graph. Unknown keys have empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotGraph {
    #[serde(default)]
    follows: BTreeMap<PublicKey, BTreeSet<PublicKey>>,
    #[serde(default)]
    mutes: BTreeMap<PublicKey, BTreeSet<PublicKey>>,
}

impl SnapshotGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, WotError> {
        serde_json::from_str(json).map_err(|e| WotError::Snapshot(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WotError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| WotError::Snapshot(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Record that `source` follows `target`.
    pub fn follow(&mut self, source: PublicKey, target: PublicKey) -> &mut Self {
        self.follows.entry(source).or_default().insert(target);
        self
    }

    /// Record that `source` mutes `target`.
    pub fn mute(&mut self, source: PublicKey, target: PublicKey) -> &mut Self {
        self.mutes.entry(source).or_default().insert(target);
        self
    }

    /// Every follow edge, in (source, target) order.
    pub fn edges(&self) -> impl Iterator<Item = FollowEdge> + '_ {
        self.follows.iter().flat_map(|(source, targets)| {
            targets.iter().map(|target| FollowEdge {
                source: *source,
                target: *target,
            })
        })
    }
}

#[async_trait]
impl GraphQuery for SnapshotGraph {
    async fn follow_list(&self, pubkey: &PublicKey) -> Result<BTreeSet<PublicKey>, GraphError> {
        Ok(self.follows.get(pubkey).cloned().unwrap_or_default())
    }

    async fn mute_list(&self, pubkey: &PublicKey) -> Result<BTreeSet<PublicKey>, GraphError> {
        Ok(self.mutes.get(pubkey).cloned().unwrap_or_default())
    }
}
