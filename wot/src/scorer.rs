//! Level-synchronized breadth-first trust traversal.
//!
//! The traversal keeps a frontier of keys first reached at the current depth.
//! All follow lists of a frontier are fetched concurrently, the level settles
//! completely, and only then is the next frontier derived from the results.
//! Because scores strictly decrease with depth, the first level a key is
//! reached at is also its best path; the table still merges with `max` so the
//! merge order within a level does not matter.

use futures_util::stream::{self, StreamExt};
use modhub_types::PublicKey;
use modhub_utils::CancellationToken;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::{GraphError, GraphQuery, TrustScoreTable, WotConfig, WotError};

type LevelResult = (PublicKey, Result<BTreeSet<PublicKey>, GraphError>);

/// Computes [`TrustScoreTable`]s for root identities.
#[derive(Debug, Clone)]
pub struct TrustGraphScorer {
    config: WotConfig,
}

impl TrustGraphScorer {
    /// Create a scorer, validating `config`.
    pub fn new(config: WotConfig) -> Result<Self, WotError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &WotConfig {
        &self.config
    }

    /// Compute the trust table of `root`.
    pub async fn compute<G>(&self, root: PublicKey, graph: &G) -> Result<TrustScoreTable, WotError>
    where
        G: GraphQuery + ?Sized,
    {
        self.compute_with_cancel(root, graph, &CancellationToken::new())
            .await
    }

    /// Compute the trust table of `root`, stopping early if `cancel` fires.
    ///
    /// Fails only if the root's own follow list cannot be fetched or the
    /// computation is cancelled; failures further out drop that branch.
    pub async fn compute_with_cancel<G>(
        &self,
        root: PublicKey,
        graph: &G,
        cancel: &CancellationToken,
    ) -> Result<TrustScoreTable, WotError>
    where
        G: GraphQuery + ?Sized,
    {
        let muted = self.root_mutes(&root, graph, cancel).await?;

        let mut table = TrustScoreTable::new(root, self.config.max_score);
        let mut frontier = vec![root];

        for depth in 0..self.config.max_depth {
            if frontier.is_empty() {
                break;
            }
            let child_score = self.config.score_at_depth(depth + 1);
            debug!(root = %root, depth, frontier = frontier.len(), "expanding trust level");

            let results = cancel
                .run(self.fetch_level(&frontier, graph))
                .await
                .map_err(WotError::Cancelled)?;

            let mut next = BTreeSet::new();
            for (pubkey, result) in results {
                let follows = match result {
                    Ok(follows) => follows,
                    Err(source) if pubkey == root => {
                        return Err(WotError::RootFetch { pubkey, source });
                    }
                    Err(e) => {
                        warn!(pubkey = %pubkey, depth, error = %e, "follow list unavailable, skipping branch");
                        continue;
                    }
                };
                for target in follows {
                    if muted.contains(&target) {
                        continue;
                    }
                    if table.merge_max(target, child_score) {
                        next.insert(target);
                    }
                }
            }
            frontier = next.into_iter().collect();
        }

        info!(root = %root, entries = table.len(), "computed web of trust");
        Ok(table)
    }

    /// Fetch the follow lists of every key in `frontier`, at most
    /// `max_concurrent_queries` at a time, waiting for all of them.
    async fn fetch_level<G>(&self, frontier: &[PublicKey], graph: &G) -> Vec<LevelResult>
    where
        G: GraphQuery + ?Sized,
    {
        stream::iter(frontier.iter().copied())
            .map(move |pubkey| async move {
                let result = graph.follow_list(&pubkey).await;
                (pubkey, result)
            })
            .buffer_unordered(self.config.max_concurrent_queries)
            .collect()
            .await
    }

    /// Keys the root has muted. The root itself is never excluded, and an
    /// unavailable mute list counts as empty.
    async fn root_mutes<G>(
        &self,
        root: &PublicKey,
        graph: &G,
        cancel: &CancellationToken,
    ) -> Result<BTreeSet<PublicKey>, WotError>
    where
        G: GraphQuery + ?Sized,
    {
        match cancel.run(graph.mute_list(root)).await {
            Err(reason) => Err(WotError::Cancelled(reason)),
            Ok(Ok(mut muted)) => {
                muted.remove(root);
                Ok(muted)
            }
            Ok(Err(e)) => {
                warn!(root = %root, error = %e, "mute list unavailable, not excluding any keys");
                Ok(BTreeSet::new())
            }
        }
    }
}
