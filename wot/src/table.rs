//! The result of a trust computation.

use modhub_types::PublicKey;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Trust score of every key reached from a root.
///
/// Built once by [`TrustGraphScorer`](crate::TrustGraphScorer) and never
/// mutated afterwards: recomputation produces a new table. The root is always
/// present with the maximum score, and every other key was reached within the
/// configured depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct TrustScoreTable {
    root: PublicKey,
    scores: BTreeMap<PublicKey, i64>,
}

/// Wire form of a table, checked before it becomes a [`TrustScoreTable`].
#[derive(Deserialize)]
struct RawTable {
    root: PublicKey,
    scores: BTreeMap<PublicKey, i64>,
}

impl TryFrom<RawTable> for TrustScoreTable {
    type Error = String;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        let Some(&max_score) = raw.scores.get(&raw.root) else {
            return Err(format!("root {} missing from trust table", raw.root));
        };
        if let Some((key, score)) = raw.scores.iter().find(|(_, score)| **score > max_score) {
            return Err(format!(
                "{key} scores {score}, above the root's {max_score}"
            ));
        }
        Ok(Self {
            root: raw.root,
            scores: raw.scores,
        })
    }
}

impl TrustScoreTable {
    pub(crate) fn new(root: PublicKey, max_score: i64) -> Self {
        let mut scores = BTreeMap::new();
        scores.insert(root, max_score);
        Self { root, scores }
    }

    /// Merge a score for `key`, keeping the higher of the existing and new
    /// values. Returns `true` if `key` was not in the table before.
    pub(crate) fn merge_max(&mut self, key: PublicKey, score: i64) -> bool {
        match self.scores.get_mut(&key) {
            Some(existing) => {
                if score > *existing {
                    *existing = score;
                }
                false
            }
            None => {
                self.scores.insert(key, score);
                true
            }
        }
    }

    pub fn root(&self) -> &PublicKey {
        &self.root
    }

    /// The root's score, which is also the highest score in the table.
    pub fn max_score(&self) -> i64 {
        // The root entry exists from construction on and is never removed.
        self.scores[&self.root]
    }

    pub fn get(&self, key: &PublicKey) -> Option<i64> {
        self.scores.get(key).copied()
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.scores.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Always `false`: the root is always present.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PublicKey, i64)> {
        self.scores.iter().map(|(k, v)| (k, *v))
    }

    /// Keys scoring at least `min_score`, in key order.
    pub fn at_least(&self, min_score: i64) -> impl Iterator<Item = &PublicKey> {
        self.scores
            .iter()
            .filter(move |(_, score)| **score >= min_score)
            .map(|(k, _)| k)
    }

    /// Whether `key` is present with a score of at least `min_score`.
    pub fn is_trusted(&self, key: &PublicKey, min_score: i64) -> bool {
        self.get(key).is_some_and(|score| score >= min_score)
    }

    /// Sort `authors` by descending trust. Authors outside the table sort
    /// last; ties break by key so the order is stable across calls.
    pub fn rank(&self, authors: &mut [PublicKey]) {
        authors.sort_by_key(|key| (Reverse(self.get(key)), *key));
    }
}

impl<'a> IntoIterator for &'a TrustScoreTable {
    type Item = (&'a PublicKey, &'a i64);
    type IntoIter = std::collections::btree_map::Iter<'a, PublicKey, i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.scores.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> PublicKey {
        PublicKey::new([n; 32])
    }

    #[test]
    fn root_present_with_max_score() {
        let table = TrustScoreTable::new(key(1), 100);
        assert_eq!(table.root(), &key(1));
        assert_eq!(table.get(&key(1)), Some(100));
        assert_eq!(table.max_score(), 100);
        assert_eq!(table.len(), 1);
        assert!(!table.is_empty());
    }

    #[test]
    fn merge_keeps_maximum() {
        let mut table = TrustScoreTable::new(key(1), 100);
        assert!(table.merge_max(key(2), 25));
        assert!(!table.merge_max(key(2), 50));
        assert!(!table.merge_max(key(2), 10));
        assert_eq!(table.get(&key(2)), Some(50));
    }

    #[test]
    fn merge_never_lowers_root() {
        let mut table = TrustScoreTable::new(key(1), 100);
        assert!(!table.merge_max(key(1), 50));
        assert_eq!(table.max_score(), 100);
    }

    #[test]
    fn at_least_filters_by_score() {
        let mut table = TrustScoreTable::new(key(1), 100);
        table.merge_max(key(2), 50);
        table.merge_max(key(3), 25);
        let trusted: Vec<_> = table.at_least(50).copied().collect();
        assert_eq!(trusted, vec![key(1), key(2)]);
        assert!(table.is_trusted(&key(3), 25));
        assert!(!table.is_trusted(&key(3), 26));
        assert!(!table.is_trusted(&key(9), 0));
    }

    #[test]
    fn rank_orders_by_trust_then_key() {
        let mut table = TrustScoreTable::new(key(1), 100);
        table.merge_max(key(2), 25);
        table.merge_max(key(3), 50);
        table.merge_max(key(4), 50);

        let mut authors = vec![key(9), key(2), key(4), key(1), key(3)];
        table.rank(&mut authors);
        assert_eq!(authors, vec![key(1), key(3), key(4), key(2), key(9)]);
    }

    #[test]
    fn json_uses_hex_keys() {
        let mut table = TrustScoreTable::new(key(1), 100);
        table.merge_max(key(2), 50);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["scores"][key(2).to_hex()], 50);
        let back: TrustScoreTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn decoding_rejects_table_without_root() {
        let json = serde_json::json!({
            "root": key(1).to_hex(),
            "scores": { key(2).to_hex(): 50 },
        });
        let err = serde_json::from_value::<TrustScoreTable>(json).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn decoding_rejects_key_above_root() {
        let json = serde_json::json!({
            "root": key(1).to_hex(),
            "scores": { key(1).to_hex(): 50, key(2).to_hex(): 100 },
        });
        assert!(serde_json::from_value::<TrustScoreTable>(json).is_err());
    }
}
