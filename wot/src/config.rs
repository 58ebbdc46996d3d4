//! Scoring parameters.

use serde::{Deserialize, Serialize};

use crate::WotError;

/// Parameters of the trust traversal.
///
/// Loaded from the `[wot]` table of the hub config file or built
/// programmatically. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WotConfig {
    /// How many hops from the root are scored. Keys at this depth are
    /// scored but their own follows are not fetched.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Score given to the root.
    #[serde(default = "default_max_score")]
    pub max_score: i64,

    /// Percentage of the parent's score kept per hop (1..=99).
    #[serde(default = "default_decay_percent")]
    pub decay_percent: u32,

    /// Upper bound on follow-list queries in flight within one level.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_depth() -> u32 {
    2
}

fn default_max_score() -> i64 {
    100
}

fn default_decay_percent() -> u32 {
    50
}

fn default_max_concurrent_queries() -> usize {
    64
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WotConfig {
    /// Reject parameter combinations that would break the best-path ordering
    /// or stall the traversal.
    pub fn validate(&self) -> Result<(), WotError> {
        if self.max_depth == 0 {
            return Err(WotError::InvalidConfig("max_depth must be at least 1".into()));
        }
        if self.max_score <= 0 {
            return Err(WotError::InvalidConfig("max_score must be positive".into()));
        }
        if !(1..=99).contains(&self.decay_percent) {
            return Err(WotError::InvalidConfig(format!(
                "decay_percent must be within 1..=99, got {}",
                self.decay_percent
            )));
        }
        if self.max_concurrent_queries == 0 {
            return Err(WotError::InvalidConfig(
                "max_concurrent_queries must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Score of a key first reached `depth` hops from the root.
    pub fn score_at_depth(&self, depth: u32) -> i64 {
        (0..depth).fold(self.max_score, |score, _| {
            score * i64::from(self.decay_percent) / 100
        })
    }
}

impl Default for WotConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_score: default_max_score(),
            decay_percent: default_decay_percent(),
            max_concurrent_queries: default_max_concurrent_queries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = WotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_depth, 2);
    }

    #[test]
    fn scores_halve_per_hop_by_default() {
        let config = WotConfig::default();
        assert_eq!(config.score_at_depth(0), 100);
        assert_eq!(config.score_at_depth(1), 50);
        assert_eq!(config.score_at_depth(2), 25);
    }

    #[test]
    fn scores_strictly_decrease_until_zero() {
        let config = WotConfig {
            max_score: 1000,
            decay_percent: 99,
            ..WotConfig::default()
        };
        let mut prev = config.score_at_depth(0);
        for depth in 1..20 {
            let score = config.score_at_depth(depth);
            assert!(score < prev || score == 0);
            prev = score;
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        let bad = [
            WotConfig { max_depth: 0, ..WotConfig::default() },
            WotConfig { max_score: 0, ..WotConfig::default() },
            WotConfig { decay_percent: 0, ..WotConfig::default() },
            WotConfig { decay_percent: 100, ..WotConfig::default() },
            WotConfig { max_concurrent_queries: 0, ..WotConfig::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(WotError::InvalidConfig(_))));
        }
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: WotConfig = serde_json::from_str(r#"{"max_depth": 3}"#).unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.decay_percent, 50);
    }
}
