//! Per-key multiplexing of in-flight requests.

use modhub_utils::{CancelReason, CancellationToken};
use std::collections::HashMap;

/// Handle of a registered request.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub generation: u64,
    pub token: CancellationToken,
}

/// At most one in-flight request per key. Registering a key again cancels
/// the previous request under it.
///
/// Generations make `finish` safe to call late: a superseded request that
/// completes after its successor was registered does not remove the
/// successor's entry.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    next_generation: u64,
    entries: HashMap<String, (u64, CancellationToken)>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request under `key`, superseding any previous one.
    pub fn begin(&mut self, key: &str) -> InFlight {
        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();
        if let Some((_, previous)) = self
            .entries
            .insert(key.to_string(), (generation, token.clone()))
        {
            previous.cancel(CancelReason::Superseded);
        }
        InFlight { generation, token }
    }

    /// Drop the entry for `key` if it still belongs to `generation`.
    pub fn finish(&mut self, key: &str, generation: u64) {
        if matches!(self.entries.get(key), Some((current, _)) if *current == generation) {
            self.entries.remove(key);
        }
    }

    /// Cancel and forget every in-flight request.
    pub fn cancel_all(&mut self, reason: CancelReason) -> usize {
        let count = self.entries.len();
        for (_, (_, token)) in self.entries.drain() {
            token.cancel(reason);
        }
        count
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_supersedes_previous_request() {
        let mut registry = InFlightRegistry::new();
        let first = registry.begin("feed");
        let second = registry.begin("feed");

        assert_eq!(first.token.reason(), Some(CancelReason::Superseded));
        assert!(!second.token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_keys_run_side_by_side() {
        let mut registry = InFlightRegistry::new();
        let feed = registry.begin("feed");
        let games = registry.begin("games");
        assert!(!feed.token.is_cancelled());
        assert!(!games.token.is_cancelled());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn stale_finish_keeps_successor() {
        let mut registry = InFlightRegistry::new();
        let first = registry.begin("feed");
        let second = registry.begin("feed");

        registry.finish("feed", first.generation);
        assert!(registry.contains("feed"));

        registry.finish("feed", second.generation);
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_all_drains() {
        let mut registry = InFlightRegistry::new();
        let a = registry.begin("a");
        let b = registry.begin("b");
        assert_eq!(registry.cancel_all(CancelReason::Disabled), 2);
        assert_eq!(a.token.reason(), Some(CancelReason::Disabled));
        assert_eq!(b.token.reason(), Some(CancelReason::Disabled));
        assert!(registry.is_empty());
    }
}
