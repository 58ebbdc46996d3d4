//! Nullable follow graph: scripted follow/mute lists with call recording.

use async_trait::async_trait;
use modhub_types::PublicKey;
use modhub_wot::{GraphError, GraphQuery};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A test follow graph.
///
/// Keys without a scripted list follow nobody. Keys marked with
/// [`fail`](NullGraph::fail) return a transport error. Every
/// `follow_list` call is recorded, along with the peak number of calls that
/// were in flight at once.
#[derive(Default)]
pub struct NullGraph {
    follows: HashMap<PublicKey, BTreeSet<PublicKey>>,
    mutes: HashMap<PublicKey, BTreeSet<PublicKey>>,
    failing: HashSet<PublicKey>,
    failing_mutes: bool,
    delays: HashMap<PublicKey, Duration>,
    default_delay: Option<Duration>,
    calls: Mutex<Vec<PublicKey>>,
    mute_calls: Mutex<Vec<PublicKey>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NullGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// `source` follows every key in `targets`.
    pub fn follow(mut self, source: PublicKey, targets: impl IntoIterator<Item = PublicKey>) -> Self {
        self.follows.entry(source).or_default().extend(targets);
        self
    }

    /// `source` mutes `target`.
    pub fn mute(mut self, source: PublicKey, target: PublicKey) -> Self {
        self.mutes.entry(source).or_default().insert(target);
        self
    }

    /// Fetching `pubkey`'s follow list fails.
    pub fn fail(mut self, pubkey: PublicKey) -> Self {
        self.failing.insert(pubkey);
        self
    }

    /// Every mute list fetch fails.
    pub fn fail_mutes(mut self) -> Self {
        self.failing_mutes = true;
        self
    }

    /// Answer `pubkey`'s follow list only after `delay`.
    pub fn delay(mut self, pubkey: PublicKey, delay: Duration) -> Self {
        self.delays.insert(pubkey, delay);
        self
    }

    /// Delay every follow list answer without a specific delay.
    pub fn delay_all(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Every `follow_list` call, in the order they started.
    pub fn calls(&self) -> Vec<PublicKey> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// How many times `pubkey`'s follow list was requested.
    pub fn calls_for(&self, pubkey: &PublicKey) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|k| *k == pubkey)
            .count()
    }

    pub fn mute_calls(&self) -> Vec<PublicKey> {
        self.mute_calls.lock().unwrap().clone()
    }

    /// Highest number of `follow_list` calls that were pending at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphQuery for NullGraph {
    async fn follow_list(&self, pubkey: &PublicKey) -> Result<BTreeSet<PublicKey>, GraphError> {
        self.calls.lock().unwrap().push(*pubkey);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if let Some(delay) = self.delays.get(pubkey).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(pubkey) {
            return Err(GraphError::Transport(format!("relay timeout for {pubkey}")));
        }
        Ok(self.follows.get(pubkey).cloned().unwrap_or_default())
    }

    async fn mute_list(&self, pubkey: &PublicKey) -> Result<BTreeSet<PublicKey>, GraphError> {
        self.mute_calls.lock().unwrap().push(*pubkey);
        if self.failing_mutes {
            return Err(GraphError::Transport("mute list unavailable".to_string()));
        }
        Ok(self.mutes.get(pubkey).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> PublicKey {
        PublicKey::new([n; 32])
    }

    #[tokio::test]
    async fn scripted_lists_and_recording() {
        let graph = NullGraph::new()
            .follow(key(1), [key(2), key(3)])
            .mute(key(1), key(3))
            .fail(key(9));

        let follows = graph.follow_list(&key(1)).await.unwrap();
        assert_eq!(follows.len(), 2);
        assert!(graph.follow_list(&key(5)).await.unwrap().is_empty());
        assert!(graph.follow_list(&key(9)).await.is_err());
        assert!(graph.mute_list(&key(1)).await.unwrap().contains(&key(3)));

        assert_eq!(graph.calls(), vec![key(1), key(5), key(9)]);
        assert_eq!(graph.calls_for(&key(9)), 1);
        assert_eq!(graph.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn failing_mutes() {
        let graph = NullGraph::new().fail_mutes();
        assert!(graph.mute_list(&key(1)).await.is_err());
    }
}
