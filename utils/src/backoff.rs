//! Exponential backoff with a ceiling and an explicit give-up point.

use std::time::Duration;

/// Multiplicative backoff schedule.
///
/// Starts at `initial` and multiplies by `factor` on every [`advance`]. Once
/// the delay would reach `ceiling` the schedule is exhausted and `advance`
/// returns `None`: callers treat that as "stop retrying".
///
/// [`advance`]: Backoff::advance
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    factor: u32,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    /// Create a schedule. `factor` is raised to at least 2 so the schedule
    /// always reaches its ceiling.
    pub fn new(initial: Duration, factor: u32, ceiling: Duration) -> Self {
        Self {
            initial,
            factor: factor.max(2),
            ceiling,
            current: initial,
        }
    }

    /// The delay to wait before the next attempt.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Move to the next delay. Returns `None` once the ceiling is reached.
    pub fn advance(&mut self) -> Option<Duration> {
        let next = self
            .current
            .checked_mul(self.factor)
            .unwrap_or(self.ceiling)
            .min(self.ceiling);
        self.current = next;
        if next >= self.ceiling {
            None
        } else {
            Some(next)
        }
    }

    /// Whether the schedule has reached its ceiling.
    pub fn is_exhausted(&self) -> bool {
        self.current >= self.ceiling
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn triples_until_one_hour() {
        let mut backoff = Backoff::new(secs(5), 3, secs(3600));
        let mut delays = vec![backoff.current()];
        while let Some(next) = backoff.advance() {
            delays.push(next);
        }
        assert_eq!(
            delays,
            vec![secs(5), secs(15), secs(45), secs(135), secs(405), secs(1215)]
        );
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.current(), secs(3600));
    }

    #[test]
    fn exhausted_schedule_stays_exhausted() {
        let mut backoff = Backoff::new(secs(5), 3, secs(10));
        assert_eq!(backoff.advance(), None);
        assert_eq!(backoff.advance(), None);
    }

    #[test]
    fn reset_restarts_schedule() {
        let mut backoff = Backoff::new(secs(5), 3, secs(3600));
        backoff.advance();
        backoff.advance();
        backoff.reset();
        assert_eq!(backoff.current(), secs(5));
        assert!(!backoff.is_exhausted());
    }

    #[test]
    fn degenerate_factor_still_terminates() {
        let mut backoff = Backoff::new(secs(1), 1, secs(8));
        let mut steps = 0;
        while backoff.advance().is_some() {
            steps += 1;
        }
        assert_eq!(steps, 2);
    }

    proptest! {
        /// Every step strictly multiplies the previous delay until the ceiling.
        #[test]
        fn delays_strictly_multiply(
            initial in 1u64..100,
            factor in 2u32..6,
            ceiling in 100u64..100_000,
        ) {
            let mut backoff = Backoff::new(secs(initial), factor, secs(ceiling));
            let mut prev = backoff.current();
            let mut steps = 0;
            while let Some(next) = backoff.advance() {
                prop_assert_eq!(next, prev * factor);
                prop_assert!(next < secs(ceiling));
                prev = next;
                steps += 1;
                prop_assert!(steps < 64);
            }
            prop_assert!(backoff.is_exhausted());
        }
    }
}
