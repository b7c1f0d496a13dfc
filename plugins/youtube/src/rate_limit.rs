//! Fixed per-minute ceiling on outbound API calls.

use crate::clock::Clock;
use crate::store::{TransientStore, TransientStoreExt};
use jiff::SignedDuration;
use std::sync::Arc;

/// Calls allowed in one 60-second bucket.
pub const CALLS_PER_MINUTE: u64 = 10;

/// A hard ceiling, not a queue: a refused call is simply not made, and nothing is retried on the
/// caller's behalf.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn TransientStore>,
    clock: Arc<dyn Clock>,
    limit: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn TransientStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            limit: CALLS_PER_MINUTE,
        }
    }

    fn window(&self) -> (String, SignedDuration) {
        let now = self.clock.now().as_second();
        let bucket = now.div_euclid(60);
        let remainder = 60 - now.rem_euclid(60);
        (
            format!("ylvp_rate_limit_{bucket}"),
            SignedDuration::from_secs(remainder),
        )
    }

    /// Counts a call against the current minute, returning `false` once the minute's budget is
    /// spent.
    ///
    /// The check and the increment are separate store operations, so concurrent callers can
    /// slightly overshoot the limit.
    pub fn allow_call(&self) -> bool {
        let (key, ttl) = self.window();
        let used: u64 = self.store.get_as(&key).unwrap_or(0);
        if used >= self.limit {
            tracing::debug!(used, limit = self.limit, "rate limit reached for this minute");
            return false;
        }
        self.store.set_as(&key, &(used + 1), ttl);
        true
    }

    /// Calls still allowed in the current minute.
    pub fn remaining(&self) -> u64 {
        let (key, _) = self.window();
        let used: u64 = self.store.get_as(&key).unwrap_or(0);
        self.limit.saturating_sub(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn limiter(start: &str) -> (ManualClock, RateLimiter) {
        let clock = ManualClock::new(start.parse().unwrap());
        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = Arc::new(MemoryStore::new(clock_arc.clone()));
        (clock, RateLimiter::new(store, clock_arc))
    }

    #[test]
    fn eleventh_call_in_a_minute_is_rejected() {
        let (_clock, limiter) = limiter("2024-06-01T12:00:05Z");
        for i in 0..10 {
            assert!(limiter.allow_call(), "call {} should be allowed", i + 1);
        }
        assert!(!limiter.allow_call());
        assert!(!limiter.allow_call());
        assert_eq!(limiter.remaining(), 0);
    }

    #[test]
    fn first_call_in_a_new_bucket_succeeds() {
        let (clock, limiter) = limiter("2024-06-01T12:00:50Z");
        for _ in 0..10 {
            assert!(limiter.allow_call());
        }
        assert!(!limiter.allow_call());

        clock.advance(SignedDuration::from_secs(10));
        assert!(limiter.allow_call());
        assert_eq!(limiter.remaining(), 9);
    }

    #[test]
    fn window_entry_expires_with_the_minute() {
        let (clock, limiter) = limiter("2024-06-01T12:00:45Z");
        assert!(limiter.allow_call());
        let (key, ttl) = limiter.window();
        assert_eq!(ttl, SignedDuration::from_secs(15));

        clock.advance(SignedDuration::from_secs(15));
        assert_eq!(limiter.store.get(&key), None);
    }
}
