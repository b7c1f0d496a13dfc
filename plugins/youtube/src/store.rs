//! String-keyed transient storage with per-entry expiry.
//!
//! This is the only state shared between concurrently served requests: video caches, fetch
//! locks, resolved channel ids, rate-limit windows, and the quota ledger all live here under
//! explicit keys and TTLs. Expiry is evaluated lazily against the injected [`Clock`], so an
//! expired entry is indistinguishable from one that was never written.

use crate::clock::Clock;
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub trait TransientStore: Send + Sync {
    /// Returns the live value for `key`, if any.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Writes `value` under `key`, replacing any previous value and expiry.
    fn set(&self, key: &str, value: serde_json::Value, ttl: SignedDuration);

    /// Writes `value` only if `key` holds no live value.
    ///
    /// Returns `true` if the write happened. This is the primitive the fetch locks are built on.
    fn add(&self, key: &str, value: serde_json::Value, ttl: SignedDuration) -> bool;

    fn delete(&self, key: &str);

    /// Deletes every key starting with `prefix` and returns how many live entries were removed.
    fn delete_prefix(&self, prefix: &str) -> usize;
}

/// Typed helpers on top of the JSON-valued store.
pub trait TransientStoreExt: TransientStore {
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(key, error = %e, "discarding undecodable transient value");
                self.delete(key);
                None
            }
        }
    }

    fn set_as<T: Serialize>(&self, key: &str, value: &T, ttl: SignedDuration) {
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, v, ttl),
            Err(e) => tracing::warn!(key, error = %e, "failed to encode transient value"),
        }
    }
}

impl<S: TransientStore + ?Sized> TransientStoreExt for S {}

#[derive(Debug, Clone)]
struct StoredValue {
    value: serde_json::Value,
    expires_at: Timestamp,
}

/// In-process [`TransientStore`].
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.lock().len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredValue>> {
        // a poisoned map is still a valid map
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drops every expired entry. Run on each write so that keys which are never read again
/// (past rate-limit windows, released locks) do not pile up.
fn purge_expired(entries: &mut HashMap<String, StoredValue>, now: Timestamp) {
    entries.retain(|_, stored| stored.expires_at > now);
}

impl TransientStore for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(stored) if stored.expires_at > now => Some(stored.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: SignedDuration) {
        let now = self.clock.now();
        let mut entries = self.lock();
        purge_expired(&mut entries, now);
        entries.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: now + ttl,
            },
        );
    }

    fn add(&self, key: &str, value: serde_json::Value, ttl: SignedDuration) -> bool {
        let now = self.clock.now();
        let mut entries = self.lock();
        purge_expired(&mut entries, now);
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: now + ttl,
            },
        );
        true
    }

    fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    fn delete_prefix(&self, prefix: &str) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let mut removed = 0;
        entries.retain(|key, stored| {
            if key.starts_with(prefix) {
                if stored.expires_at > now {
                    removed += 1;
                }
                false
            } else {
                true
            }
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::RateLimiter;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> (ManualClock, MemoryStore) {
        let clock = ManualClock::new("2024-06-01T12:00:00Z".parse().unwrap());
        let store = MemoryStore::new(Arc::new(clock.clone()));
        (clock, store)
    }

    #[test]
    fn entries_expire_after_ttl() {
        let (clock, store) = store();
        store.set("k", json!(1), SignedDuration::from_secs(10));
        assert_eq!(store.get("k"), Some(json!(1)));

        clock.advance(SignedDuration::from_secs(9));
        assert_eq!(store.get("k"), Some(json!(1)));

        clock.advance(SignedDuration::from_secs(1));
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn add_refuses_live_keys_but_takes_over_expired_ones() {
        let (clock, store) = store();
        assert!(store.add("lock", json!(true), SignedDuration::from_secs(10)));
        assert!(!store.add("lock", json!(true), SignedDuration::from_secs(10)));

        clock.advance(SignedDuration::from_secs(10));
        assert!(store.add("lock", json!(true), SignedDuration::from_secs(10)));
    }

    #[test]
    fn delete_prefix_only_touches_matching_keys() {
        let (_clock, store) = store();
        store.set("ylvp_channel_id_a", json!("A"), SignedDuration::from_hours(1));
        store.set("ylvp_channel_id_b", json!("B"), SignedDuration::from_hours(1));
        store.set("ylvp_video_data_latest", json!({}), SignedDuration::from_hours(1));

        assert_eq!(store.delete_prefix("ylvp_channel_id_"), 2);
        assert_eq!(store.get("ylvp_channel_id_a"), None);
        assert!(store.get("ylvp_video_data_latest").is_some());
    }

    #[test]
    fn writes_sweep_out_expired_keys() {
        let (clock, store) = store();
        store.set("old_a", json!(1), SignedDuration::from_secs(5));
        store.set("old_b", json!(2), SignedDuration::from_secs(5));
        store.set("kept", json!(3), SignedDuration::from_hours(1));

        clock.advance(SignedDuration::from_secs(5));
        store.set("new", json!(4), SignedDuration::from_secs(5));
        let mut keys: Vec<String> = store.lock().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["kept", "new"]);
    }

    #[test]
    fn a_day_of_rate_limit_windows_does_not_accumulate() {
        let clock = ManualClock::new("2024-06-01T00:00:00Z".parse().unwrap());
        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = Arc::new(MemoryStore::new(Arc::clone(&clock_arc)));
        let limiter = RateLimiter::new(store.clone(), clock_arc);

        for _ in 0..1440 {
            assert!(limiter.allow_call());
            clock.advance(SignedDuration::from_secs(60));
        }
        assert!(store.lock().len() <= 1, "{store:?}");
    }

    #[test]
    fn undecodable_values_read_as_missing() {
        let (_clock, store) = store();
        store.set("k", json!("not a number"), SignedDuration::from_secs(60));
        assert_eq!(store.get_as::<u64>("k"), None);
        assert_eq!(store.get("k"), None);
    }
}
