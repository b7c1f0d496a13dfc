//! Short-lived per-mode cache of the current [`VideoRecord`], guarded by an advisory fetch lock.
//!
//! The lock is an expiring flag in the [`TransientStore`], not a mutex: a holder that dies
//! without releasing it blocks other fetches for at most [`LOCK_TTL`], and a holder that is
//! slower than that can overlap with the next one. Callers that lose the race wait once for
//! [`LOCK_WAIT`] and then settle for whatever the cache holds, possibly nothing.
//!
//! Freshness is two-tiered. Every entry has a nominal TTL chosen from the record's state when
//! it is written, and reads additionally expire live and about-to-start records early because
//! those are the states that flip quickly.

use crate::clock::Clock;
use crate::config::Settings;
use crate::fetcher::{FetchOutcome, VideoFetcher};
use crate::gate::ApiGate;
use crate::record::{QueryMode, VideoRecord};
use crate::resolver::ChannelResolver;
use crate::store::{TransientStore, TransientStoreExt};
use crate::youtube_api::VideoPlatform;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::instrument;

pub const LOCK_TTL: SignedDuration = SignedDuration::from_secs(10);
pub const LOCK_WAIT: Duration = Duration::from_millis(500);

/// Live records older than this are refetched regardless of their TTL.
const LIVE_MAX_AGE_SECS: i64 = 30;
/// Upcoming records this close to (or past) their start are considered "about to start".
const NEAR_START_SECS: i64 = 300;
/// About-to-start records older than this are refetched regardless of their TTL.
const NEAR_START_MAX_AGE_SECS: i64 = 60;
/// An upcoming record whose start passed longer ago than this has almost certainly gone live.
const OVERDUE_UPCOMING_SECS: i64 = 300;
const FALLBACK_TTL: SignedDuration = SignedDuration::from_hours(24);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub record: VideoRecord,
    pub written_at: Timestamp,
}

impl CacheEntry {
    fn age_secs(&self, now: Timestamp) -> i64 {
        now.as_second() - self.written_at.as_second()
    }

    fn near_start(&self, now: Timestamp) -> bool {
        self.record.is_upcoming()
            && self
                .record
                .seconds_until_start(now)
                .is_some_and(|secs| secs < NEAR_START_SECS)
    }

    /// The state-dependent early expiry applied on read.
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        let age = self.age_secs(now);
        if self.record.is_live() {
            return age <= LIVE_MAX_AGE_SECS;
        }
        if self.near_start(now) {
            return age <= NEAR_START_MAX_AGE_SECS;
        }
        true
    }
}

/// Nominal cache lifetime for a freshly fetched record.
pub fn ttl_for(record: &VideoRecord, now: Timestamp) -> SignedDuration {
    let secs = if record.is_live() {
        120
    } else if record.is_upcoming() {
        match record.seconds_until_start(now) {
            Some(until) if until < NEAR_START_SECS => 180,
            _ => 900,
        }
    } else {
        1800
    };
    SignedDuration::from_secs(secs)
}

static NEXT_LOCK_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Holds a mode's fetch lock until dropped.
///
/// Each acquisition writes its own token, and release only deletes the key while it still
/// holds that token: a holder that outlived [`LOCK_TTL`] must not release its successor's lock.
struct FetchLock<'a> {
    store: &'a dyn TransientStore,
    key: String,
    token: u64,
}

impl<'a> FetchLock<'a> {
    fn acquire(store: &'a dyn TransientStore, mode: QueryMode) -> Option<Self> {
        let key = mode.lock_key();
        let token = NEXT_LOCK_TOKEN.fetch_add(1, Ordering::Relaxed);
        store
            .add(&key, serde_json::Value::from(token), LOCK_TTL)
            .then(|| Self { store, key, token })
    }
}

impl Drop for FetchLock<'_> {
    fn drop(&mut self) {
        let held = self.store.get(&self.key).and_then(|v| v.as_u64());
        if held == Some(self.token) {
            self.store.delete(&self.key);
        } else {
            tracing::debug!(key = %self.key, "fetch lock expired before release");
        }
    }
}

struct SettingsFeed {
    rx: watch::Receiver<Settings>,
    current: Settings,
}

pub struct Coordinator<P> {
    store: Arc<dyn TransientStore>,
    clock: Arc<dyn Clock>,
    gate: Arc<ApiGate<P>>,
    resolver: ChannelResolver<P>,
    fetcher: VideoFetcher<P>,
    settings: Mutex<SettingsFeed>,
}

impl<P: VideoPlatform> Coordinator<P> {
    pub fn new(
        gate: Arc<ApiGate<P>>,
        store: Arc<dyn TransientStore>,
        clock: Arc<dyn Clock>,
        mut settings: watch::Receiver<Settings>,
    ) -> Self {
        let current = settings.borrow_and_update().clone();
        Self {
            resolver: ChannelResolver::new(Arc::clone(&gate), Arc::clone(&store)),
            fetcher: VideoFetcher::new(Arc::clone(&gate)),
            gate,
            store,
            clock,
            settings: Mutex::new(SettingsFeed {
                rx: settings,
                current,
            }),
        }
    }

    pub fn gate(&self) -> &ApiGate<P> {
        &self.gate
    }

    pub fn resolver(&self) -> &ChannelResolver<P> {
        &self.resolver
    }

    /// The current settings, after applying any change published since the last call.
    ///
    /// A change of channel URL or API key invalidates every cached video, lock, and channel id
    /// before this returns.
    pub fn settings(&self) -> Settings {
        let mut feed = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        if feed.rx.has_changed().unwrap_or(false) {
            let next = feed.rx.borrow_and_update().clone();
            if feed.current.invalidates_cache(&next) {
                tracing::info!("channel or API key changed, invalidating caches");
                self.invalidate();
            }
            feed.current = next;
        }
        feed.current.clone()
    }

    /// Drops both modes' cache, lock, and fallback entries and every cached channel id.
    pub fn invalidate(&self) {
        for mode in QueryMode::ALL {
            self.store.delete(&mode.cache_key());
            self.store.delete(&mode.lock_key());
            self.store.delete(&mode.fallback_key());
        }
        self.resolver.clear();
    }

    /// The cached record for `mode` if it is still fresh. Stale entries are deleted.
    pub fn cached(&self, mode: QueryMode) -> Option<VideoRecord> {
        let key = mode.cache_key();
        let entry: CacheEntry = self.store.get_as(&key)?;
        if entry.is_fresh(self.clock.now()) {
            return Some(entry.record);
        }
        tracing::debug!(%mode, video_id = entry.record.video_id(), "cached record went stale early");
        self.store.delete(&key);
        None
    }

    #[instrument(skip(self))]
    pub async fn get_or_fetch(&self, mode: QueryMode) -> Option<VideoRecord> {
        let settings = self.settings();
        if let Some(record) = self.cached(mode) {
            return Some(record);
        }

        let Some(_lock) = FetchLock::acquire(&*self.store, mode) else {
            tracing::debug!("another fetch holds the lock, waiting once");
            tokio::time::sleep(LOCK_WAIT).await;
            return self.cached(mode);
        };

        self.fetch_and_store(&settings, mode).await
    }

    /// Forgets both cached records and fetches `mode` again.
    pub async fn refresh(&self, mode: QueryMode) -> Option<VideoRecord> {
        self.delete_cached_records();
        self.get_or_fetch(mode).await
    }

    fn delete_cached_records(&self) {
        for mode in QueryMode::ALL {
            self.store.delete(&mode.cache_key());
        }
    }

    async fn fetch_and_store(&self, settings: &Settings, mode: QueryMode) -> Option<VideoRecord> {
        if !settings.is_configured() {
            self.gate
                .debug_log()
                .push("channel URL or API key is not set");
            return None;
        }
        let channel_id = self.resolver.resolve(settings).await?;
        let api_key = settings.api_key.as_str();

        let mut outcome = self.fetcher.fetch(api_key, mode, &channel_id).await;

        if mode == QueryMode::Upcoming
            && let FetchOutcome::Found(record) = &outcome
            && record
                .seconds_until_start(self.clock.now())
                .is_some_and(|until| until < -OVERDUE_UPCOMING_SECS)
        {
            self.gate.debug_log().push(format!(
                "upcoming {} is overdue, refetching",
                record.video_id()
            ));
            self.delete_cached_records();
            outcome = self.fetcher.fetch(api_key, mode, &channel_id).await;
        }

        if mode == QueryMode::Upcoming && !matches!(outcome, FetchOutcome::Found(_)) {
            let throttled = matches!(outcome, FetchOutcome::RateLimited);
            outcome = match self
                .fetcher
                .fetch(api_key, QueryMode::Latest, &channel_id)
                .await
            {
                FetchOutcome::Absent if throttled => FetchOutcome::RateLimited,
                latest => latest,
            };
        }

        match outcome {
            FetchOutcome::Found(record) => {
                self.store_record(mode, &record);
                Some(record)
            }
            FetchOutcome::RateLimited => {
                let fallback = self.store.get_as::<VideoRecord>(&mode.fallback_key());
                tracing::debug!(has_fallback = fallback.is_some(), "rate limited, using fallback");
                fallback
            }
            FetchOutcome::Absent => None,
        }
    }

    fn store_record(&self, mode: QueryMode, record: &VideoRecord) {
        let now = self.clock.now();
        let ttl = ttl_for(record, now);
        let entry = CacheEntry {
            record: record.clone(),
            written_at: now,
        };
        self.store.set_as(&mode.cache_key(), &entry, ttl);
        self.store.set_as(&mode.fallback_key(), record, FALLBACK_TTL);
        tracing::info!(
            video_id = record.video_id(),
            status = %record.status(),
            ttl_secs = ttl.as_secs(),
            "cached video"
        );
    }
}
