//! In-memory platform and wiring shared by the unit tests.

use crate::clock::{Clock, ManualClock};
use crate::config::Settings;
use crate::coordinator::Coordinator;
use crate::debug_log::DebugLog;
use crate::fetcher::VideoFetcher;
use crate::gate::ApiGate;
use crate::quota::QuotaTracker;
use crate::rate_limit::RateLimiter;
use crate::resolver::ChannelResolver;
use crate::store::{MemoryStore, TransientStore};
use crate::youtube_api::search::{ResourceId, SearchResultSnippet, Thumbnail};
use crate::youtube_api::videos::{ContentDetails, LiveStreamingDetails};
use crate::youtube_api::{SearchFilter, SearchResult, Thumbnails, Video, VideoPlatform};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

pub(crate) const START: &str = "2024-06-02T12:00:00Z";
pub(crate) const API_KEY: &str = "test-key";

pub(crate) fn search_result(video_id: &str) -> SearchResult {
    SearchResult {
        id: ResourceId {
            kind: "youtube#video".into(),
            video_id: Some(video_id.into()),
            channel_id: None,
        },
        snippet: SearchResultSnippet {
            published_at: "2024-06-01T10:00:00Z".parse().unwrap(),
            channel_id: "UC1".into(),
            title: format!("Video {video_id}"),
            description: String::new(),
            thumbnails: Thumbnails {
                high: Some(Thumbnail {
                    url: format!("https://i.ytimg.com/vi/{video_id}/hqdefault.jpg"),
                    width: None,
                    height: None,
                }),
                ..Thumbnails::default()
            },
            live_broadcast_content: None,
        },
    }
}

fn filter_name(filter: SearchFilter) -> &'static str {
    match filter {
        SearchFilter::Live => "live",
        SearchFilter::Upcoming => "upcoming",
        SearchFilter::Completed => "completed",
        SearchFilter::Recent => "recent",
    }
}

#[derive(Default)]
struct FakeState {
    handles: HashMap<String, String>,
    usernames: HashMap<String, String>,
    channel_searches: HashMap<String, String>,
    searches: HashMap<SearchFilter, Vec<SearchResult>>,
    videos: HashMap<String, Video>,
    failing: HashSet<String>,
    failing_once: HashSet<String>,
    calls: Vec<String>,
    delay: Option<Duration>,
}

/// A scripted [`VideoPlatform`] that records every call it receives.
///
/// Calls are logged as `"<method> <argument>"`, e.g. `"search.live UC1"` or `"videos abc"`, and
/// [`FakePlatform::fail`] takes the `<method>` part.
#[derive(Default)]
pub(crate) struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub(crate) fn add_handle(&self, handle: &str, channel_id: &str) {
        self.lock()
            .handles
            .insert(handle.into(), channel_id.into());
    }

    pub(crate) fn add_username(&self, username: &str, channel_id: &str) {
        self.lock()
            .usernames
            .insert(username.into(), channel_id.into());
    }

    pub(crate) fn add_channel_search(&self, query: &str, channel_id: &str) {
        self.lock()
            .channel_searches
            .insert(query.into(), channel_id.into());
    }

    /// Appends a result to what `filter` searches return.
    pub(crate) fn add_search(&self, filter: SearchFilter, video_id: &str) {
        self.lock()
            .searches
            .entry(filter)
            .or_default()
            .push(search_result(video_id));
    }

    pub(crate) fn set_search(&self, filter: SearchFilter, video_ids: &[&str]) {
        self.lock()
            .searches
            .insert(filter, video_ids.iter().map(|id| search_result(id)).collect());
    }

    pub(crate) fn add_video(&self, video_id: &str, duration: Option<&str>, scheduled: Option<&str>) {
        let video = Video {
            id: video_id.into(),
            snippet: None,
            content_details: duration.map(|d| ContentDetails {
                duration: Some(d.into()),
            }),
            live_streaming_details: scheduled.map(|s| LiveStreamingDetails {
                scheduled_start_time: Some(s.parse().unwrap()),
                actual_start_time: None,
                actual_end_time: None,
            }),
        };
        self.lock().videos.insert(video_id.into(), video);
    }

    pub(crate) fn fail(&self, method: &str) {
        self.lock().failing.insert(method.into());
    }

    pub(crate) fn fail_once(&self, method: &str) {
        self.lock().failing_once.insert(method.into());
    }

    /// Every call takes this long (in tokio time) before answering.
    pub(crate) fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    async fn answer<T, F>(&self, method: &str, argument: &str, answer: F) -> eyre::Result<T>
    where
        F: FnOnce(&FakeState) -> T,
    {
        let delay = {
            let mut state = self.lock();
            state.calls.push(format!("{method} {argument}"));
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.failing.contains(method) || state.failing_once.remove(method) {
            eyre::bail!("{method} failed");
        }
        Ok(answer(&state))
    }
}

impl VideoPlatform for FakePlatform {
    async fn channel_for_handle(&self, _api_key: &str, handle: &str) -> eyre::Result<Option<String>> {
        self.answer("channels.forHandle", handle, |s| s.handles.get(handle).cloned())
            .await
    }

    async fn channel_for_username(
        &self,
        _api_key: &str,
        username: &str,
    ) -> eyre::Result<Option<String>> {
        self.answer("channels.forUsername", username, |s| {
            s.usernames.get(username).cloned()
        })
        .await
    }

    async fn search_channel(&self, _api_key: &str, query: &str) -> eyre::Result<Option<String>> {
        self.answer("search.channel", query, |s| {
            s.channel_searches.get(query).cloned()
        })
        .await
    }

    async fn search_videos(
        &self,
        _api_key: &str,
        channel_id: &str,
        filter: SearchFilter,
        max_results: u32,
    ) -> eyre::Result<Vec<SearchResult>> {
        let method = format!("search.{}", filter_name(filter));
        self.answer(&method, channel_id, |s| {
            s.searches
                .get(&filter)
                .map(|results| {
                    results
                        .iter()
                        .take(max_results as usize)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        })
        .await
    }

    async fn video_details(&self, _api_key: &str, video_id: &str) -> eyre::Result<Option<Video>> {
        self.answer("videos", video_id, |s| s.videos.get(video_id).cloned())
            .await
    }
}

/// Every component wired to one manual clock, one store, and one [`FakePlatform`].
///
/// The coordinator starts out configured for `https://www.youtube.com/channel/UC1`, which needs
/// no resolution calls.
pub(crate) struct Harness {
    pub clock: ManualClock,
    pub store: Arc<MemoryStore>,
    pub platform: Arc<FakePlatform>,
    pub gate: Arc<ApiGate<Arc<FakePlatform>>>,
    pub quota: QuotaTracker,
    pub resolver: ChannelResolver<Arc<FakePlatform>>,
    pub fetcher: VideoFetcher<Arc<FakePlatform>>,
    pub settings: watch::Sender<Settings>,
    pub coordinator: Coordinator<Arc<FakePlatform>>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::new(START.parse().unwrap());
        let dyn_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = Arc::new(MemoryStore::new(Arc::clone(&dyn_clock)));
        let dyn_store: Arc<dyn TransientStore> = store.clone();

        let platform = Arc::new(FakePlatform::default());
        let quota = QuotaTracker::new(Arc::clone(&dyn_store), Arc::clone(&dyn_clock));
        let gate = Arc::new(ApiGate::new(
            Arc::clone(&platform),
            RateLimiter::new(Arc::clone(&dyn_store), Arc::clone(&dyn_clock)),
            quota.clone(),
            DebugLog::new(Arc::clone(&dyn_store), Arc::clone(&dyn_clock)),
        ));

        let (settings, rx) = watch::channel(Settings {
            channel_url: "https://www.youtube.com/channel/UC1".into(),
            api_key: API_KEY.into(),
            ..Settings::default()
        });

        Self {
            resolver: ChannelResolver::new(Arc::clone(&gate), Arc::clone(&dyn_store)),
            fetcher: VideoFetcher::new(Arc::clone(&gate)),
            coordinator: Coordinator::new(Arc::clone(&gate), dyn_store, dyn_clock, rx),
            clock,
            store,
            platform,
            gate,
            quota,
            settings,
        }
    }

    pub fn settings_for(&self, channel_url: &str) -> Settings {
        Settings {
            channel_url: channel_url.into(),
            api_key: API_KEY.into(),
            ..Settings::default()
        }
    }
}
