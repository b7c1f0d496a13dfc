//! Prioritized lookup of "the video to show" for a channel.
//!
//! Each mode walks a fixed list of tiers and returns the first hit. A tier that fails for any
//! reason (transport error, missing field, rate limit) simply yields nothing and the walk moves
//! on, so a flaky `search.list` for live streams never hides a perfectly good upcoming one.

use crate::duration::parse_duration_secs;
use crate::gate::{ApiGate, CallError};
use crate::quota::ApiCall;
use crate::record::{QueryMode, VideoMeta, VideoRecord};
use crate::youtube_api::{SearchFilter, SearchResult, VideoPlatform};
use std::sync::Arc;

/// Uploads shorter than this are treated as shorts and skipped when picking the latest video.
pub const MIN_FULL_VIDEO_SECS: u64 = 60;

/// How many recent uploads are considered when skipping shorts.
const RECENT_CANDIDATES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(VideoRecord),
    /// Every tier came back empty or failed.
    Absent,
    /// Nothing was found and at least one tier was skipped by the rate limiter.
    RateLimited,
}

impl FetchOutcome {
    pub fn into_record(self) -> Option<VideoRecord> {
        match self {
            FetchOutcome::Found(record) => Some(record),
            FetchOutcome::Absent | FetchOutcome::RateLimited => None,
        }
    }
}

/// Tracks whether any tier of a walk was skipped by the rate limiter.
#[derive(Debug, Default)]
struct Walk {
    throttled: bool,
}

impl Walk {
    fn step<T>(&mut self, tier: &'static str, result: Result<T, CallError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(CallError::RateLimited) => {
                tracing::debug!(tier, "tier skipped by rate limiter");
                self.throttled = true;
                None
            }
            Err(e) => {
                tracing::debug!(tier, error = %e, "tier failed, falling through");
                None
            }
        }
    }

    fn finish(self, found: Option<VideoRecord>) -> FetchOutcome {
        match found {
            Some(record) => FetchOutcome::Found(record),
            None if self.throttled => FetchOutcome::RateLimited,
            None => FetchOutcome::Absent,
        }
    }
}

fn meta_from_search(result: &SearchResult) -> Option<VideoMeta> {
    Some(VideoMeta {
        video_id: result.id.video_id.clone()?,
        title: result.snippet.title.clone(),
        description: result.snippet.description.clone(),
        published_at: result.snippet.published_at,
        thumbnail: result
            .snippet
            .thumbnails
            .best_url()
            .unwrap_or_default()
            .to_string(),
    })
}

pub struct VideoFetcher<P> {
    gate: Arc<ApiGate<P>>,
}

impl<P: VideoPlatform> VideoFetcher<P> {
    pub fn new(gate: Arc<ApiGate<P>>) -> Self {
        Self { gate }
    }

    pub async fn fetch(&self, api_key: &str, mode: QueryMode, channel_id: &str) -> FetchOutcome {
        let mut walk = Walk::default();
        let found = match mode {
            QueryMode::Upcoming => self.live_or_upcoming(&mut walk, api_key, channel_id).await,
            QueryMode::Latest => self.latest(&mut walk, api_key, channel_id).await,
        };
        let outcome = walk.finish(found);
        tracing::debug!(
            %mode,
            channel_id,
            video_id = ?match &outcome {
                FetchOutcome::Found(record) => Some(record.video_id()),
                _ => None,
            },
            throttled = matches!(outcome, FetchOutcome::RateLimited),
            "fetch finished"
        );
        outcome
    }

    async fn search_first(
        &self,
        walk: &mut Walk,
        tier: &'static str,
        api_key: &str,
        channel_id: &str,
        filter: SearchFilter,
    ) -> Option<SearchResult> {
        let results = self
            .gate
            .call(
                ApiCall::SearchList,
                self.gate
                    .platform()
                    .search_videos(api_key, channel_id, filter, 1),
            )
            .await;
        walk.step(tier, results)?.into_iter().next()
    }

    /// Live now, else the next scheduled broadcast.
    async fn live_or_upcoming(
        &self,
        walk: &mut Walk,
        api_key: &str,
        channel_id: &str,
    ) -> Option<VideoRecord> {
        if let Some(live) = self
            .search_first(walk, "live", api_key, channel_id, SearchFilter::Live)
            .await
            && let Some(meta) = meta_from_search(&live)
        {
            return Some(VideoRecord::live(meta));
        }

        let upcoming = self
            .search_first(walk, "upcoming", api_key, channel_id, SearchFilter::Upcoming)
            .await?;
        let meta = meta_from_search(&upcoming)?;

        // The search snippet has no schedule; only the video resource does.
        let details = self
            .gate
            .call(
                ApiCall::VideosList,
                self.gate.platform().video_details(api_key, &meta.video_id),
            )
            .await;
        let Some(scheduled) = walk
            .step("upcoming details", details)
            .flatten()
            .and_then(|video| video.scheduled_start_time())
        else {
            tracing::debug!(video_id = %meta.video_id, "upcoming broadcast has no scheduled start");
            return None;
        };

        Some(VideoRecord::upcoming(meta, scheduled))
    }

    /// Most recent completed broadcast, else the most recent full-length upload.
    async fn latest(
        &self,
        walk: &mut Walk,
        api_key: &str,
        channel_id: &str,
    ) -> Option<VideoRecord> {
        if let Some(completed) = self
            .search_first(walk, "completed", api_key, channel_id, SearchFilter::Completed)
            .await
            && let Some(meta) = meta_from_search(&completed)
        {
            return Some(VideoRecord::completed(meta));
        }

        let recent = self
            .gate
            .call(
                ApiCall::SearchList,
                self.gate.platform().search_videos(
                    api_key,
                    channel_id,
                    SearchFilter::Recent,
                    RECENT_CANDIDATES,
                ),
            )
            .await;
        let recent = walk.step("recent", recent)?;

        for candidate in &recent {
            let Some(meta) = meta_from_search(candidate) else {
                continue;
            };
            let details = self
                .gate
                .call(
                    ApiCall::VideosList,
                    self.gate.platform().video_details(api_key, &meta.video_id),
                )
                .await;
            let Some(duration) = walk
                .step("recent details", details)
                .flatten()
                .and_then(|video| video.duration().map(parse_duration_secs))
            else {
                continue;
            };
            if duration >= MIN_FULL_VIDEO_SECS {
                return Some(VideoRecord::completed(meta));
            }
            tracing::trace!(video_id = %meta.video_id, duration, "skipping short");
        }

        // Nothing long enough; the newest upload is better than nothing.
        recent
            .first()
            .and_then(meta_from_search)
            .map(VideoRecord::completed)
    }
}
