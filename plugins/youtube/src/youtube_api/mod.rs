//! YouTube Data API v3 client library.
//!
//! Only the public, API-key authenticated read endpoints are covered: enough to resolve a
//! channel from its handle, search a channel's live/upcoming/completed broadcasts and uploads,
//! and read per-video details (duration, scheduled start).
//!
//! # Quota
//!
//! Every call costs quota units against the key's daily allowance: `search.list` is expensive
//! (100 units), `channels.list` and `videos.list` are cheap (1 unit). Callers inside this crate
//! never talk to [`YouTubeClient`] directly; they go through [`crate::gate::ApiGate`], which
//! enforces the per-minute call ceiling and records quota usage.
//!
//! # Testing seam
//!
//! [`VideoPlatform`] abstracts the handful of lookups the rest of the crate needs, so the
//! resolver, fetcher, and coordinator can be driven by an in-memory platform in tests.

use std::future::Future;

pub mod channels;
pub mod client;
pub mod search;
pub mod videos;

pub use client::YouTubeClient;
pub use search::{LiveBroadcastContent, SearchFilter, SearchResult, Thumbnails};
pub use videos::Video;

/// The external video platform, as seen by the resolver and fetcher.
pub trait VideoPlatform: Send + Sync {
    /// `channels.list?forHandle=`
    fn channel_for_handle(
        &self,
        api_key: &str,
        handle: &str,
    ) -> impl Future<Output = eyre::Result<Option<String>>> + Send;

    /// `channels.list?forUsername=` (legacy usernames)
    fn channel_for_username(
        &self,
        api_key: &str,
        username: &str,
    ) -> impl Future<Output = eyre::Result<Option<String>>> + Send;

    /// `search.list?type=channel&q=`; the first hit's channel id.
    fn search_channel(
        &self,
        api_key: &str,
        query: &str,
    ) -> impl Future<Output = eyre::Result<Option<String>>> + Send;

    /// `search.list?type=video` scoped to a channel, newest first.
    fn search_videos(
        &self,
        api_key: &str,
        channel_id: &str,
        filter: SearchFilter,
        max_results: u32,
    ) -> impl Future<Output = eyre::Result<Vec<SearchResult>>> + Send;

    /// `videos.list?id=`
    fn video_details(
        &self,
        api_key: &str,
        video_id: &str,
    ) -> impl Future<Output = eyre::Result<Option<Video>>> + Send;
}

impl<T: VideoPlatform> VideoPlatform for std::sync::Arc<T> {
    fn channel_for_handle(
        &self,
        api_key: &str,
        handle: &str,
    ) -> impl Future<Output = eyre::Result<Option<String>>> + Send {
        (**self).channel_for_handle(api_key, handle)
    }

    fn channel_for_username(
        &self,
        api_key: &str,
        username: &str,
    ) -> impl Future<Output = eyre::Result<Option<String>>> + Send {
        (**self).channel_for_username(api_key, username)
    }

    fn search_channel(
        &self,
        api_key: &str,
        query: &str,
    ) -> impl Future<Output = eyre::Result<Option<String>>> + Send {
        (**self).search_channel(api_key, query)
    }

    fn search_videos(
        &self,
        api_key: &str,
        channel_id: &str,
        filter: SearchFilter,
        max_results: u32,
    ) -> impl Future<Output = eyre::Result<Vec<SearchResult>>> + Send {
        (**self).search_videos(api_key, channel_id, filter, max_results)
    }

    fn video_details(
        &self,
        api_key: &str,
        video_id: &str,
    ) -> impl Future<Output = eyre::Result<Option<Video>>> + Send {
        (**self).video_details(api_key, video_id)
    }
}
