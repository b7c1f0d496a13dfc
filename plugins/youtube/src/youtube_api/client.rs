//! Core YouTube API client functionality.

use crate::youtube_api::channels::ChannelListResponse;
use crate::youtube_api::search::{SearchFilter, SearchListResponse, SearchResult};
use crate::youtube_api::videos::{Video, VideoListResponse};
use crate::youtube_api::VideoPlatform;
use eyre::Context;
use std::time::Duration;
use tracing::instrument;

/// Where the Data API v3 lives unless overridden.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Upper bound on one API round trip. Kept below the fetch lock's lifetime so that a hung
/// request gives up before another fetch can take the lock over.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// An HTTP client whose requests (connect included) give up after `timeout`.
pub fn http_client(timeout: Duration) -> eyre::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .context("build HTTP client")
}

/// Client for the public (API-key authenticated) parts of the YouTube Data API v3.
///
/// The key is passed per call rather than stored, so that a settings change takes effect on
/// the very next request without rebuilding the client.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    /// HTTP client for API requests
    client: reqwest::Client,
    /// Endpoint prefix, e.g. [`DEFAULT_BASE_URL`]
    base_url: String,
}

impl YouTubeClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different API root (a mock server, a proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Makes a key-authenticated GET request to a Data API resource with common error handling.
    ///
    /// Non-success statuses are turned into errors carrying the response body, which is where
    /// YouTube puts the reason (`quotaExceeded`, `keyInvalid`, ...).
    #[instrument(skip(self, api_key), level = tracing::Level::TRACE)]
    pub(crate) async fn make_keyed_request(
        &self,
        api_key: &str,
        resource: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, resource);

        let response = self
            .client
            .get(&url)
            .query(query_params)
            .query(&[("key", api_key)])
            .send()
            .await
            .with_context(|| format!("send request to YouTube API: {}", url))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "YouTube API {} request failed with status {}: {}",
                resource,
                status_code,
                error_text
            ));
        }

        Ok(response)
    }

    /// Looks up channels with the `channels.list` API using one filter parameter
    /// (`forHandle` or `forUsername`).
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self, api_key))]
    pub async fn list_channels(
        &self,
        api_key: &str,
        filter: &str,
        value: &str,
    ) -> eyre::Result<ChannelListResponse> {
        let query_params = [("part", "id"), (filter, value)];
        let response = self
            .make_keyed_request(api_key, "channels", &query_params)
            .await?;

        let channels: ChannelListResponse = response
            .json()
            .await
            .context("parse YouTube channels API response as JSON")?;

        tracing::debug!(
            filter,
            returned_items = channels.items.len(),
            "fetched channels"
        );

        Ok(channels)
    }

    /// Runs a `search.list` query.
    ///
    /// Video searches are scoped to `channel_id` and ordered by date; the filter's `eventType`
    /// is applied when it has one.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/search/list>
    #[instrument(skip(self, api_key))]
    pub async fn search_channel_videos(
        &self,
        api_key: &str,
        channel_id: &str,
        filter: SearchFilter,
        max_results: u32,
    ) -> eyre::Result<SearchListResponse> {
        let max_results_string = max_results.to_string();
        let mut query_params = vec![
            ("part", "snippet"),
            ("channelId", channel_id),
            ("type", "video"),
            ("order", "date"),
            ("maxResults", max_results_string.as_str()),
        ];
        if let Some(event_type) = filter.event_type() {
            query_params.push(("eventType", event_type));
        }

        let response = self
            .make_keyed_request(api_key, "search", &query_params)
            .await?;

        let results: SearchListResponse = response
            .json()
            .await
            .context("parse YouTube search API response as JSON")?;

        tracing::debug!(
            channel_id,
            ?filter,
            returned_items = results.items.len(),
            "searched channel videos"
        );

        Ok(results)
    }

    /// Full-text channel search, used as the last resort when resolving a handle.
    #[instrument(skip(self, api_key))]
    pub async fn search_channels(
        &self,
        api_key: &str,
        query: &str,
    ) -> eyre::Result<SearchListResponse> {
        let query_params = [("part", "snippet"), ("type", "channel"), ("q", query)];
        let response = self
            .make_keyed_request(api_key, "search", &query_params)
            .await?;

        response
            .json()
            .await
            .context("parse YouTube channel search response as JSON")
    }

    /// Gets snippet, content details, and live streaming details for one video.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self, api_key))]
    pub async fn get_video(&self, api_key: &str, video_id: &str) -> eyre::Result<Option<Video>> {
        let query_params = [
            ("part", "liveStreamingDetails,snippet,contentDetails"),
            ("id", video_id),
        ];
        let response = self
            .make_keyed_request(api_key, "videos", &query_params)
            .await?;

        let videos: VideoListResponse = response
            .json()
            .await
            .context("parse YouTube videos API response as JSON")?;

        tracing::debug!(
            video_id,
            returned_items = videos.items.len(),
            "fetched video details"
        );

        Ok(videos.items.into_iter().next())
    }
}

impl VideoPlatform for YouTubeClient {
    async fn channel_for_handle(&self, api_key: &str, handle: &str) -> eyre::Result<Option<String>> {
        Ok(self
            .list_channels(api_key, "forHandle", handle)
            .await?
            .first_id())
    }

    async fn channel_for_username(
        &self,
        api_key: &str,
        username: &str,
    ) -> eyre::Result<Option<String>> {
        Ok(self
            .list_channels(api_key, "forUsername", username)
            .await?
            .first_id())
    }

    async fn search_channel(&self, api_key: &str, query: &str) -> eyre::Result<Option<String>> {
        let results = self.search_channels(api_key, query).await?;
        Ok(results
            .items
            .into_iter()
            .next()
            .map(|r| r.snippet.channel_id))
    }

    async fn search_videos(
        &self,
        api_key: &str,
        channel_id: &str,
        filter: SearchFilter,
        max_results: u32,
    ) -> eyre::Result<Vec<SearchResult>> {
        let results = self
            .search_channel_videos(api_key, channel_id, filter, max_results)
            .await?;
        Ok(results.items)
    }

    async fn video_details(&self, api_key: &str, video_id: &str) -> eyre::Result<Option<Video>> {
        self.get_video(api_key, video_id).await
    }
}
