//! YouTube Search API types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Response structure for the `search.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/search/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchListResponse {
    /// The value will be `youtube#searchListResponse`.
    pub kind: String,
    /// Matching resources, ordered according to the request's `order` parameter.
    #[serde(default)]
    pub items: Vec<SearchResult>,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A search result points at a video, channel, or playlist.
///
/// See: <https://developers.google.com/youtube/v3/docs/search#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: ResourceId,
    pub snippet: SearchResultSnippet,
}

/// Identifies the resource a [`SearchResult`] refers to.
///
/// Exactly one of the id fields is set, depending on `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceId {
    /// `youtube#video`, `youtube#channel`, or `youtube#playlist`.
    pub kind: String,
    #[serde(rename = "videoId", default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(rename = "channelId", default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultSnippet {
    /// The creation date and time of the resource.
    #[serde(rename = "publishedAt")]
    pub published_at: Timestamp,
    /// The channel that published the resource.
    #[serde(rename = "channelId")]
    pub channel_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
    /// Whether the resource is a live broadcast, an upcoming one, or neither.
    #[serde(
        rename = "liveBroadcastContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub live_broadcast_content: Option<LiveBroadcastContent>,
}

/// Broadcast state of a video as reported in snippets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveBroadcastContent {
    Live,
    Upcoming,
    None,
}

/// Thumbnail images keyed by size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thumbnails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Thumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<Thumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Thumbnail>,
}

impl Thumbnails {
    /// The high-resolution thumbnail if there is one, else the default one.
    pub fn best_url(&self) -> Option<&str> {
        self.high
            .as_ref()
            .or(self.default.as_ref())
            .map(|t| t.url.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Which slice of a channel's videos a search asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchFilter {
    /// Broadcasts that are live right now.
    Live,
    /// Broadcasts scheduled for the future.
    Upcoming,
    /// Broadcasts that have ended.
    Completed,
    /// All uploads, newest first.
    Recent,
}

impl SearchFilter {
    /// The `eventType` query value, if the filter sets one.
    pub fn event_type(self) -> Option<&'static str> {
        match self {
            SearchFilter::Live => Some("live"),
            SearchFilter::Upcoming => Some("upcoming"),
            SearchFilter::Completed => Some("completed"),
            SearchFilter::Recent => None,
        }
    }
}
