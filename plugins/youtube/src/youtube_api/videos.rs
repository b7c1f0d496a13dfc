//! YouTube Videos API types.

use crate::youtube_api::search::{LiveBroadcastContent, Thumbnails};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Response structure for the `videos.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoListResponse {
    /// The value will be `youtube#videoListResponse`.
    pub kind: String,
    #[serde(default)]
    pub items: Vec<Video>,
}

/// A `video` resource represents a YouTube video.
///
/// Every part is optional because which parts are present depends on the `part` parameter of
/// the request.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<VideoSnippet>,
    #[serde(
        rename = "contentDetails",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_details: Option<ContentDetails>,
    /// Only present for videos that are, were, or will be live broadcasts.
    #[serde(
        rename = "liveStreamingDetails",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub live_streaming_details: Option<LiveStreamingDetails>,
}

impl Video {
    pub fn duration(&self) -> Option<&str> {
        self.content_details.as_ref()?.duration.as_deref()
    }

    pub fn scheduled_start_time(&self) -> Option<Timestamp> {
        self.live_streaming_details.as_ref()?.scheduled_start_time
    }
}

/// See: <https://developers.google.com/youtube/v3/docs/videos#snippet>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSnippet {
    #[serde(rename = "publishedAt")]
    pub published_at: Timestamp,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
    #[serde(
        rename = "liveBroadcastContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub live_broadcast_content: Option<LiveBroadcastContent>,
}

/// See: <https://developers.google.com/youtube/v3/docs/videos#contentDetails>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDetails {
    /// The length of the video as an ISO 8601 duration, e.g. `PT15M33S`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// See: <https://developers.google.com/youtube/v3/docs/videos#liveStreamingDetails>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStreamingDetails {
    #[serde(
        rename = "scheduledStartTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub scheduled_start_time: Option<Timestamp>,
    #[serde(
        rename = "actualStartTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub actual_start_time: Option<Timestamp>,
    #[serde(
        rename = "actualEndTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub actual_end_time: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_duration_and_schedule() {
        let video: Video = serde_json::from_value(serde_json::json!({
            "id": "abc123",
            "contentDetails": { "duration": "PT1H2M30S" },
            "liveStreamingDetails": { "scheduledStartTime": "2024-06-02T15:00:00Z" }
        }))
        .unwrap();
        assert_eq!(video.duration(), Some("PT1H2M30S"));
        assert_eq!(
            video.scheduled_start_time(),
            Some("2024-06-02T15:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn regular_uploads_have_no_schedule() {
        let video: Video =
            serde_json::from_value(serde_json::json!({ "id": "abc123" })).unwrap();
        assert_eq!(video.duration(), None);
        assert_eq!(video.scheduled_start_time(), None);
    }
}
