//! The normalized "which video to show" record and the two query modes.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the widget should display.
///
/// Built only through [`VideoRecord::live`], [`VideoRecord::upcoming`], and
/// [`VideoRecord::completed`], which keeps `is_live` and `is_upcoming` mutually exclusive and
/// ties `scheduled_start_time` to upcoming records. Records are never mutated; a fresh fetch
/// replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    video_id: String,
    title: String,
    description: String,
    published_at: Timestamp,
    thumbnail: String,
    is_upcoming: bool,
    is_live: bool,
    scheduled_start_time: Option<Timestamp>,
}

/// Display text and provenance shared by every record.
#[derive(Debug, Clone)]
pub struct VideoMeta {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: Timestamp,
    pub thumbnail: String,
}

impl VideoRecord {
    fn from_meta(
        meta: VideoMeta,
        is_upcoming: bool,
        is_live: bool,
        scheduled_start_time: Option<Timestamp>,
    ) -> Self {
        Self {
            video_id: meta.video_id,
            title: meta.title,
            description: meta.description,
            published_at: meta.published_at,
            thumbnail: meta.thumbnail,
            is_upcoming,
            is_live,
            scheduled_start_time,
        }
    }

    /// A broadcast that is on air right now.
    pub fn live(meta: VideoMeta) -> Self {
        Self::from_meta(meta, false, true, None)
    }

    /// A broadcast scheduled to start at `scheduled_start_time`.
    pub fn upcoming(meta: VideoMeta, scheduled_start_time: Timestamp) -> Self {
        Self::from_meta(meta, true, false, Some(scheduled_start_time))
    }

    /// A finished broadcast or a regular upload.
    pub fn completed(meta: VideoMeta) -> Self {
        Self::from_meta(meta, false, false, None)
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn published_at(&self) -> Timestamp {
        self.published_at
    }

    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }

    pub fn is_upcoming(&self) -> bool {
        self.is_upcoming
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn scheduled_start_time(&self) -> Option<Timestamp> {
        self.scheduled_start_time
    }

    pub fn status(&self) -> VideoStatus {
        if self.is_live {
            VideoStatus::Live
        } else if self.is_upcoming {
            VideoStatus::Upcoming
        } else {
            VideoStatus::Completed
        }
    }

    /// Seconds from `now` until the scheduled start; negative once it has passed.
    pub fn seconds_until_start(&self, now: Timestamp) -> Option<i64> {
        self.scheduled_start_time
            .map(|start| start.as_second() - now.as_second())
    }
}

/// Stream state as reported to the status poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Live,
    Upcoming,
    Completed,
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VideoStatus::Live => "live",
            VideoStatus::Upcoming => "upcoming",
            VideoStatus::Completed => "completed",
        })
    }
}

/// Whether a lookup may surface live/upcoming broadcasts or only published videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Upcoming,
    Latest,
}

impl QueryMode {
    pub const ALL: [QueryMode; 2] = [QueryMode::Upcoming, QueryMode::Latest];

    pub fn from_show_upcoming(show_upcoming: bool) -> Self {
        if show_upcoming {
            QueryMode::Upcoming
        } else {
            QueryMode::Latest
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryMode::Upcoming => "upcoming",
            QueryMode::Latest => "latest",
        }
    }

    pub fn cache_key(self) -> String {
        format!("ylvp_video_data_{}", self.as_str())
    }

    pub fn lock_key(self) -> String {
        format!("ylvp_fetch_lock_{}", self.as_str())
    }

    /// Last good record, kept well past its freshness for rate-limit fallback.
    pub fn fallback_key(self) -> String {
        format!("ylvp_video_fallback_{}", self.as_str())
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
pub(crate) fn meta(video_id: &str) -> VideoMeta {
    VideoMeta {
        video_id: video_id.to_string(),
        title: format!("Video {video_id}"),
        description: String::new(),
        published_at: "2024-06-01T10:00:00Z".parse().unwrap(),
        thumbnail: format!("https://i.ytimg.com/vi/{video_id}/hqdefault.jpg"),
    }
}
