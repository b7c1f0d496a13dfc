//! JSON payloads exchanged between the HTTP endpoint and the status poller.

use crate::record::{VideoRecord, VideoStatus};
use eyre::Context;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Shown whenever no video can be produced.
pub const UNAVAILABLE: &str = "Unable to load video. Please check your settings.";

/// `{"success": .., "data": ..}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub message: String,
}

impl Envelope<Failure> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Failure {
                message: message.into(),
            },
        }
    }
}

/// Answer to a status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusData {
    pub status: VideoStatus,
    pub video_id: String,
    pub is_live: bool,
    pub is_upcoming: bool,
    pub scheduled_start_time: Option<Timestamp>,
    /// Widget content for the new state, ready to swap in.
    pub html: String,
    /// Whether `video_id` differs from what the caller says it is showing.
    pub video_changed: bool,
}

impl StatusData {
    /// A caller that reports no current video is treated as showing something else.
    pub fn new(record: &VideoRecord, html: String, current_video_id: Option<&str>) -> Self {
        let video_changed = current_video_id
            .filter(|id| !id.is_empty())
            .is_none_or(|id| id != record.video_id());
        Self {
            status: record.status(),
            video_id: record.video_id().to_string(),
            is_live: record.is_live(),
            is_upcoming: record.is_upcoming(),
            scheduled_start_time: record.scheduled_start_time(),
            html,
            video_changed,
        }
    }
}

/// Answer to a forced refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshData {
    pub html: String,
}

/// Diagnostics for `/ylvp/debug` and `debug=1` widgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub channel_url: String,
    pub api_key: String,
    pub cache_duration: u64,
    pub show_upcoming: bool,
    pub countdown_enabled: bool,
    /// `None` when the URL is unrecognized or its handle has not been resolved yet.
    pub extracted_channel_id: Option<String>,
    pub messages: Vec<String>,
    pub quota_today: u64,
    pub rate_limit_remaining: u64,
}

/// Decodes a status endpoint body into either the status or the server's failure message.
pub fn parse_status(body: &[u8]) -> eyre::Result<Result<StatusData, String>> {
    let envelope: Envelope<serde_json::Value> =
        serde_json::from_slice(body).context("parse status envelope")?;
    if envelope.success {
        let data = serde_json::from_value(envelope.data).context("parse status data")?;
        Ok(Ok(data))
    } else {
        let failure: Failure =
            serde_json::from_value(envelope.data).context("parse status failure")?;
        Ok(Err(failure.message))
    }
}
