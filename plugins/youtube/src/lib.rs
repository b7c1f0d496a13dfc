//! Embeddable "latest or upcoming video" widget for a single YouTube channel.
//!
//! The server side decides which video to show ([`coordinator`], [`fetcher`], [`resolver`]) while
//! keeping API usage inside a per-minute ceiling ([`rate_limit`]) and making daily quota burn
//! visible ([`quota`]). The client side ([`poller`]) keeps an already rendered widget in sync as
//! the channel goes from countdown to live to replay to the next broadcast.
//!
//! [`Widget`] wires the server-side pieces together and is what the HTTP endpoint in [`server`]
//! and the operator CLI talk to.

use crate::clock::Clock;
use crate::config::Settings;
use crate::coordinator::Coordinator;
use crate::debug_log::DebugLog;
use crate::gate::ApiGate;
use crate::quota::QuotaTracker;
use crate::rate_limit::RateLimiter;
use crate::record::{QueryMode, VideoRecord};
use crate::render::WidgetOptions;
use crate::status::{DebugInfo, StatusData};
use crate::store::TransientStore;
use crate::youtube_api::VideoPlatform;
use std::sync::Arc;
use tokio::sync::watch;

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod debug_log;
pub mod duration;
pub mod fetcher;
pub mod gate;
pub mod poller;
pub mod quota;
pub mod rate_limit;
pub mod record;
pub mod render;
pub mod resolver;
pub mod server;
pub mod status;
pub mod store;
pub mod youtube_api;

#[cfg(test)]
pub(crate) mod testing;

/// The server-side widget: settings in, rendered fragments and status payloads out.
pub struct Widget<P> {
    coordinator: Coordinator<P>,
    clock: Arc<dyn Clock>,
}

impl<P: VideoPlatform> Widget<P> {
    pub fn new(
        platform: P,
        store: Arc<dyn TransientStore>,
        clock: Arc<dyn Clock>,
        settings: watch::Receiver<Settings>,
    ) -> Self {
        let gate = Arc::new(ApiGate::new(
            platform,
            RateLimiter::new(Arc::clone(&store), Arc::clone(&clock)),
            QuotaTracker::new(Arc::clone(&store), Arc::clone(&clock)),
            DebugLog::new(Arc::clone(&store), Arc::clone(&clock)),
        ));
        Self {
            coordinator: Coordinator::new(gate, store, Arc::clone(&clock), settings),
            clock,
        }
    }

    pub fn coordinator(&self) -> &Coordinator<P> {
        &self.coordinator
    }

    async fn record(&self, mode: QueryMode, refresh: bool) -> Option<VideoRecord> {
        if refresh {
            self.coordinator.refresh(mode).await
        } else {
            self.coordinator.get_or_fetch(mode).await
        }
    }

    /// The full widget fragment for one embed.
    ///
    /// Never fails: without a video this is the "unable to load" message.
    pub async fn render(&self, options: &WidgetOptions, status_url: &str) -> String {
        let settings = self.coordinator.settings();
        let record = self.record(options.mode(&settings), options.refresh).await;
        let debug = options.debug.then(|| self.debug_info());

        let Some(record) = record else {
            return render::error(debug.as_ref());
        };
        let now = self.clock.now();
        let mut html = render::widget(&record, &settings, options, now, status_url);
        if let Some(info) = &debug {
            html.push_str(&render::debug_block(info, Some(&record), Some(now)));
        }
        html
    }

    /// What a status poll should be told, given the video the caller is currently showing.
    pub async fn status(&self, current_video_id: Option<&str>) -> Option<StatusData> {
        let settings = self.coordinator.settings();
        let mode = QueryMode::from_show_upcoming(settings.show_upcoming);
        let record = self.coordinator.get_or_fetch(mode).await?;
        let html = render::content(
            &record,
            &settings,
            &WidgetOptions::default(),
            self.clock.now(),
        );
        Some(StatusData::new(&record, html, current_video_id))
    }

    /// Drops cached records and renders the widget from a fresh fetch.
    pub async fn refresh(&self, status_url: &str) -> String {
        let options = WidgetOptions {
            refresh: true,
            ..WidgetOptions::default()
        };
        self.render(&options, status_url).await
    }

    pub fn debug_info(&self) -> DebugInfo {
        let settings = self.coordinator.settings();
        let gate = self.coordinator.gate();
        DebugInfo {
            extracted_channel_id: self.coordinator.resolver().peek(&settings),
            api_key: settings.masked_api_key(),
            channel_url: settings.channel_url,
            cache_duration: settings.cache_duration,
            show_upcoming: settings.show_upcoming,
            countdown_enabled: settings.countdown_enabled,
            messages: gate.debug_log().messages(),
            quota_today: gate.quota().usage_today(),
            rate_limit_remaining: gate.limiter().remaining(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::testing::{FakePlatform, START};
    use crate::youtube_api::SearchFilter;
    use pretty_assertions::assert_eq;

    fn widget(settings: Settings) -> (Widget<Arc<FakePlatform>>, Arc<FakePlatform>) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(START.parse().unwrap()));
        let store = Arc::new(MemoryStore::new(Arc::clone(&clock)));
        let platform = Arc::new(FakePlatform::default());
        let (_tx, rx) = watch::channel(settings);
        (
            Widget::new(Arc::clone(&platform), store, clock, rx),
            platform,
        )
    }

    fn configured() -> Settings {
        Settings {
            channel_url: "https://www.youtube.com/channel/UC1".into(),
            api_key: "AIzaSyA1234567890".into(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn unconfigured_widget_renders_the_error() {
        let (widget, _) = widget(Settings::default());
        let html = widget.render(&WidgetOptions::default(), "/ylvp/status").await;
        assert_eq!(
            html,
            r#"<div class="ylvp-error">Unable to load video. Please check your settings.</div>"#
        );
        assert_eq!(widget.status(None).await, None);
    }

    #[tokio::test]
    async fn status_reports_the_current_video() {
        let (widget, platform) = widget(configured());
        platform.add_search(SearchFilter::Live, "live1");

        let status = widget.status(Some("old")).await.unwrap();
        assert_eq!(status.video_id, "live1");
        assert!(status.is_live && status.video_changed);
        assert!(status.html.starts_with("<iframe"));

        let status = widget.status(Some("live1")).await.unwrap();
        assert!(!status.video_changed);
    }

    #[tokio::test]
    async fn debug_widget_includes_diagnostics() {
        let (widget, platform) = widget(configured());
        platform.add_search(SearchFilter::Completed, "replay1");
        let options = WidgetOptions {
            debug: true,
            ..WidgetOptions::default()
        };

        let html = widget.render(&options, "/ylvp/status").await;
        assert!(html.contains("Success Debug Information"));
        assert!(html.contains("API Key: AIzaSyA123..."));
        assert!(html.contains("Extracted Channel ID: UC1"));

        let info = widget.debug_info();
        // one search.list for live, one for upcoming, one for completed
        assert_eq!(info.quota_today, 300);
        assert_eq!(info.rate_limit_remaining, 7);
    }
}
