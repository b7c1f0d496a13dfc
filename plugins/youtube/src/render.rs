//! Widget HTML fragments.

use crate::config::Settings;
use crate::record::{QueryMode, VideoRecord};
use crate::status::{DebugInfo, UNAVAILABLE};
use jiff::Timestamp;
use std::fmt::{self, Write};

/// Per-embed options, as given in the widget URL's query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetOptions {
    pub width: u32,
    pub height: u32,
    pub autoplay: bool,
    /// Overrides [`Settings::show_upcoming`] for this embed.
    pub show_upcoming: Option<bool>,
    pub debug: bool,
    /// Drop cached records before rendering.
    pub refresh: bool,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            width: 560,
            height: 315,
            autoplay: false,
            show_upcoming: None,
            debug: false,
            refresh: false,
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "yes")
}

impl WidgetOptions {
    /// Unknown keys and unparseable values are ignored.
    pub fn from_query(query: &str) -> Self {
        let mut options = Self::default();
        for (k, v) in form_urlencoded::parse(query.as_bytes()) {
            match &*k {
                "width" => options.width = v.parse().unwrap_or(options.width),
                "height" => options.height = v.parse().unwrap_or(options.height),
                "autoplay" => options.autoplay = flag(&v),
                "show_upcoming" => options.show_upcoming = Some(flag(&v)),
                "debug" => options.debug = flag(&v),
                "refresh" => options.refresh = flag(&v),
                _ => {}
            }
        }
        options
    }

    pub fn mode(&self, settings: &Settings) -> QueryMode {
        QueryMode::from_show_upcoming(self.show_upcoming.unwrap_or(settings.show_upcoming))
    }
}

/// Escapes text for use in element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Time left until a countdown target, split for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountdownParts {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl CountdownParts {
    /// All zeros once `target` has passed.
    pub fn until(target: Timestamp, now: Timestamp) -> Self {
        let left = (target.as_second() - now.as_second()).max(0);
        Self {
            days: left / 86_400,
            hours: left % 86_400 / 3_600,
            minutes: left % 3_600 / 60,
            seconds: left % 60,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for CountdownParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}d {:02}h {:02}m {:02}s",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

pub fn player(video_id: &str, title: &str, options: &WidgetOptions) -> String {
    format!(
        r#"<iframe class="ylvp-clean-iframe" width="{width}" height="{height}" src="https://www.youtube.com/embed/{id}?rel=0{autoplay}" title="{title}" frameborder="0" allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture; web-share" allowfullscreen></iframe>"#,
        width = options.width,
        height = options.height,
        id = escape(video_id),
        autoplay = if options.autoplay { "&amp;autoplay=1" } else { "" },
        title = escape(title),
    )
}

pub fn countdown(record: &VideoRecord, target: Timestamp, now: Timestamp) -> String {
    let parts = CountdownParts::until(target, now);
    let title = escape(record.title());
    let mut html = String::new();
    html.push_str(r#"<div class="ylvp-countdown-wrapper"><div class="ylvp-upcoming-info">"#);
    html.push_str(r#"<h3 class="ylvp-upcoming-title">Upcoming Video</h3>"#);
    let _ = write!(html, r#"<h4 class="ylvp-video-title">{title}</h4></div>"#);
    let _ = write!(
        html,
        r#"<div class="ylvp-countdown" data-target="{target}"><div class="ylvp-countdown-display">"#
    );
    for (class, label, value) in [
        ("ylvp-days", "Days", parts.days),
        ("ylvp-hours", "Hours", parts.hours),
        ("ylvp-minutes", "Minutes", parts.minutes),
        ("ylvp-seconds", "Seconds", parts.seconds),
    ] {
        let _ = write!(
            html,
            r#"<div class="ylvp-time-unit"><span class="{class}">{value:02}</span><label>{label}</label></div>"#
        );
    }
    html.push_str(r#"</div><div class="ylvp-countdown-message">Until stream starts</div></div>"#);
    let _ = write!(
        html,
        r#"<div class="ylvp-video-placeholder"><img src="{thumbnail}" alt="{title}" class="ylvp-thumbnail" /><div class="ylvp-play-overlay">&#x23F0;</div></div></div>"#,
        thumbnail = escape(record.thumbnail()),
    );
    html
}

/// The inner content for `record`: a countdown for upcoming broadcasts (when enabled), a
/// player otherwise.
pub fn content(
    record: &VideoRecord,
    settings: &Settings,
    options: &WidgetOptions,
    now: Timestamp,
) -> String {
    match record.scheduled_start_time() {
        Some(target) if record.is_upcoming() && settings.countdown_enabled => {
            countdown(record, target, now)
        }
        _ => player(record.video_id(), record.title(), options),
    }
}

/// A full widget: the content wrapped in a container the status poller can pick up.
pub fn widget(
    record: &VideoRecord,
    settings: &Settings,
    options: &WidgetOptions,
    now: Timestamp,
    status_url: &str,
) -> String {
    let mut html = String::from(r#"<div class="ylvp-container"#);
    if record.is_upcoming() {
        html.push_str(" ylvp-upcoming");
    }
    let _ = write!(
        html,
        r#"" data-video-id="{id}" data-status="{status}" data-status-url="{url}""#,
        id = escape(record.video_id()),
        status = record.status(),
        url = escape(status_url),
    );
    if let Some(start) = record.scheduled_start_time() {
        let _ = write!(html, r#" data-scheduled-start="{start}""#);
    }
    html.push('>');
    html.push_str(&content(record, settings, options, now));
    html.push_str("</div>");
    html
}

/// The "no video" message, optionally followed by diagnostics.
pub fn error(debug: Option<&DebugInfo>) -> String {
    let mut html = format!(r#"<div class="ylvp-error">{UNAVAILABLE}"#);
    if let Some(info) = debug {
        html.push_str(&debug_block(info, None, None));
    }
    html.push_str("</div>");
    html
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

/// Diagnostics appended to a widget rendered with `debug=1`.
pub fn debug_block(info: &DebugInfo, record: Option<&VideoRecord>, now: Option<Timestamp>) -> String {
    let mut lines: Vec<(&str, String)> = Vec::new();
    if let Some(record) = record {
        lines.push(("Video ID", record.video_id().to_string()));
        lines.push(("Title", record.title().to_string()));
        lines.push(("Is Upcoming", yes_no(record.is_upcoming()).to_string()));
        lines.push(("Is Live", yes_no(record.is_live()).to_string()));
        lines.push((
            "Scheduled Start",
            record
                .scheduled_start_time()
                .map_or_else(|| "None".to_string(), |t| t.to_string()),
        ));
    }
    if let Some(now) = now {
        lines.push(("Current Time", now.to_string()));
    }
    let channel_url = if info.channel_url.is_empty() {
        "NOT SET".to_string()
    } else {
        info.channel_url.clone()
    };
    lines.push(("Channel URL", channel_url));
    lines.push(("API Key", info.api_key.clone()));
    lines.push(("Cache Duration", format!("{} seconds", info.cache_duration)));
    lines.push(("Show Upcoming", yes_no(info.show_upcoming).to_string()));
    lines.push(("Countdown Enabled", yes_no(info.countdown_enabled).to_string()));
    lines.push((
        "Extracted Channel ID",
        info.extracted_channel_id
            .clone()
            .unwrap_or_else(|| "FAILED TO EXTRACT".to_string()),
    ));
    lines.push(("Quota Used Today", format!("{} units", info.quota_today)));
    lines.push(("Calls Left This Minute", info.rate_limit_remaining.to_string()));

    let heading = if record.is_some() {
        "Success Debug Information"
    } else {
        "Debug Information"
    };
    let mut html = format!(r#"<div class="ylvp-debug-info"><strong>{heading}:</strong><br>"#);
    for (key, value) in lines {
        let _ = write!(html, "{}: {}<br>", escape(key), escape(&value));
    }
    if !info.messages.is_empty() {
        html.push_str("<strong>API Debug Messages:</strong><br>");
        for message in &info.messages {
            let _ = write!(html, "&bull; {}<br>", escape(message));
        }
    }
    html.push_str("</div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::meta;
    use jiff::SignedDuration;
    use pretty_assertions::assert_eq;

    fn now() -> Timestamp {
        "2024-06-02T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn parses_widget_query() {
        let options = WidgetOptions::from_query("width=640&autoplay=1&show_upcoming=0&height=abc");
        assert_eq!(
            options,
            WidgetOptions {
                width: 640,
                autoplay: true,
                show_upcoming: Some(false),
                ..WidgetOptions::default()
            }
        );
        assert_eq!(options.mode(&Settings::default()), QueryMode::Latest);
        assert_eq!(
            WidgetOptions::default().mode(&Settings::default()),
            QueryMode::Upcoming
        );
    }

    #[test]
    fn countdown_parts() {
        let target = now() + SignedDuration::from_secs(90_061);
        let parts = CountdownParts::until(target, now());
        assert_eq!(
            parts,
            CountdownParts {
                days: 1,
                hours: 1,
                minutes: 1,
                seconds: 1
            }
        );
        assert_eq!(parts.to_string(), "01d 01h 01m 01s");
        assert!(CountdownParts::until(now(), target).is_zero());
    }

    #[test]
    fn player_markup() {
        let options = WidgetOptions {
            autoplay: true,
            ..WidgetOptions::default()
        };
        insta::assert_snapshot!(
            player("abc", "Morning \"Worship\"", &options),
            @r#"<iframe class="ylvp-clean-iframe" width="560" height="315" src="https://www.youtube.com/embed/abc?rel=0&amp;autoplay=1" title="Morning &quot;Worship&quot;" frameborder="0" allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture; web-share" allowfullscreen></iframe>"#
        );
    }

    #[test]
    fn upcoming_renders_a_countdown_unless_disabled() {
        let target = now() + SignedDuration::from_secs(3_600);
        let record = VideoRecord::upcoming(meta("abc"), target);
        let settings = Settings::default();

        let html = content(&record, &settings, &WidgetOptions::default(), now());
        assert!(html.contains(r#"data-target="2024-06-02T13:00:00Z""#));
        assert!(html.contains(r#"<span class="ylvp-hours">01</span>"#));
        assert!(html.contains(r#"<span class="ylvp-minutes">00</span>"#));

        let settings = Settings {
            countdown_enabled: false,
            ..settings
        };
        let html = content(&record, &settings, &WidgetOptions::default(), now());
        assert!(html.starts_with("<iframe"));
    }

    #[test]
    fn widget_container_carries_state() {
        let record = VideoRecord::live(meta("abc"));
        let html = widget(
            &record,
            &Settings::default(),
            &WidgetOptions::default(),
            now(),
            "http://localhost:8080/ylvp/status",
        );
        assert!(html.starts_with(
            r#"<div class="ylvp-container" data-video-id="abc" data-status="live" data-status-url="http://localhost:8080/ylvp/status"><iframe"#
        ));
        assert!(html.ends_with("</iframe></div>"));
    }

    #[test]
    fn error_with_debug_details() {
        let info = DebugInfo {
            channel_url: String::new(),
            api_key: "NOT SET".into(),
            cache_duration: 300,
            show_upcoming: true,
            countdown_enabled: true,
            extracted_channel_id: None,
            messages: vec!["[t] <oops>".into()],
            quota_today: 0,
            rate_limit_remaining: 10,
        };
        assert_eq!(
            error(None),
            r#"<div class="ylvp-error">Unable to load video. Please check your settings.</div>"#
        );
        insta::assert_snapshot!(
            error(Some(&info)),
            @r#"<div class="ylvp-error">Unable to load video. Please check your settings.<div class="ylvp-debug-info"><strong>Debug Information:</strong><br>Channel URL: NOT SET<br>API Key: NOT SET<br>Cache Duration: 300 seconds<br>Show Upcoming: Yes<br>Countdown Enabled: Yes<br>Extracted Channel ID: FAILED TO EXTRACT<br>Quota Used Today: 0 units<br>Calls Left This Minute: 10<br><strong>API Debug Messages:</strong><br>&bull; [t] &lt;oops&gt;<br></div></div>"#
        );
    }
}
