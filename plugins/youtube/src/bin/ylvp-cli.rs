use clap::{Parser, Subcommand, ValueEnum};
use eyre::Context;
use jiff::Timestamp;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_latest_video::Widget;
use youtube_latest_video::clock::{Clock, SystemClock};
use youtube_latest_video::config::Settings;
use youtube_latest_video::poller::{
    Effect, HttpStatusSource, InitialView, Poller, ResponseOrdering, WidgetView,
};
use youtube_latest_video::record::{QueryMode, VideoStatus};
use youtube_latest_video::status::DebugInfo;
use youtube_latest_video::store::MemoryStore;
use youtube_latest_video::youtube_api::YouTubeClient;
use youtube_latest_video::youtube_api::client::{REQUEST_TIMEOUT, http_client};

/// Operator tooling for the latest-video widget.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the configured channel URL to a channel id.
    Resolve {
        #[arg(long, env = "YLVP_SETTINGS", default_value = "settings.json")]
        settings: PathBuf,
    },
    /// Run one lookup against the API and print the chosen video.
    Fetch {
        #[arg(long, env = "YLVP_SETTINGS", default_value = "settings.json")]
        settings: PathBuf,
        /// Defaults to what `show_upcoming` selects.
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },
    /// Follow a running widget server the way an embedded widget would, logging every update.
    Watch {
        /// Status endpoint, e.g. `http://127.0.0.1:8080/ylvp/status`.
        #[arg(long)]
        url: String,
        #[arg(long, env = "YLVP_STATUS_TOKEN")]
        nonce: String,
        /// The video the widget is showing.
        #[arg(long)]
        video_id: String,
        #[arg(long, value_enum, default_value = "live")]
        status: Status,
        /// Required for `--status upcoming`.
        #[arg(long)]
        scheduled_start: Option<Timestamp>,
        /// Apply late status responses instead of dropping them.
        #[arg(long)]
        last_write_wins: bool,
    },
    /// Print a running server's diagnostics: quota burn, rate-limit headroom, recent messages.
    Debug {
        /// Debug endpoint, e.g. `http://127.0.0.1:8080/ylvp/debug`.
        #[arg(long)]
        url: String,
        #[arg(long, env = "YLVP_STATUS_TOKEN")]
        nonce: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Upcoming,
    Latest,
}

impl From<Mode> for QueryMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Upcoming => QueryMode::Upcoming,
            Mode::Latest => QueryMode::Latest,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Status {
    Live,
    Upcoming,
    Completed,
}

impl From<Status> for VideoStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Live => VideoStatus::Live,
            Status::Upcoming => VideoStatus::Upcoming,
            Status::Completed => VideoStatus::Completed,
        }
    }
}

/// Prints display effects instead of touching a page.
struct LogView;

impl WidgetView for LogView {
    fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::UpdateCountdown(parts) => tracing::debug!(%parts, "countdown"),
            Effect::StartCountdown { target } => eprintln!("countdown to {target}"),
            Effect::ShowMessage(message) => eprintln!("{message}"),
            Effect::SwapContent { status, .. } => eprintln!("content swapped ({status})"),
            Effect::StartPlayer { video_id } => eprintln!("playing {video_id}"),
            other => tracing::trace!(?other, "ignored effect"),
        }
    }
}

async fn widget(path: &Path) -> eyre::Result<(Widget<YouTubeClient>, Settings)> {
    let settings = Settings::load(path).await?;
    if !settings.is_configured() {
        eyre::bail!("channel URL and API key must both be set");
    }
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new(Arc::clone(&clock)));
    let platform = YouTubeClient::new(http_client(REQUEST_TIMEOUT)?);
    let (_, settings_rx) = watch::channel(settings.clone());
    Ok((Widget::new(platform, store, clock, settings_rx), settings))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Resolve { settings } => {
            let (widget, settings) = widget(&settings).await?;
            let Some(channel_id) = widget.coordinator().resolver().resolve(&settings).await else {
                eyre::bail!("could not resolve {}", settings.channel_url);
            };
            println!("{channel_id}");
        }
        Command::Fetch { settings, mode } => {
            let (widget, settings) = widget(&settings).await?;
            let mode = mode.map_or_else(
                || QueryMode::from_show_upcoming(settings.show_upcoming),
                QueryMode::from,
            );
            let record = widget.coordinator().get_or_fetch(mode).await;
            let info = widget.debug_info();
            for message in &info.messages {
                eprintln!("{message}");
            }
            eprintln!("quota spent: {} units", info.quota_today);
            let Some(record) = record else {
                eyre::bail!("no video available");
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&record).context("serialize video")?
            );
        }
        Command::Watch {
            url,
            nonce,
            video_id,
            status,
            scheduled_start,
            last_write_wins,
        } => {
            let status = VideoStatus::from(status);
            if status == VideoStatus::Upcoming && scheduled_start.is_none() {
                eyre::bail!("--scheduled-start is required for an upcoming video");
            }
            let ordering = if last_write_wins {
                ResponseOrdering::LastWriteWins
            } else {
                ResponseOrdering::SequenceGuarded
            };
            let client = http_client(REQUEST_TIMEOUT)?;
            let source = Arc::new(HttpStatusSource::new(client, url, nonce));
            let (_visible, visibility) = watch::channel(true);
            let initial = InitialView {
                status,
                video_id,
                scheduled_start_time: scheduled_start,
            };
            tokio::select! {
                state = youtube_latest_video::poller::run(
                    Poller::new(ordering),
                    initial,
                    source,
                    LogView,
                    visibility,
                    Arc::new(SystemClock),
                ) => eprintln!("poller finished in {state:?}"),
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Command::Debug { url, nonce } => {
            let info: DebugInfo = http_client(REQUEST_TIMEOUT)?
                .get(&url)
                .query(&[("nonce", nonce.as_str())])
                .send()
                .await
                .context("send debug request")?
                .error_for_status()
                .context("debug request rejected")?
                .json()
                .await
                .context("parse debug response")?;
            println!("channel:        {}", info.channel_url);
            println!(
                "channel id:     {}",
                info.extracted_channel_id.as_deref().unwrap_or("(unresolved)")
            );
            println!("api key:        {}", info.api_key);
            println!("quota today:    {} units", info.quota_today);
            println!("calls left:     {} this minute", info.rate_limit_remaining);
            for message in &info.messages {
                println!("  {message}");
            }
        }
    }

    Ok(())
}
