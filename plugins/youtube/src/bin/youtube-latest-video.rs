use clap::Parser;
use eyre::Context;
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_latest_video::Widget;
use youtube_latest_video::clock::{Clock, SystemClock};
use youtube_latest_video::config::{ServerConfig, Settings};
use youtube_latest_video::server::{App, serve};
use youtube_latest_video::store::MemoryStore;
use youtube_latest_video::youtube_api::client::{REQUEST_TIMEOUT, YouTubeClient, http_client};

/// Serves the latest-video widget and its status endpoint.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Widget settings (JSON). Re-read on SIGHUP.
    #[arg(long, env = "YLVP_SETTINGS", default_value = "settings.json")]
    settings: PathBuf,

    #[arg(long, env = "YLVP_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Token that status, refresh, and debug requests must send as `nonce`.
    #[arg(long, env = "YLVP_STATUS_TOKEN")]
    status_token: String,

    /// URL prefix this server is reachable at from the browser.
    #[arg(long, env = "YLVP_PUBLIC_URL", default_value = "http://127.0.0.1:8080")]
    public_url: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let args = Args::parse();
    let settings = Settings::load(&args.settings).await?;
    if !settings.is_configured() {
        tracing::warn!("channel URL or API key missing, widget will show the error message");
    }
    let (settings_tx, settings_rx) = watch::channel(settings);

    let mut hangup = signal(SignalKind::hangup()).context("install SIGHUP handler")?;
    let path = args.settings.clone();
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match Settings::load(&path).await {
                Ok(settings) => {
                    tracing::info!(path = %path.display(), "settings reloaded");
                    settings_tx.send_replace(settings);
                }
                Err(e) => tracing::warn!(error = %format!("{e:#}"), "settings reload failed"),
            }
        }
    });

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new(Arc::clone(&clock)));
    let platform = YouTubeClient::new(http_client(REQUEST_TIMEOUT)?);
    let widget = Arc::new(Widget::new(platform, store, clock, settings_rx));

    let config = ServerConfig {
        listen: args.listen,
        status_token: args.status_token,
        public_url: args.public_url,
    };
    let app = Arc::new(App::new(widget, &config));
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("bind {}", config.listen))?;

    tokio::select! {
        result = serve(listener, app) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
