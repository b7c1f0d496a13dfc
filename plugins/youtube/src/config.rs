//! Widget settings and server configuration.
//!
//! Settings are plain data handed to the components that need them. Changes are published on
//! a [`tokio::sync::watch`] channel; the coordinator consumes them and invalidates whatever the
//! change makes stale.

use eyre::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Environment variable that overrides [`Settings::api_key`].
pub const API_KEY_ENV: &str = "YLVP_API_KEY";
/// Environment variable that overrides [`Settings::channel_url`].
pub const CHANNEL_URL_ENV: &str = "YLVP_CHANNEL_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Channel page URL, either `.../@handle` or `.../channel/UC...`.
    pub channel_url: String,
    /// YouTube Data API v3 key.
    pub api_key: String,
    /// Seconds; the nominal cache duration shown on the debug surface. Effective TTLs are chosen
    /// per record state.
    pub cache_duration: u64,
    /// Surface live and upcoming broadcasts, not just published videos.
    pub show_upcoming: bool,
    /// Render upcoming broadcasts as a countdown rather than a player.
    pub countdown_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel_url: String::new(),
            api_key: String::new(),
            cache_duration: 300,
            show_upcoming: true,
            countdown_enabled: true,
        }
    }
}

impl Settings {
    /// Reads settings from a JSON file, then applies environment overrides.
    ///
    /// A missing file is not an error: the defaults (plus environment) are used, which renders
    /// as "no video available" until the channel and key are configured.
    pub async fn load(path: &Path) -> eyre::Result<Self> {
        let mut settings = if tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("check for settings file {}", path.display()))?
        {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read settings file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parse settings file {}", path.display()))?
        } else {
            tracing::warn!(path = %path.display(), "settings file not found, using defaults");
            Settings::default()
        };
        settings.apply_env(|name| std::env::var(name).ok());
        Ok(settings)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.api_key = key;
        }
        if let Some(url) = var(CHANNEL_URL_ENV).filter(|v| !v.is_empty()) {
            self.channel_url = url;
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.channel_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// Whether moving from `self` to `next` invalidates cached videos and channel ids.
    pub fn invalidates_cache(&self, next: &Settings) -> bool {
        self.channel_url != next.channel_url || self.api_key != next.api_key
    }

    /// The API key with everything past the first ten characters hidden.
    pub fn masked_api_key(&self) -> String {
        if self.api_key.is_empty() {
            return "NOT SET".to_string();
        }
        let visible: String = self.api_key.chars().take(10).collect();
        format!("{visible}...")
    }
}

/// How the HTTP endpoint is exposed.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Shared token that status, refresh, and debug requests must present as `nonce`.
    pub status_token: String,
    /// Public URL prefix embedded into rendered widgets for the poller to call back.
    pub public_url: String,
}
