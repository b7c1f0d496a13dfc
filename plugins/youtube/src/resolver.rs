//! Channel URL → channel id resolution.
//!
//! Channel ids never change for a given handle in practice, so successful resolutions are
//! cached for a week. Failures are never cached: a misconfigured URL costs a few cheap
//! `channels.list` calls per fetch until it is fixed.

use crate::config::Settings;
use crate::gate::{ApiGate, CallError};
use crate::quota::ApiCall;
use crate::store::{TransientStore, TransientStoreExt};
use crate::youtube_api::VideoPlatform;
use jiff::SignedDuration;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::{Arc, LazyLock};

const CACHE_PREFIX: &str = "ylvp_channel_id_";
const CACHE_TTL: SignedDuration = SignedDuration::from_hours(24 * 7);

static HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([^/?#]+)").expect("handle pattern is valid"));
static CHANNEL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"channel/([a-zA-Z0-9_-]+)").expect("channel id pattern is valid")
});

/// What a channel URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// `@name`, needs resolving
    Handle(String),
    /// `channel/UC...`, already an id
    Id(String),
}

impl ChannelRef {
    /// Handles win over channel ids when a URL somehow carries both.
    pub fn parse(channel_url: &str) -> Option<Self> {
        if let Some(captures) = HANDLE.captures(channel_url) {
            return Some(ChannelRef::Handle(captures[1].to_string()));
        }
        CHANNEL_ID
            .captures(channel_url)
            .map(|captures| ChannelRef::Id(captures[1].to_string()))
    }
}

fn cache_key(handle: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(handle.as_bytes());
    format!("{CACHE_PREFIX}{:x}", hasher.finalize())
}

pub struct ChannelResolver<P> {
    gate: Arc<ApiGate<P>>,
    store: Arc<dyn TransientStore>,
}

impl<P: VideoPlatform> ChannelResolver<P> {
    pub fn new(gate: Arc<ApiGate<P>>, store: Arc<dyn TransientStore>) -> Self {
        Self { gate, store }
    }

    /// Resolves the configured channel URL to a channel id.
    ///
    /// `None` covers every failure: unrecognized URL, missing key, or a handle that no lookup
    /// strategy could find. Callers treat it as "no video available".
    pub async fn resolve(&self, settings: &Settings) -> Option<String> {
        let Some(channel) = ChannelRef::parse(&settings.channel_url) else {
            self.gate.debug_log().push(format!(
                "channel URL not recognized: {}",
                settings.channel_url
            ));
            return None;
        };

        let handle = match channel {
            ChannelRef::Id(id) => return Some(id),
            ChannelRef::Handle(handle) => handle,
        };

        let key = cache_key(&handle);
        if let Some(id) = self.store.get_as::<String>(&key) {
            tracing::trace!(%handle, channel_id = %id, "channel id cache hit");
            return Some(id);
        }

        let id = self.lookup(&settings.api_key, &handle).await?;
        self.store.set_as(&key, &id, CACHE_TTL);
        tracing::info!(%handle, channel_id = %id, "resolved channel handle");
        Some(id)
    }

    /// The channel id if it is known without calling the API.
    pub fn peek(&self, settings: &Settings) -> Option<String> {
        match ChannelRef::parse(&settings.channel_url)? {
            ChannelRef::Id(id) => Some(id),
            ChannelRef::Handle(handle) => self.store.get_as(&cache_key(&handle)),
        }
    }

    /// Tries, in order: handle lookup, legacy username lookup, channel search.
    async fn lookup(&self, api_key: &str, handle: &str) -> Option<String> {
        let platform = self.gate.platform();
        let log = self.gate.debug_log();

        log.push(format!("trying forHandle for @{handle}"));
        let by_handle = self
            .gate
            .call(
                ApiCall::ChannelsList,
                platform.channel_for_handle(api_key, handle),
            )
            .await;
        if let Some(id) = self.found("forHandle", by_handle) {
            return Some(id);
        }

        log.push(format!("trying forUsername for {handle}"));
        let by_username = self
            .gate
            .call(
                ApiCall::ChannelsList,
                platform.channel_for_username(api_key, handle),
            )
            .await;
        if let Some(id) = self.found("forUsername", by_username) {
            return Some(id);
        }

        log.push(format!("trying channel search for {handle}"));
        let by_search = self
            .gate
            .call(ApiCall::SearchList, platform.search_channel(api_key, handle))
            .await;
        if let Some(id) = self.found("search", by_search) {
            return Some(id);
        }

        log.push(format!("could not resolve @{handle}"));
        None
    }

    fn found(&self, strategy: &str, result: Result<Option<String>, CallError>) -> Option<String> {
        match result {
            Ok(Some(id)) => {
                self.gate
                    .debug_log()
                    .push(format!("{strategy} found channel {id}"));
                Some(id)
            }
            Ok(None) => {
                tracing::debug!(strategy, "channel lookup returned no match");
                None
            }
            Err(e) => {
                tracing::debug!(strategy, error = %e, "channel lookup failed");
                None
            }
        }
    }

    /// Forgets every cached channel id.
    pub fn clear(&self) {
        let removed = self.store.delete_prefix(CACHE_PREFIX);
        tracing::debug!(removed, "cleared channel id cache");
    }
}
