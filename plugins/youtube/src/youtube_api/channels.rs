//! `channels.list` as used for handle and username lookups.

use serde::Deserialize;

/// Body of a `channels.list?part=id` response.
///
/// YouTube leaves `items` out entirely when a `forHandle`/`forUsername` filter matches nothing.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels/list>
#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelId>,
}

/// A channel resource with only its `id` part.
#[derive(Debug, Deserialize)]
pub struct ChannelId {
    pub id: String,
}

impl ChannelListResponse {
    /// The first matching channel's id.
    pub fn first_id(self) -> Option<String> {
        self.items.into_iter().next().map(|c| c.id)
    }
}
