#![forbid(unsafe_code)]

//! Glue between classification, channel resolution and enumeration: turns a
//! classified input into something that can produce video ids.

use anyhow::Context;
use std::fmt;

use crate::api::{DataApiClient, ListingApi};
use crate::classify::{Classification, classify};
use crate::config::Settings;
use crate::enumerate::{PlaylistEnumeration, uploads_playlist};
use crate::ids::{ChannelId, VideoId};
use crate::resolver::ChannelResolver;
use crate::secret::load_api_key;

#[derive(Debug, thiserror::Error)]
#[error("failed to resolve a channel from {input:?}")]
pub struct ChannelNotFound {
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Video(VideoId),
    Playlist(String),
    Channel {
        channel: ChannelId,
        /// `None` when the uploads playlist lookup failed; the channel then
        /// has no videos to offer.
        uploads: Option<String>,
    },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Video(id) => write!(f, "video {id}"),
            Target::Playlist(id) => write!(f, "playlist {id}"),
            Target::Channel { channel, .. } => write!(f, "channel {channel}"),
        }
    }
}

/// Resolves channel candidates (and their uploads playlist). Videos and
/// playlists pass through without any API call.
pub fn locate(
    classification: Classification,
    api: &dyn ListingApi,
    resolver: &ChannelResolver,
) -> Result<Target, ChannelNotFound> {
    match classification {
        Classification::Video(id) => Ok(Target::Video(id)),
        Classification::Playlist(id) => Ok(Target::Playlist(id)),
        Classification::ChannelCandidate(input) => {
            let channel = resolver
                .resolve(&input, api)
                .ok_or(ChannelNotFound { input })?;
            let uploads = uploads_playlist(api, &channel);
            Ok(Target::Channel { channel, uploads })
        }
    }
}

impl Target {
    fn playlist(&self) -> Option<&str> {
        match self {
            Target::Video(_) => None,
            Target::Playlist(id) => Some(id.as_str()),
            Target::Channel { uploads, .. } => uploads.as_deref(),
        }
    }

    /// Video ids in server order, at most `limit` of them. Enumeration stops
    /// as soon as the limit is reached, so later pages are never requested.
    pub fn videos<A: ListingApi + ?Sized>(&self, api: &A, limit: Option<usize>) -> Vec<VideoId> {
        if let Target::Video(id) = self {
            return vec![id.clone()];
        }
        let Some(playlist) = self.playlist() else {
            return Vec::new();
        };
        let walk = PlaylistEnumeration::new(api, playlist).walk();
        match limit {
            Some(limit) => walk.take(limit).collect(),
            None => walk.collect(),
        }
    }
}

/// Raw input to video ids. The API key is only loaded when the input is not
/// a direct video.
pub fn videos_for_input(
    settings: &Settings,
    input: &str,
    limit: Option<usize>,
) -> anyhow::Result<Vec<VideoId>> {
    let classification = classify(input);
    if let Classification::Video(id) = classification {
        return Ok(vec![id]);
    }

    let key = load_api_key(settings).context("loading YouTube Data API key")?;
    let client = DataApiClient::new(&settings.api_base, key);
    let target = locate(classification, &client, &ChannelResolver::default())?;
    tracing::info!(%target, "resolved input");

    let videos = target.videos(&client, limit);
    tracing::debug!(count = videos.len(), "enumerated videos");
    Ok(videos)
}
