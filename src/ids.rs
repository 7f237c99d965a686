#![forbid(unsafe_code)]

//! Strongly typed identifiers handed between the classifier, the resolver and
//! the enumerator.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("valid video id pattern"));
static CHANNEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[a-zA-Z0-9_-]{22}$").expect("valid channel id pattern"));

/// Eleven character token identifying a single upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Accepts only bare tokens; URLs go through [`crate::classify::classify`].
    pub fn parse(value: &str) -> Option<Self> {
        VIDEO_ID.is_match(value).then(|| Self(value.to_owned()))
    }

    /// Wraps an id reported by the listing API. The API is trusted here so a
    /// malformed id still reaches the downloader, which reports it properly.
    pub(crate) fn from_listing(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL handed to yt-dlp.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A channel id (`UC` + 22 characters). Only the resolver and the API layer
/// construct these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        CHANNEL_ID.is_match(value).then(|| Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
