#![forbid(unsafe_code)]

//! Decides what kind of target a raw command-line identifier points at.
//!
//! Precedence is fixed: video, then playlist (only when an explicit `list=`
//! parameter is present), then everything else is handed to the channel
//! resolver. A bare token is never treated as a playlist id, so handles and
//! free-text channel names cannot be mistaken for one.

use crate::ids::VideoId;
use regex::Regex;
use std::sync::LazyLock;

static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com/watch\?v=|youtu\.be/)([a-zA-Z0-9_-]{11})")
        .expect("valid video url pattern")
});
static PLAYLIST_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?youtube\.com/.*[?&]list=([a-zA-Z0-9_-]+)")
        .expect("valid playlist url pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Video(VideoId),
    Playlist(String),
    /// Anything else; may still fail to resolve to a channel.
    ChannelCandidate(String),
}

pub fn classify(input: &str) -> Classification {
    if let Some(id) = VideoId::parse(input) {
        return Classification::Video(id);
    }
    if let Some(captures) = VIDEO_URL.captures(input) {
        return Classification::Video(VideoId::from_listing(captures[4].to_owned()));
    }
    if let Some(captures) = PLAYLIST_URL.captures(input) {
        return Classification::Playlist(captures[3].to_owned());
    }
    Classification::ChannelCandidate(input.to_owned())
}
