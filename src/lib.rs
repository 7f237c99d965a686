#![forbid(unsafe_code)]

//! Resolves YouTube videos, playlists and channels into video ids and
//! downloads them with yt-dlp.

pub mod acquire;
pub mod api;
pub mod classify;
pub mod config;
pub mod enumerate;
pub mod ids;
pub mod logging;
pub mod resolver;
pub mod secret;
pub mod target;
