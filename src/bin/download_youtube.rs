#![forbid(unsafe_code)]

//! Downloads a single video, a playlist or every upload of a channel.
//!
//! The identifier can be a video id or URL, a playlist URL, a channel id, a
//! `/user/` or `/@handle` URL, a bare `@handle`, or free text that is looked
//! up through channel search.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tubefetch_tools::acquire::{Acquirer, MergeMode, Resolution, Toolchain, output_folder};
use tubefetch_tools::config::{SettingsOverrides, resolve_settings};
use tubefetch_tools::logging::init_logging;
use tubefetch_tools::target::videos_for_input;

#[derive(Debug, Parser)]
#[command(name = "download_youtube", about = "Download YouTube videos, playlists and channels")]
struct Cli {
    /// Video, playlist or channel identifier.
    identifier: String,

    /// 8K, 4K, 1440p, 1080p, 720p, 480p, 360p, 240p or best.
    #[arg(default_value_t = Resolution::P1080)]
    resolution: Resolution,

    /// `combined` lets yt-dlp mux; `separate` merges with ffmpeg.
    #[arg(long, default_value_t = MergeMode::Combined)]
    merge: MergeMode,

    #[arg(long)]
    media_root: Option<PathBuf>,

    /// Alternate `.env` file.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Secret manager reference for the API key.
    #[arg(long)]
    api_key_ref: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = resolve_settings(SettingsOverrides {
        media_root: cli.media_root,
        api_key_ref: cli.api_key_ref,
        env_path: cli.env_file,
    })?;

    let toolchain = Toolchain {
        yt_dlp: settings.yt_dlp.clone(),
        ffmpeg: settings.ffmpeg.clone(),
    };
    toolchain.ensure_available(cli.merge)?;

    let output_dir = output_folder(&settings.media_root, &cli.identifier);

    println!("===================================");
    println!("YouTube Downloader");
    println!("===================================");
    println!("Input: {}", cli.identifier);
    println!("Resolution: {}", cli.resolution);
    println!("Merge mode: {}", cli.merge);
    println!("Output directory: {}", output_dir.display());
    println!();

    let videos = videos_for_input(&settings, &cli.identifier, None)?;
    if videos.is_empty() {
        println!("No videos found");
        return Ok(());
    }
    println!("Found {} videos", videos.len());
    println!();

    let acquirer = Acquirer::new(toolchain, output_dir, cli.resolution, cli.merge);
    let summary = acquirer.acquire_all(&videos);

    println!();
    println!("===================================");
    println!("Download complete!");
    println!("===================================");
    println!("Downloaded: {}", summary.downloaded);
    println!("Skipped: {}", summary.skipped);
    println!("Failed: {}", summary.failed.len());
    for video_id in &summary.failed {
        println!("  - {video_id}");
    }
    println!("Saved to: {}", acquirer.output_dir().display());
    Ok(())
}
