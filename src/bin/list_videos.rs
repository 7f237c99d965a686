#![forbid(unsafe_code)]

//! Prints the video ids behind a video, playlist or channel identifier
//! without downloading anything.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tubefetch_tools::config::{SettingsOverrides, resolve_settings};
use tubefetch_tools::ids::VideoId;
use tubefetch_tools::logging::init_logging;
use tubefetch_tools::target::videos_for_input;

#[derive(Debug, Parser)]
#[command(name = "list_videos", about = "List the video ids behind a YouTube identifier")]
struct Cli {
    identifier: String,

    /// Stop after this many ids; later pages are not requested.
    #[arg(long)]
    limit: Option<usize>,

    /// Alternate `.env` file.
    #[arg(long)]
    env_file: Option<PathBuf>,

    #[arg(long)]
    api_key_ref: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn render(videos: &[VideoId]) -> String {
    let mut out = format!("\nTotal number of videos: {}\n\nVideo IDs:\n", videos.len());
    for video_id in videos {
        out.push_str(video_id.as_str());
        out.push('\n');
    }
    out
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = resolve_settings(SettingsOverrides {
        api_key_ref: cli.api_key_ref,
        env_path: cli.env_file,
        ..SettingsOverrides::default()
    })?;

    let videos = videos_for_input(&settings, &cli.identifier, cli.limit)?;
    print!("{}", render(&videos));
    Ok(())
}
