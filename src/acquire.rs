#![forbid(unsafe_code)]

//! Downloads resolved videos one at a time with yt-dlp (and optionally
//! ffmpeg) into a single merged `.mp4` per video.
//!
//! Output files are named after the cleaned video title plus the requested
//! resolution label. A file that already exists at that path is never
//! downloaded again, which makes re-running a channel or playlist cheap.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use crate::ids::VideoId;

const FORBIDDEN_FILENAME_CHARS: &[char] = &['"', '*', '\\', '/', '\'', '.', '|', '?', ':', '<', '>'];
const MAX_TITLE_CHARS: usize = 176;
const TRUNCATED_TITLE_CHARS: usize = 170;
const DEFAULT_TITLE: &str = "video";
const DEFAULT_FOLDER: &str = "saved_videos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    P4320,
    P2160,
    P1440,
    #[default]
    P1080,
    P720,
    P480,
    P360,
    P240,
    Best,
}

impl Resolution {
    pub const ALL: [Resolution; 9] = [
        Resolution::P4320,
        Resolution::P2160,
        Resolution::P1440,
        Resolution::P1080,
        Resolution::P720,
        Resolution::P480,
        Resolution::P360,
        Resolution::P240,
        Resolution::Best,
    ];

    /// Label used on the command line and in output file names.
    pub fn label(self) -> &'static str {
        match self {
            Resolution::P4320 => "8K",
            Resolution::P2160 => "4K",
            Resolution::P1440 => "1440p",
            Resolution::P1080 => "1080p",
            Resolution::P720 => "720p",
            Resolution::P480 => "480p",
            Resolution::P360 => "360p",
            Resolution::P240 => "240p",
            Resolution::Best => "best",
        }
    }

    pub fn max_height(self) -> Option<u32> {
        match self {
            Resolution::P4320 => Some(4320),
            Resolution::P2160 => Some(2160),
            Resolution::P1440 => Some(1440),
            Resolution::P1080 => Some(1080),
            Resolution::P720 => Some(720),
            Resolution::P480 => Some(480),
            Resolution::P360 => Some(360),
            Resolution::P240 => Some(240),
            Resolution::Best => None,
        }
    }

    /// yt-dlp format selector for the video-only stream.
    pub fn video_selector(self) -> String {
        match self.max_height() {
            Some(height) => format!("bestvideo[height<={height}]"),
            None => "bestvideo".to_string(),
        }
    }

    /// Selector that lets yt-dlp fetch and mux both streams itself.
    pub fn combined_selector(self) -> String {
        format!("{}+bestaudio/best", self.video_selector())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Resolution::ALL
            .into_iter()
            .find(|resolution| resolution.label().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                let accepted: Vec<&str> = Resolution::ALL.iter().map(|r| r.label()).collect();
                format!(
                    "unknown resolution {value:?} (expected one of {})",
                    accepted.join(", ")
                )
            })
    }
}

/// How the video and audio streams end up in one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// One yt-dlp run; yt-dlp picks and muxes both streams.
    #[default]
    Combined,
    /// Video and audio fetched separately, then muxed with `ffmpeg -c copy`.
    Separate,
}

impl MergeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMode::Combined => "combined",
            MergeMode::Separate => "separate",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "combined" => Ok(MergeMode::Combined),
            "separate" => Ok(MergeMode::Separate),
            other => Err(format!(
                "unknown merge mode {other:?} (expected combined or separate)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toolchain {
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Toolchain {
    /// Fails loudly before a batch starts when a required tool is missing.
    pub fn ensure_available(&self, mode: MergeMode) -> Result<()> {
        ensure_program_available(&self.yt_dlp, "--version")?;
        if mode == MergeMode::Separate {
            ensure_program_available(&self.ffmpeg, "-version")?;
        }
        Ok(())
    }
}

/// Runs `<program> <flag>` to check that it exists and starts.
pub fn ensure_program_available(program: &Path, version_flag: &str) -> Result<()> {
    let status = Command::new(program)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!(
            "{} is installed but returned a failure status",
            program.display()
        ),
        Err(err) => bail!(
            "{} is not installed or not in PATH: {}",
            program.display(),
            err
        ),
    }
}

/// Replaces characters that are unsafe in file names and caps very long
/// titles at 170 characters plus `...`.
pub fn clean_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if FORBIDDEN_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.chars().count() >= MAX_TITLE_CHARS {
        let mut truncated: String = cleaned.chars().take(TRUNCATED_TITLE_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        cleaned.to_string()
    }
}

/// Where a run stores its files: `@handle` input gets its own folder, every
/// other input shares `saved_videos`.
pub fn output_folder(media_root: &Path, raw_input: &str) -> PathBuf {
    match raw_input.strip_prefix('@') {
        Some(handle) if !handle.is_empty() => media_root.join(clean_filename(handle)),
        _ => media_root.join(DEFAULT_FOLDER),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Downloaded(PathBuf),
    /// The target file was already on disk.
    Skipped(PathBuf),
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: Vec<VideoId>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed.len()
    }
}

/// Subset of `yt-dlp --dump-single-json` we care about.
#[derive(Deserialize)]
struct VideoInfo {
    title: Option<String>,
}

pub struct Acquirer {
    toolchain: Toolchain,
    output_dir: PathBuf,
    resolution: Resolution,
    mode: MergeMode,
}

impl Acquirer {
    pub fn new(
        toolchain: Toolchain,
        output_dir: PathBuf,
        resolution: Resolution,
        mode: MergeMode,
    ) -> Self {
        Self {
            toolchain,
            output_dir,
            resolution,
            mode,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Final path for a video with the given (raw) title.
    pub fn output_path(&self, title: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.mp4", clean_filename(title), self.resolution.label()))
    }

    /// Downloads every id in order. A failing video is reported and the batch
    /// moves on.
    pub fn acquire_all(&self, ids: &[VideoId]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let total = ids.len();
        for (index, video_id) in ids.iter().enumerate() {
            println!("[{}/{}] {}", index + 1, total, video_id);
            match self.acquire(video_id) {
                Ok(Outcome::Downloaded(_)) => summary.downloaded += 1,
                Ok(Outcome::Skipped(_)) => summary.skipped += 1,
                Err(err) => {
                    eprintln!("  Error downloading video {video_id}: {err:#}");
                    summary.failed.push(video_id.clone());
                }
            }
        }
        summary
    }

    pub fn acquire(&self, video_id: &VideoId) -> Result<Outcome> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating {}", self.output_dir.display()))?;

        let video_url = video_id.watch_url();
        let title = self.fetch_title(&video_url)?;
        let output_file = self.output_path(&title);

        if output_file.exists() {
            println!("Skipping: {title} ({video_id}) - Already downloaded");
            return Ok(Outcome::Skipped(output_file));
        }

        println!(
            "Downloading: {title} ({video_id}) at resolution: {}",
            self.resolution
        );
        match self.mode {
            MergeMode::Combined => self.download_combined(&video_url, &output_file)?,
            MergeMode::Separate => self.download_separate(&video_url, &output_file)?,
        }
        println!("Download complete: {}", output_file.display());
        Ok(Outcome::Downloaded(output_file))
    }

    fn yt_dlp(&self) -> Command {
        let mut command = Command::new(&self.toolchain.yt_dlp);
        command.arg("--no-playlist");
        command
    }

    fn fetch_title(&self, video_url: &str) -> Result<String> {
        let output = self
            .yt_dlp()
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg(video_url)
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("fetching metadata for {video_url}"))?;

        if !output.status.success() {
            bail!(
                "metadata command failed for {} (status {})",
                video_url,
                output.status
            );
        }

        let info: VideoInfo =
            serde_json::from_slice(&output.stdout).context("deserializing metadata JSON")?;
        Ok(info
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()))
    }

    fn download_combined(&self, video_url: &str, output_file: &Path) -> Result<()> {
        let mut command = self.yt_dlp();
        command
            .arg("-f")
            .arg(self.resolution.combined_selector())
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("-o")
            .arg(output_file)
            .arg(video_url);
        run(command, "yt-dlp download")
    }

    fn download_separate(&self, video_url: &str, output_file: &Path) -> Result<()> {
        // Dropping the temp dir removes the intermediate streams on every path.
        let scratch = tempfile::Builder::new()
            .prefix(".partial-")
            .tempdir_in(&self.output_dir)
            .with_context(|| format!("creating scratch dir in {}", self.output_dir.display()))?;
        let video_file = scratch.path().join("temp_video.mp4");
        let audio_file = scratch.path().join("temp_audio.mp4");

        let mut video = self.yt_dlp();
        video
            .arg("-f")
            .arg(self.resolution.video_selector())
            .arg("-o")
            .arg(&video_file)
            .arg(video_url);
        run(video, "yt-dlp video stream")?;

        let mut audio = self.yt_dlp();
        audio
            .arg("-f")
            .arg("bestaudio")
            .arg("-o")
            .arg(&audio_file)
            .arg(video_url);
        run(audio, "yt-dlp audio stream")?;

        println!("Combining video and audio streams...");
        let mut merge = Command::new(&self.toolchain.ffmpeg);
        merge
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(&video_file)
            .arg("-i")
            .arg(&audio_file)
            .arg("-c")
            .arg("copy")
            .arg("-y")
            .arg(output_file);
        run(merge, "ffmpeg merge")
    }
}

fn run(mut command: Command, label: &str) -> Result<()> {
    tracing::debug!(?command, "running {label}");
    let status = command
        .status()
        .with_context(|| format!("starting {label}"))?;
    if !status.success() {
        bail!("{label} failed (status {status})");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn clean_filename_replaces_each_forbidden_character() {
        for c in FORBIDDEN_FILENAME_CHARS {
            let name = format!("a{c}b");
            assert_eq!(clean_filename(&name), "a_b", "{c:?}");
        }
        assert_eq!(
            clean_filename(r#"What's "this"? A/B: <1|2> \ 3.0*"#),
            "What_s _this__ A_B_ _1_2_ _ 3_0_"
        );
    }

    #[test]
    fn clean_filename_trims_whitespace() {
        assert_eq!(clean_filename("  padded title \t"), "padded title");
    }

    #[test]
    fn long_titles_are_truncated_with_marker() {
        let title = "x".repeat(200);
        let cleaned = clean_filename(&title);
        assert_eq!(cleaned.chars().count(), 173);
        assert!(cleaned.starts_with(&"x".repeat(170)));
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn truncation_threshold_is_176_characters() {
        assert_eq!(clean_filename(&"y".repeat(175)), "y".repeat(175));
        assert_eq!(
            clean_filename(&"y".repeat(176)),
            format!("{}...", "y".repeat(170))
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let title = "é".repeat(180);
        let cleaned = clean_filename(&title);
        assert_eq!(cleaned.chars().count(), 173);
    }

    #[test]
    fn resolution_parsing_and_selectors() {
        assert_eq!("1080p".parse::<Resolution>().unwrap(), Resolution::P1080);
        assert_eq!("4k".parse::<Resolution>().unwrap(), Resolution::P2160);
        assert_eq!("BEST".parse::<Resolution>().unwrap(), Resolution::Best);
        assert!("1081p".parse::<Resolution>().is_err());

        assert_eq!(Resolution::P720.video_selector(), "bestvideo[height<=720]");
        assert_eq!(
            Resolution::P4320.combined_selector(),
            "bestvideo[height<=4320]+bestaudio/best"
        );
        assert_eq!(Resolution::Best.combined_selector(), "bestvideo+bestaudio/best");
        assert_eq!(Resolution::default(), Resolution::P1080);
    }

    #[test]
    fn output_folder_uses_handle_for_at_inputs() {
        let root = Path::new(".download");
        assert_eq!(output_folder(root, "@veritasium"), root.join("veritasium"));
        assert_eq!(output_folder(root, "@"), root.join("saved_videos"));
        assert_eq!(
            output_folder(root, "https://www.youtube.com/@veritasium"),
            root.join("saved_videos")
        );
        assert_eq!(output_folder(root, "@../escape"), root.join("___escape"));
    }

    #[test]
    fn output_path_combines_title_and_resolution() {
        let acquirer = Acquirer::new(
            Toolchain {
                yt_dlp: PathBuf::from("yt-dlp"),
                ffmpeg: PathBuf::from("ffmpeg"),
            },
            PathBuf::from("/out"),
            Resolution::P720,
            MergeMode::Combined,
        );
        assert_eq!(
            acquirer.output_path("Part 1: Intro"),
            PathBuf::from("/out/Part 1_ Intro_720p.mp4")
        );
    }

    #[cfg(unix)]
    mod with_stub_tools {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        const VIDEO: &str = "dQw4w9WgXcQ";

        fn install_script(dir: &Path, name: &str, script: &str) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, script).unwrap();
            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).unwrap();
            path
        }

        /// Fake yt-dlp: prints a metadata payload for `--dump-single-json`
        /// and writes a placeholder file to whatever `-o` names. Every call
        /// is appended to `yt-dlp.log`. Set `fail_download` to make the
        /// download step exit non-zero.
        fn install_tools(dir: &Path, fail_download: bool) -> Toolchain {
            let log = dir.join("yt-dlp.log");
            let exit = if fail_download { "exit 1" } else { "" };
            let yt_dlp = install_script(
                dir,
                "yt-dlp",
                &format!(
                    r#"#!/bin/sh
printf '%s\n' "$*" >> "{log}"
out=""
dump=0
while [ $# -gt 0 ]; do
  case "$1" in
    -o) shift; out="$1" ;;
    --dump-single-json) dump=1 ;;
    --version) echo 2024.10.07; exit 0 ;;
  esac
  shift
done
if [ "$dump" = 1 ]; then
  printf '%s\n' '{{"id":"{VIDEO}","title":"Never: Gonna/Give?"}}'
  exit 0
fi
{exit}
mkdir -p "$(dirname "$out")"
echo media > "$out"
"#,
                    log = log.display()
                ),
            );
            let ffmpeg = install_script(
                dir,
                "ffmpeg",
                r#"#!/bin/sh
for last; do :; done
cat "$4" "$6" > "$last"
"#,
            );
            Toolchain { yt_dlp, ffmpeg }
        }

        fn calls(dir: &Path) -> Vec<String> {
            fs::read_to_string(dir.join("yt-dlp.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn video() -> VideoId {
            VideoId::parse(VIDEO).unwrap()
        }

        #[test]
        fn combined_download_writes_named_file() {
            let tools = tempdir().unwrap();
            let out = tempdir().unwrap();
            let acquirer = Acquirer::new(
                install_tools(tools.path(), false),
                out.path().join("saved_videos"),
                Resolution::P1080,
                MergeMode::Combined,
            );

            let outcome = acquirer.acquire(&video()).unwrap();
            let expected = out.path().join("saved_videos/Never_ Gonna_Give__1080p.mp4");
            assert_eq!(outcome, Outcome::Downloaded(expected.clone()));
            assert!(expected.exists());

            let calls = calls(tools.path());
            assert_eq!(calls.len(), 2);
            assert!(calls[0].contains("--dump-single-json"));
            assert!(calls[1].contains("bestvideo[height<=1080]+bestaudio/best"));
            assert!(calls[1].contains("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        }

        #[test]
        fn existing_output_is_skipped() {
            let tools = tempdir().unwrap();
            let out = tempdir().unwrap();
            let acquirer = Acquirer::new(
                install_tools(tools.path(), false),
                out.path().to_path_buf(),
                Resolution::P720,
                MergeMode::Combined,
            );
            let existing = out.path().join("Never_ Gonna_Give__720p.mp4");
            fs::write(&existing, "old").unwrap();

            let outcome = acquirer.acquire(&video()).unwrap();
            assert_eq!(outcome, Outcome::Skipped(existing.clone()));
            assert_eq!(fs::read_to_string(existing).unwrap(), "old");
            assert_eq!(calls(tools.path()).len(), 1);
        }

        #[test]
        fn separate_mode_merges_and_cleans_up() {
            let tools = tempdir().unwrap();
            let out = tempdir().unwrap();
            let acquirer = Acquirer::new(
                install_tools(tools.path(), false),
                out.path().to_path_buf(),
                Resolution::P480,
                MergeMode::Separate,
            );

            let outcome = acquirer.acquire(&video()).unwrap();
            let expected = out.path().join("Never_ Gonna_Give__480p.mp4");
            assert_eq!(outcome, Outcome::Downloaded(expected.clone()));
            assert_eq!(fs::read_to_string(&expected).unwrap(), "media\nmedia\n");

            let leftovers: Vec<_> = fs::read_dir(out.path())
                .unwrap()
                .map(|entry| entry.unwrap().file_name())
                .collect();
            assert_eq!(leftovers.len(), 1, "{leftovers:?}");

            let calls = calls(tools.path());
            assert_eq!(calls.len(), 3);
            assert!(calls[1].contains("bestvideo[height<=480]"));
            assert!(calls[2].contains("bestaudio"));
        }

        #[test]
        fn batch_continues_after_failures() {
            let tools = tempdir().unwrap();
            let out = tempdir().unwrap();
            let acquirer = Acquirer::new(
                install_tools(tools.path(), true),
                out.path().to_path_buf(),
                Resolution::Best,
                MergeMode::Combined,
            );
            let ids = vec![video(), VideoId::parse("aaaaaaaaaaa").unwrap()];

            let summary = acquirer.acquire_all(&ids);
            assert_eq!(summary.downloaded, 0);
            assert_eq!(summary.failed, ids);
            assert_eq!(summary.total(), 2);
            assert_eq!(calls(tools.path()).len(), 4);
        }

        #[test]
        fn toolchain_check_reports_missing_programs() {
            let tools = tempdir().unwrap();
            let mut toolchain = install_tools(tools.path(), false);
            toolchain.ensure_available(MergeMode::Combined).unwrap();

            toolchain.ffmpeg = tools.path().join("missing-ffmpeg");
            toolchain.ensure_available(MergeMode::Combined).unwrap();
            let err = toolchain.ensure_available(MergeMode::Separate).unwrap_err();
            assert!(err.to_string().contains("not installed"));
        }
    }
}
