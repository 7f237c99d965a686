#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::api::DEFAULT_API_BASE;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_MEDIA_ROOT: &str = ".download";
pub const DEFAULT_API_KEY_REF: &str = "op://dev/youtube/api_key";
pub const DEFAULT_SECRET_TOOL: &str = "op";
pub const DEFAULT_YT_DLP: &str = "yt-dlp";
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

#[derive(Debug, Clone)]
pub struct Settings {
    pub media_root: PathBuf,
    pub api_base: String,
    /// Literal key; when present the secret tool is never invoked.
    pub api_key: Option<String>,
    pub api_key_ref: String,
    pub secret_tool: PathBuf,
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
}

pub fn load_settings() -> Result<Settings> {
    resolve_settings(SettingsOverrides::default())
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub media_root: Option<PathBuf>,
    pub api_key_ref: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_settings_with_overrides(
        &file_vars,
        env_var_string,
        overrides,
    ))
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Settings {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let media_root = overrides
        .media_root
        .or_else(|| lookup("MEDIA_ROOT").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT));
    let api_key_ref = overrides
        .api_key_ref
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| lookup("YOUTUBE_API_KEY_REF"))
        .unwrap_or_else(|| DEFAULT_API_KEY_REF.to_string());

    Settings {
        media_root,
        api_base: lookup("YOUTUBE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        api_key: lookup("YOUTUBE_API_KEY"),
        api_key_ref,
        secret_tool: PathBuf::from(
            lookup("SECRET_TOOL").unwrap_or_else(|| DEFAULT_SECRET_TOOL.to_string()),
        ),
        yt_dlp: PathBuf::from(lookup("YT_DLP_BIN").unwrap_or_else(|| DEFAULT_YT_DLP.to_string())),
        ffmpeg: PathBuf::from(lookup("FFMPEG_BIN").unwrap_or_else(|| DEFAULT_FFMPEG.to_string())),
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Environment first, then the `.env` file. Blank file values count as unset.
fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| {
        file_vars
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
