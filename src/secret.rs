#![forbid(unsafe_code)]

//! Loads the Data API key. Any failure here is fatal for the run.

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::api::ApiKey;
use crate::config::Settings;

/// Uses the literal key from the settings when present, otherwise asks the
/// secret manager for `api_key_ref`.
pub fn load_api_key(settings: &Settings) -> Result<ApiKey> {
    if let Some(key) = &settings.api_key {
        tracing::debug!("using API key from configuration");
        return Ok(ApiKey::new(key.clone()));
    }
    read_secret(&settings.secret_tool, &settings.api_key_ref)
}

/// Runs `<tool> read <reference>` and returns the trimmed stdout.
pub fn read_secret(tool: &Path, reference: &str) -> Result<ApiKey> {
    let output = Command::new(tool)
        .arg("read")
        .arg(reference)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("running {} to read {reference}", tool.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{} could not read {reference} (status {}): {}",
            tool.display(),
            output.status,
            stderr.trim()
        );
    }

    let secret = String::from_utf8(output.stdout)
        .with_context(|| format!("secret {reference} is not valid UTF-8"))?;
    let secret = secret.trim();
    if secret.is_empty() {
        bail!("secret {reference} is empty");
    }
    Ok(ApiKey::new(secret))
}
