//! Run configuration (TOML).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Run configuration.
///
/// Intended to be edited by humans and must remain stable and automatable.
/// Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    pub evidence: EvidenceConfig,
    pub polling: PollingConfig,
}

/// Feature flags gating evidence collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Collect screenshots on failure.
    pub screenshotter_active: bool,
    /// Collect videos at session end. Legacy path, kept for compatibility.
    pub screencaster_active: bool,
}

/// Default timings for polling sequences.
///
/// Values below the engine's hard floors are clamped upward at execution
/// time, never here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollingConfig {
    /// Default poll interval in milliseconds.
    pub sleep_time_ms: u64,
    /// Default maximum polling duration in milliseconds.
    pub duration_ms: u64,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            screenshotter_active: true,
            screencaster_active: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            sleep_time_ms: 500,
            duration_ms: 12_000,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            evidence: EvidenceConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.polling.sleep_time_ms == 0 {
            return Err(anyhow!("polling.sleep_time_ms must be > 0"));
        }
        if self.polling.duration_ms == 0 {
            return Err(anyhow!("polling.duration_ms must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    if !path.exists() {
        let cfg = RunConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RunConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');

    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
