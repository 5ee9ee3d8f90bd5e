use crate::supervisor::TailConfig;
use crate::tail::{StartPosition, DEFAULT_POLL_INTERVAL};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Install location used by the official launcher.
#[cfg(windows)]
const DEFAULT_LOGS_ROOT: Option<&str> = Some(r"C:\Battlestate Games\EFT\Logs");
#[cfg(not(windows))]
const DEFAULT_LOGS_ROOT: Option<&str> = None;

const MIN_POLL_INTERVAL_SECS: u64 = 1;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Directory containing the `log_*` session folders.
    pub logs_root: Option<PathBuf>,
    /// Fallback poll interval in seconds. Default: 5, minimum: 1.
    pub poll_interval_secs: Option<u64>,
    /// Replay the current session's existing lines at startup so the state
    /// reflects a game already in progress. Default: true.
    pub replay_on_start: Option<bool>,
}

impl Config {
    /// Load configuration from ~/.config/raidtail/config.toml
    ///
    /// - File missing: returns default config (Ok)
    /// - File exists but invalid TOML: returns Err so caller can show warning
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Same as [`load`](Self::load) for an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Configured logs root, else the platform default if there is one.
    pub fn logs_root(&self) -> Option<PathBuf> {
        self.logs_root
            .clone()
            .or_else(|| DEFAULT_LOGS_ROOT.map(PathBuf::from))
    }

    pub fn poll_interval(&self) -> Duration {
        match self.poll_interval_secs {
            Some(secs) => Duration::from_secs(secs.max(MIN_POLL_INTERVAL_SECS)),
            None => DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn start_position(&self) -> StartPosition {
        if self.replay_on_start.unwrap_or(true) {
            StartPosition::Beginning
        } else {
            StartPosition::End
        }
    }

    /// Settings for the monitoring core, or `None` without a logs root.
    pub fn tail_config(&self) -> Option<TailConfig> {
        let logs_root = self.logs_root()?;
        Some(TailConfig {
            logs_root,
            poll_interval: self.poll_interval(),
            start_position: self.start_position(),
        })
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|d| d.join(".config").join("raidtail").join("config.toml"))
    }
}
