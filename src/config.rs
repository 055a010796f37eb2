//! Configuration management for logstd
//!
//! Settings come from three layers: built-in defaults, an optional TOML
//! config file, and command-line flags, later layers winning.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;
use crate::input::{DEFAULT_CHANNEL_BUFFER, DEFAULT_MAX_RECORD_BYTES};
use crate::rotation::{Compression, RotationPolicy};

/// Bytes per megabyte for `max_size_mb`
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Application configuration, as read from the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Active log file path
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Number of rotated files to keep (default: 5)
    #[serde(default = "default_backup_count")]
    pub backup_count: usize,

    /// Rotation threshold in megabytes (default: 10)
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: f64,

    /// Longest wait for input before an idle poll returns (default: 10ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Gzip rotated files
    #[serde(default)]
    pub compress: bool,

    /// Unix permission bits for created log files, e.g. `0o640`
    #[serde(default)]
    pub file_mode: Option<u32>,

    /// Secondary input stream (file or named pipe)
    #[serde(default)]
    pub secondary: Option<PathBuf>,

    /// Lines buffered between the input readers and the writer
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Longest record read in one piece; longer lines are split
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
}

fn default_path() -> PathBuf {
    PathBuf::from("log.out")
}

fn default_backup_count() -> usize {
    5
}

fn default_max_size_mb() -> f64 {
    10.0
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_channel_buffer() -> usize {
    DEFAULT_CHANNEL_BUFFER
}

fn default_max_record_bytes() -> usize {
    DEFAULT_MAX_RECORD_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: default_path(),
            backup_count: default_backup_count(),
            max_size_mb: default_max_size_mb(),
            poll_interval_ms: default_poll_interval_ms(),
            compress: false,
            file_mode: None,
            secondary: None,
            channel_buffer: default_channel_buffer(),
            max_record_bytes: default_max_record_bytes(),
        }
    }
}

impl Config {
    /// Load the default config file, or return defaults if there is none
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Apply the flags given on the command line
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(file) = &cli.file {
            self.path = file.clone();
        }
        if let Some(backup_count) = cli.backup_count {
            self.backup_count = backup_count;
        }
        if let Some(max_size_mb) = cli.max_size_mb {
            self.max_size_mb = max_size_mb;
        }
        if let Some(poll_interval_ms) = cli.poll_interval_ms {
            self.poll_interval_ms = poll_interval_ms;
        }
        if cli.compress {
            self.compress = true;
        }
        if let Some(secondary) = &cli.secondary {
            self.secondary = Some(secondary.clone());
        }
        self
    }

    /// Validate into the immutable settings of one run
    pub fn settings(&self) -> Result<Settings> {
        let max_bytes = max_size_to_bytes(self.max_size_mb)?;
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll interval must be at least 1ms");
        }
        if self.channel_buffer == 0 {
            anyhow::bail!("channel buffer must hold at least one line");
        }
        if self.max_record_bytes == 0 {
            anyhow::bail!("max record size must be at least one byte");
        }

        Ok(Settings {
            path: expand_path(&self.path),
            max_size_mb: self.max_size_mb,
            max_bytes,
            backup_count: self.backup_count,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            compression: self.compress.then_some(Compression::Gzip),
            file_mode: self.file_mode,
            secondary: self.secondary.as_deref().map(expand_path),
            channel_buffer: self.channel_buffer,
            max_record_bytes: self.max_record_bytes,
        })
    }
}

/// Validated, immutable settings for one logging session
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub path: PathBuf,
    /// Threshold as configured, kept for the start banner
    pub max_size_mb: f64,
    pub max_bytes: u64,
    pub backup_count: usize,
    pub poll_interval: Duration,
    pub compression: Option<Compression>,
    pub file_mode: Option<u32>,
    pub secondary: Option<PathBuf>,
    pub channel_buffer: usize,
    pub max_record_bytes: usize,
}

impl Settings {
    /// Settings with defaults for everything but the limits
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64, backup_count: usize) -> Self {
        Self {
            path: path.into(),
            max_size_mb: max_bytes as f64 / BYTES_PER_MB,
            max_bytes,
            backup_count,
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
            compression: None,
            file_mode: None,
            secondary: None,
            channel_buffer: default_channel_buffer(),
            max_record_bytes: default_max_record_bytes(),
        }
    }

    /// Rotation policy for the active log file
    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            max_bytes: self.max_bytes,
            backup_count: self.backup_count,
            compression: self.compression,
            file_mode: self.file_mode,
        }
    }
}

/// Convert a size in megabytes into a positive byte count
pub fn max_size_to_bytes(max_size_mb: f64) -> Result<u64> {
    if !max_size_mb.is_finite() || max_size_mb <= 0.0 {
        anyhow::bail!("max size must be a positive number of MB, got {}", max_size_mb);
    }
    let bytes = (max_size_mb * BYTES_PER_MB) as u64;
    if bytes == 0 {
        anyhow::bail!("max size of {} MB is smaller than one byte", max_size_mb);
    }
    Ok(bytes)
}

/// Expand a leading `~` in a path
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&*raw).into_owned())
}

/// Get the base configuration directory (~/.logstd)
/// Falls back to ./.logstd if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".logstd")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".logstd"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
