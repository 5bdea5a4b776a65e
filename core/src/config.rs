// Shuffleboard configuration
//
// Defaults, overridden by SHUFFLEBOARD_* environment variables, optionally overlaid by a
// TOML file.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dashboard::BASE_TABLE_NAME;
use crate::recording::DEFAULT_FILE_NAME_FORMAT;
use crate::{Result, ShuffleboardError};

#[derive(Clone, Debug, PartialEq)]
pub struct ShuffleboardConfig {
    /// Root of every dashboard key
    pub base_table: String,
    /// Template used when no custom recording file name format is set
    pub default_file_name_format: String,
    /// Directory the recorder writes `.sbr` files into
    pub recording_dir: PathBuf,
    /// Change notifications buffered for slow subscribers
    pub channel_capacity: usize,
}

impl Default for ShuffleboardConfig {
    fn default() -> Self {
        Self {
            base_table: BASE_TABLE_NAME.to_string(),
            default_file_name_format: DEFAULT_FILE_NAME_FORMAT.to_string(),
            recording_dir: PathBuf::from("recordings"),
            channel_capacity: 1024,
        }
    }
}

/// On-disk shape: every field optional, overlaid onto the env-aware defaults
#[derive(Debug, Default, Deserialize)]
struct ShuffleboardToml {
    base_table: Option<String>,
    default_file_name_format: Option<String>,
    recording_dir: Option<PathBuf>,
    channel_capacity: Option<usize>,
}

impl ShuffleboardToml {
    fn overlay(self, mut base: ShuffleboardConfig) -> ShuffleboardConfig {
        if let Some(v) = self.base_table.filter(|s| !s.is_empty()) {
            base.base_table = v;
        }
        if let Some(v) = self.default_file_name_format.filter(|s| !s.is_empty()) {
            base.default_file_name_format = v;
        }
        if let Some(v) = self.recording_dir {
            base.recording_dir = v;
        }
        if let Some(v) = self.channel_capacity.filter(|c| *c > 0) {
            base.channel_capacity = v;
        }
        base
    }
}

impl ShuffleboardConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_table: std::env::var("SHUFFLEBOARD_BASE_TABLE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(default.base_table),
            default_file_name_format: std::env::var("SHUFFLEBOARD_FILE_NAME_FORMAT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(default.default_file_name_format),
            recording_dir: std::env::var("SHUFFLEBOARD_RECORDING_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.recording_dir),
            channel_capacity: std::env::var("SHUFFLEBOARD_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|c: &usize| *c > 0)
                .unwrap_or(default.channel_capacity),
        }
    }

    /// Parse a TOML document and overlay it onto the env-aware defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let parsed: ShuffleboardToml =
            toml::from_str(s).map_err(|e| ShuffleboardError::Config(e.to_string()))?;
        Ok(parsed.overlay(Self::from_env()))
    }

    /// Load from a TOML file; a missing or unreadable file falls back to env/defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(target: "shuffleboard", path = %path.display(), "No TOML config found; using defaults/env");
            return Self::from_env();
        }
        match fs::read_to_string(path) {
            Ok(s) => match Self::from_toml_str(&s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "shuffleboard", error = %e, "Failed to parse TOML; using defaults");
                    Self::from_env()
                }
            },
            Err(e) => {
                tracing::warn!(target: "shuffleboard", error = %e, "Failed to read TOML; using defaults");
                Self::from_env()
            }
        }
    }
}
