// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pipeline configuration
//!
//! Read-only settings consumed by the compile pipeline. The host (preferences
//! UI, CLI flags, a toml file) owns persistence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file looked up by [`PipelineConfig::load`]
pub const CONFIG_FILE: &str = "polyframe-studio.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Element ceiling for preview products; normalization runs with twice this
    pub opencsg_limit: usize,
    /// Budget of the approximate mesh cache
    pub mesh_cache_size_mb: usize,
    /// Budget of the exact solid cache
    pub solid_cache_size_mb: usize,
    /// Abort a pass on any warning
    pub hardwarnings: bool,
    /// Check arguments passed to user modules
    pub parameter_check: bool,
    /// Check numeric parameter ranges
    pub range_check: bool,
    /// Request a completion sound after long renders
    pub sound_notification: bool,
    pub sound_threshold_secs: u64,
    /// Minimum delay between two progress reports
    pub progress_interval_ms: u64,
    /// Upper bound on dependency settle passes after a reload
    pub max_dependency_passes: usize,
    /// Extra directories searched by `include` and `use`
    pub library_paths: Vec<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            opencsg_limit: 100_000,
            mesh_cache_size_mb: 100,
            solid_cache_size_mb: 100,
            hardwarnings: false,
            parameter_check: true,
            range_check: false,
            sound_notification: true,
            sound_threshold_secs: 0,
            progress_interval_ms: 200,
            max_dependency_passes: 16,
            library_paths: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };

        if let Ok(limit) = std::env::var("POLYFRAME_OPENCSG_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.opencsg_limit = limit;
            }
        }

        if let Ok(hard) = std::env::var("POLYFRAME_HARDWARNINGS") {
            config.hardwarnings = hard.parse().unwrap_or(false);
        }

        if let Ok(paths) = std::env::var("POLYFRAME_LIBRARY_PATH") {
            config
                .library_paths
                .extend(std::env::split_paths(&paths));
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Limit handed to the normalizer; a difference can double the leaf count
    pub fn normalize_limit(&self) -> usize {
        self.opencsg_limit.saturating_mul(2)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_limit_is_doubled() {
        let config = PipelineConfig {
            opencsg_limit: 50,
            ..Default::default()
        };
        assert_eq!(config.normalize_limit(), 100);
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("studio.toml");
        let config = PipelineConfig {
            hardwarnings: true,
            mesh_cache_size_mb: 7,
            ..Default::default()
        };
        config.save(&path)?;
        assert_eq!(PipelineConfig::from_file(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("studio.toml");
        std::fs::write(&path, "opencsg_limit = 3\n")?;
        let config = PipelineConfig::from_file(&path)?;
        assert_eq!(config.opencsg_limit, 3);
        assert_eq!(config.progress_interval_ms, 200);
        Ok(())
    }
}
