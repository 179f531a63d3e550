//! CLI configuration file.
//!
//! Read from `~/.config/snapctl/config.json` unless `--config-file` names
//! another file. Every field is optional; flags on the command line win.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use snapctl_snapshot::{DEFAULT_CLEANUP, DEFAULT_CONFIG};
use snapctl_util::log::LogLevel;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Snapper config used when `--config` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,

    /// Cleanup algorithm for snapshots created by this tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_algorithm: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl CliConfig {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        snapctl_util::path::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Load the config file.
    ///
    /// An explicitly named file must exist; a missing default file yields the
    /// default config.
    pub async fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load_file(path).await,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_file(&path).await,
                _ => Ok(Self::default()),
            },
        }
    }

    pub async fn load_file(path: &Path) -> anyhow::Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn config_name(&self) -> &str {
        self.config.as_deref().unwrap_or(DEFAULT_CONFIG)
    }

    pub fn cleanup(&self) -> &str {
        self.cleanup_algorithm.as_deref().unwrap_or(DEFAULT_CLEANUP)
    }

    /// Log level from the file, if set and valid.
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level.as_deref().and_then(LogLevel::parse)
    }
}
