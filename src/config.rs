//! Configuration management for deck-telemetry
//!
//! Loads the YAML configuration file naming the producer command and the
//! optional console watcher.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::supervisor::RestartPolicy;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<WatchConfig>,
}

/// Producer command configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Shell command whose stdout feeds the dataset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Runs shorter than this are treated as a crash loop
    #[serde(default = "default_restart_threshold_secs")]
    pub restart_threshold_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            command: None,
            restart_threshold_secs: default_restart_threshold_secs(),
        }
    }
}

impl TelemetryConfig {
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::new(Duration::from_secs(self.restart_threshold_secs))
    }
}

/// Console watcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    pub keys: Vec<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchConfig {
    /// Tick of the console watcher, never zero
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse YAML config: {}", path))
    }

    /// Load configuration from file, falling back to defaults if it is absent
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// The producer command, with `override_command` taking precedence
    pub fn resolve_command(&self, override_command: Option<&str>) -> Result<String> {
        override_command
            .map(str::to_string)
            .or_else(|| self.telemetry.command.clone())
            .filter(|c| !c.trim().is_empty())
            .context("No telemetry command configured (set telemetry.command or --command)")
    }
}

// Default value functions
fn default_restart_threshold_secs() -> u64 { 120 }
fn default_poll_interval_ms() -> u64 { 1000 }
