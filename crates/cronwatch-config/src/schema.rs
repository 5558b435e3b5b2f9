//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::loader::ConfigLoader;

fn default_true() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Base directory for cronwatch state (`~/.cronwatch`).
pub fn cronwatch_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".cronwatch"))
        .unwrap_or_else(|| PathBuf::from(".cronwatch"))
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the timer loop starts with `cronwatch run`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Job store file. Defaults to `~/.cronwatch/cron/jobs.json`.
    #[serde(default)]
    pub store_path: Option<String>,

    /// How often the timer loop scans for due jobs.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Minimum time between two alerts for the same job once it has failed
    /// three times in a row. The threshold itself is fixed.
    #[serde(default = "default_failure_alert_throttle_ms")]
    pub failure_alert_throttle_ms: i64,

    /// How long `stop` waits for in-flight runs.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_failure_alert_throttle_ms() -> i64 {
    3_600_000
}

fn default_stop_grace_ms() -> u64 {
    30_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            store_path: None,
            tick_interval_ms: default_tick_interval_ms(),
            failure_alert_throttle_ms: default_failure_alert_throttle_ms(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Resolve the store path, expanding `~`.
    pub fn resolved_store_path(&self) -> PathBuf {
        match &self.store_path {
            Some(path) => PathBuf::from(ConfigLoader::expand_path(path)),
            None => cronwatch_dir().join("cron").join("jobs.json"),
        }
    }
}

/// Shell runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Per-command timeout enforced by the shell runner.
    #[serde(default = "default_runner_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_runner_timeout_ms() -> u64 {
    300_000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout_ms: default_runner_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines on the console.
    #[serde(default)]
    pub json: bool,

    /// Directory for daily-rolling log files. Disabled when unset.
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.dir
            .as_deref()
            .map(|d| PathBuf::from(ConfigLoader::expand_path(d)))
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
