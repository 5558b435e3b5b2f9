//! Concrete collaborators for the cron service.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use cronwatch_config::Config;
use cronwatch_protocols::{
    AlertMetadata, EventSink, HeartbeatRequester, JobRunRequest, JobRunner, RunnerError,
    SinkError,
};
use cronwatch_scheduler::{CronServiceConfig, EscalationPolicy};

/// Longest success summary kept from stdout.
const SUMMARY_LIMIT: usize = 500;

/// Payload accepted by [`ShellJobRunner`].
#[derive(Debug, Deserialize)]
struct ShellPayload {
    command: String,
    #[serde(default)]
    cwd: Option<String>,
}

/// Runs `{"command": "..."}` payloads through a shell.
pub(crate) struct ShellJobRunner {
    shell: String,
    timeout: Duration,
}

impl ShellJobRunner {
    pub(crate) fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    pub(crate) fn from_config(config: &Config) -> Self {
        Self::new(
            config.runner.shell.clone(),
            Duration::from_millis(config.runner.timeout_ms),
        )
    }
}

#[async_trait]
impl JobRunner for ShellJobRunner {
    async fn run(&self, request: JobRunRequest) -> Result<Option<String>, RunnerError> {
        let payload: ShellPayload = serde_json::from_value(request.payload)
            .map_err(|e| RunnerError::InvalidPayload(e.to_string()))?;

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&payload.command)
            .env("CRONWATCH_JOB_ID", &request.job_id)
            .env("CRONWATCH_JOB_NAME", &request.job_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &payload.cwd {
            cmd.current_dir(PathBuf::from(cwd));
        }

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                RunnerError::Failed(format!(
                    "Command timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| RunnerError::Failed(format!("Failed to spawn {}: {}", self.shell, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            Ok(summarize(&stdout))
        } else {
            let code = output.status.code().unwrap_or(-1);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                Err(RunnerError::Failed(format!(
                    "Command failed with exit code {}",
                    code
                )))
            } else {
                Err(RunnerError::Failed(stderr.to_string()))
            }
        }
    }
}

/// Keep the tail of stdout, trimmed, on a char boundary.
fn summarize(stdout: &str) -> Option<String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }
    let skip = trimmed.chars().count().saturating_sub(SUMMARY_LIMIT);
    Some(trimmed.chars().skip(skip).collect())
}

/// Delivers alerts to the log.
#[derive(Debug, Default)]
pub(crate) struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn emit(&self, message: &str, metadata: &AlertMetadata) -> Result<(), SinkError> {
        warn!(
            target: "cronwatch::alert",
            job_id = %metadata.job_id,
            job_name = %metadata.job_name,
            consecutive_failures = metadata.consecutive_failures,
            last_error = %metadata.last_error,
            "{}",
            message
        );
        Ok(())
    }
}

/// Records wake requests in the log.
#[derive(Debug, Default)]
pub(crate) struct LogHeartbeat;

impl HeartbeatRequester for LogHeartbeat {
    fn request_wake_now(&self) {
        info!(target: "cronwatch::heartbeat", "wake requested");
    }
}

/// Map file configuration onto service tunables.
pub(crate) fn service_config(config: &Config) -> CronServiceConfig {
    CronServiceConfig {
        tick_interval: Duration::from_millis(config.scheduler.tick_interval_ms),
        escalation: EscalationPolicy::new(config.scheduler.failure_alert_throttle_ms),
        stop_grace: Duration::from_millis(config.scheduler.stop_grace_ms),
    }
}

#[cfg(test)]
#[path = "adapters_tests.rs"]
mod tests;
