//! Job definition and run state.
//!
//! Field names serialize in camelCase. Optional fields are omitted when absent
//! and unknown fields are ignored on read, so older and newer store files load
//! into the same shape.

use serde::{Deserialize, Serialize};

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Schedule {
    /// Fire repeatedly with a fixed period, measured from the last run.
    #[serde(rename_all = "camelCase")]
    Every { every_ms: u64 },

    /// Fire once at an absolute epoch-millisecond instant.
    #[serde(rename_all = "camelCase")]
    At { at_ms: i64 },

    /// Fire on a cron expression (5 or 6 fields, evaluated in UTC).
    Cron { expr: String },
}

impl Schedule {
    /// Short human-readable form used in listings and log lines.
    pub fn describe(&self) -> String {
        match self {
            Schedule::Every { every_ms } => format!("every {}ms", every_ms),
            Schedule::At { at_ms } => format!("at {}", at_ms),
            Schedule::Cron { expr } => format!("cron '{}'", expr),
        }
    }
}

/// Which session a job's payload is delivered into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionTarget {
    #[default]
    Main,
    Isolated,
}

/// How eagerly the host should wake for a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WakeMode {
    #[default]
    Now,
    NextHeartbeat,
}

/// Outcome of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Ok => write!(f, "ok"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

/// Mutable run state embedded in every job record.
///
/// Only the scheduler mutates this, and only inside a run transaction.
/// `consecutive_failures == 0` implies `last_failure_notification_at_ms` is
/// `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<RunStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_duration_ms: Option<i64>,

    #[serde(default)]
    pub consecutive_failures: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_notification_at_ms: Option<i64>,
}

impl CronJobState {
    /// Record a successful run: the failure streak and its alert history reset.
    pub fn record_success(&mut self, started_at_ms: i64, finished_at_ms: i64) {
        self.last_run_at_ms = Some(started_at_ms);
        self.last_duration_ms = Some(finished_at_ms.saturating_sub(started_at_ms));
        self.last_status = Some(RunStatus::Ok);
        self.last_error = None;
        self.consecutive_failures = 0;
        self.last_failure_notification_at_ms = None;
    }

    /// Record a failed run and return the streak length before this failure.
    pub fn record_failure(
        &mut self,
        started_at_ms: i64,
        finished_at_ms: i64,
        error: impl Into<String>,
    ) -> u32 {
        let previous = self.consecutive_failures;
        self.last_run_at_ms = Some(started_at_ms);
        self.last_duration_ms = Some(finished_at_ms.saturating_sub(started_at_ms));
        self.last_status = Some(RunStatus::Error);
        self.last_error = Some(error.into());
        self.consecutive_failures = previous.saturating_add(1);
        previous
    }
}

/// A user-defined recurring task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    /// Unique, immutable identifier.
    pub id: String,
    /// Display name, used verbatim in alert messages.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Disabled jobs are never auto-scheduled but can still be forced.
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub schedule: Schedule,
    #[serde(default)]
    pub session_target: SessionTarget,
    #[serde(default)]
    pub wake_mode: WakeMode,
    /// Opaque payload handed to the job runner unchanged.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Remove the job after its first successful run.
    #[serde(default)]
    pub delete_after_run: bool,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
    #[serde(default)]
    pub state: CronJobState,
}

fn default_true() -> bool {
    true
}

impl CronJob {
    /// Materialize a draft into a job with a fresh state.
    pub fn from_create(id: impl Into<String>, draft: CronJobCreate, now_ms: i64) -> Self {
        Self {
            id: id.into(),
            name: draft.name,
            description: draft.description,
            enabled: draft.enabled,
            schedule: draft.schedule,
            session_target: draft.session_target,
            wake_mode: draft.wake_mode,
            payload: draft.payload,
            delete_after_run: draft.delete_after_run,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            state: CronJobState::default(),
        }
    }

    /// Apply a partial update. The run state is left untouched.
    pub fn apply_patch(&mut self, patch: CronJobPatch, now_ms: i64) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(schedule) = patch.schedule {
            self.schedule = schedule;
        }
        if let Some(target) = patch.session_target {
            self.session_target = target;
        }
        if let Some(mode) = patch.wake_mode {
            self.wake_mode = mode;
        }
        if let Some(payload) = patch.payload {
            self.payload = payload;
        }
        if let Some(delete_after_run) = patch.delete_after_run {
            self.delete_after_run = delete_after_run;
        }
        self.updated_at_ms = now_ms;
    }
}

/// Draft for creating a job. The scheduler assigns the id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub schedule: Schedule,
    #[serde(default)]
    pub session_target: SessionTarget,
    #[serde(default)]
    pub wake_mode: WakeMode,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub delete_after_run: bool,
}

impl CronJobCreate {
    /// Create a draft with default session, wake mode and an empty payload.
    pub fn new(name: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            name: name.into(),
            description: None,
            enabled: true,
            schedule,
            session_target: SessionTarget::default(),
            wake_mode: WakeMode::default(),
            payload: serde_json::Value::Null,
            delete_after_run: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_session_target(mut self, target: SessionTarget) -> Self {
        self.session_target = target;
        self
    }

    pub fn with_wake_mode(mut self, mode: WakeMode) -> Self {
        self.wake_mode = mode;
        self
    }

    pub fn with_delete_after_run(mut self, delete_after_run: bool) -> Self {
        self.delete_after_run = delete_after_run;
        self
    }
}

/// Partial update for an existing job. `None` leaves the field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_target: Option<SessionTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wake_mode: Option<WakeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_after_run: Option<bool>,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
