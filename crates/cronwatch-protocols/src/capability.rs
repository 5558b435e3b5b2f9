//! Single-method capabilities injected into the scheduler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, SinkError};
use crate::job::{CronJob, SessionTarget, WakeMode};

/// What the scheduler hands to a [`JobRunner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunRequest {
    pub job_id: String,
    pub job_name: String,
    pub session_target: SessionTarget,
    pub wake_mode: WakeMode,
    pub payload: serde_json::Value,
}

impl From<&CronJob> for JobRunRequest {
    fn from(job: &CronJob) -> Self {
        Self {
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            session_target: job.session_target,
            wake_mode: job.wake_mode,
            payload: job.payload.clone(),
        }
    }
}

/// Executes job payloads. Returns an optional summary on success.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, request: JobRunRequest) -> Result<Option<String>, RunnerError>;
}

/// Context attached to a failure alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertMetadata {
    pub job_id: String,
    pub job_name: String,
    pub consecutive_failures: u32,
    pub last_error: String,
}

/// Receives user-visible system events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, message: &str, metadata: &AlertMetadata) -> Result<(), SinkError>;
}

/// Asks the host application to wake up immediately. Fire-and-forget.
pub trait HeartbeatRequester: Send + Sync {
    fn request_wake_now(&self);
}

/// Event sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn emit(&self, _message: &str, _metadata: &AlertMetadata) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Heartbeat requester that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHeartbeat;

impl HeartbeatRequester for NoopHeartbeat {
    fn request_wake_now(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CronJobCreate, Schedule};
    use serde_json::json;

    #[test]
    fn test_run_request_from_job() {
        let draft = CronJobCreate::new("heartbeat-check", Schedule::Every { every_ms: 1 })
            .with_session_target(SessionTarget::Isolated)
            .with_payload(json!({"command": "true"}));
        let job = CronJob::from_create("id-7", draft, 0);

        let request = JobRunRequest::from(&job);
        assert_eq!(request.job_id, "id-7");
        assert_eq!(request.job_name, "heartbeat-check");
        assert_eq!(request.session_target, SessionTarget::Isolated);
        assert_eq!(request.wake_mode, WakeMode::Now);
        assert_eq!(request.payload, json!({"command": "true"}));
    }

    #[tokio::test]
    async fn test_noop_capabilities() {
        let metadata = AlertMetadata {
            job_id: "a".into(),
            job_name: "b".into(),
            consecutive_failures: 3,
            last_error: "c".into(),
        };
        assert!(NoopEventSink.emit("msg", &metadata).await.is_ok());
        NoopHeartbeat.request_wake_now();
    }
}
