//! Adapter around the external [`JobRunner`].
//!
//! Normalizes every way a run can end into a [`RunOutcome`]. Runner errors and
//! runner panics both become `RunOutcome::Error`; nothing propagates upward.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cronwatch_protocols::{CronJob, JobRunRequest, JobRunner, RunStatus, RunnerError};

/// Normalized result of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    Error {
        error: String,
    },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Ok { .. } => RunStatus::Ok,
            RunOutcome::Error { .. } => RunStatus::Error,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RunOutcome::Ok { .. })
    }
}

/// Invokes the runner for a job and never fails.
#[derive(Clone)]
pub struct JobRunnerAdapter {
    runner: Arc<dyn JobRunner>,
}

impl JobRunnerAdapter {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self { runner }
    }

    pub async fn execute(&self, job: &CronJob) -> RunOutcome {
        let request = JobRunRequest::from(job);
        let result = AssertUnwindSafe(self.runner.run(request))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(summary)) => RunOutcome::Ok { summary },
            Ok(Err(e)) => {
                debug!(job_id = %job.id, error = %e, "runner reported failure");
                RunOutcome::Error {
                    error: e.to_string(),
                }
            }
            Err(panic) => RunOutcome::Error {
                error: RunnerError::Panicked(panic_message(panic.as_ref())).to_string(),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
