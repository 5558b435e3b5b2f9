//! Run transaction: execute one job and commit its outcome.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use cronwatch_protocols::{AlertMetadata, CronError, CronJobState};

use crate::escalation::{EscalationDecision, EscalationInput};
use crate::locks::RunGuard;
use crate::runner::RunOutcome;
use crate::schedule::next_due;
use crate::service::{CronService, ServiceInner, refresh_next_run};

/// How a run was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Run only if the job is enabled and due.
    Scheduled,
    /// Run regardless of due time or enabled flag.
    Force,
}

/// Result of [`CronService::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum RunReport {
    /// Scheduled run skipped; the job is disabled or not yet due.
    #[serde(rename_all = "camelCase")]
    NotDue { next_run_at_ms: Option<i64> },

    /// The runner was invoked and the new state persisted.
    Ran {
        outcome: RunOutcome,
        alerted: bool,
        state: CronJobState,
    },
}

impl RunReport {
    pub fn ran(&self) -> bool {
        matches!(self, RunReport::Ran { .. })
    }
}

struct Committed {
    state: CronJobState,
    alert: Option<(String, AlertMetadata)>,
    deleted: bool,
}

impl CronService {
    /// Run a job now.
    ///
    /// Waits for any in-progress run of the same job to finish first. Returns
    /// only after the new state has been persisted.
    pub async fn run(&self, job_id: &str, mode: RunMode) -> Result<RunReport, CronError> {
        self.get(job_id).await?;
        let guard = self.inner.run_locks.acquire(job_id).await;
        self.inner.run_locked(job_id, mode, guard).await
    }
}

impl ServiceInner {
    pub(crate) async fn run_locked(
        &self,
        job_id: &str,
        mode: RunMode,
        _guard: RunGuard,
    ) -> Result<RunReport, CronError> {
        let snapshot = self
            .jobs
            .lock()
            .await
            .iter()
            .find(|j| j.id == job_id)
            .cloned();
        let Some(job) = snapshot else {
            // Removed before the slot was taken.
            self.run_locks.remove(job_id);
            return Err(CronError::not_found(job_id));
        };

        let started_at = self.clock.now_ms();
        if mode == RunMode::Scheduled {
            let next = next_due(&job.schedule, started_at, job.state.last_run_at_ms)
                .map_err(|e| CronError::InvalidSchedule(e.to_string()))?;
            if !job.enabled || !next.is_some_and(|due| due <= started_at) {
                return Ok(RunReport::NotDue {
                    next_run_at_ms: next.filter(|_| job.enabled),
                });
            }
        }

        debug!(job_id = %job.id, name = %job.name, ?mode, "running job");
        let outcome = self.runner.execute(&job).await;
        let finished_at = self.clock.now_ms();
        let policy = self.config.escalation;

        let committed = self
            .commit(|jobs| {
                let idx = jobs
                    .iter()
                    .position(|j| j.id == job_id)
                    .ok_or_else(|| CronError::not_found(job_id))?;
                let job = &mut jobs[idx];

                let mut alert = None;
                match &outcome {
                    RunOutcome::Ok { .. } => job.state.record_success(started_at, finished_at),
                    RunOutcome::Error { error } => {
                        let previous =
                            job.state.record_failure(started_at, finished_at, error.as_str());
                        let decision = policy.evaluate(EscalationInput {
                            job_name: &job.name,
                            previous_failures: previous,
                            consecutive_failures: job.state.consecutive_failures,
                            last_notification_at_ms: job.state.last_failure_notification_at_ms,
                            last_error: error,
                            now_ms: finished_at,
                        });
                        if let EscalationDecision::Alert { message } = decision {
                            job.state.last_failure_notification_at_ms = Some(finished_at);
                            let metadata = AlertMetadata {
                                job_id: job.id.clone(),
                                job_name: job.name.clone(),
                                consecutive_failures: job.state.consecutive_failures,
                                last_error: error.clone(),
                            };
                            alert = Some((message, metadata));
                        }
                    }
                }
                refresh_next_run(job, finished_at);

                let state = job.state.clone();
                let deleted = outcome.is_ok() && job.delete_after_run;
                if deleted {
                    jobs.remove(idx);
                }
                Ok(Committed {
                    state,
                    alert,
                    deleted,
                })
            })
            .await;

        let committed = match committed {
            Ok(c) => c,
            Err(CronError::NotFound { id }) => {
                warn!(job_id = %id, status = %outcome.status(), "job removed while running, outcome dropped");
                return Err(CronError::NotFound { id });
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to persist run outcome");
                return Err(e);
            }
        };

        match &outcome {
            RunOutcome::Ok { .. } => info!(
                job_id = %job_id,
                duration_ms = finished_at - started_at,
                "job run succeeded"
            ),
            RunOutcome::Error { error } => warn!(
                job_id = %job_id,
                error = %error,
                consecutive_failures = committed.state.consecutive_failures,
                "job run failed"
            ),
        }
        if committed.deleted {
            self.run_locks.remove(job_id);
            info!(job_id = %job_id, "one-shot job removed after successful run");
        }

        let alerted = committed.alert.is_some();
        if let Some((message, metadata)) = committed.alert {
            warn!(
                job_id = %job_id,
                consecutive_failures = metadata.consecutive_failures,
                "{}",
                message
            );
            if let Err(e) = self.events.emit(&message, &metadata).await {
                error!(job_id = %job_id, error = %e, "failed to deliver failure alert");
            }
            self.heartbeat.request_wake_now();
        }

        Ok(RunReport::Ran {
            outcome,
            alerted,
            state: committed.state,
        })
    }
}
