//! Timer loop: periodic due-job scan.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use cronwatch_protocols::CronError;

use crate::locks::RunGuard;
use crate::schedule::is_due;
use crate::service::{CronService, ServiceInner, TimerHandle};
use crate::service_run::{RunMode, RunReport};

impl CronService {
    pub(crate) fn spawn_timer(&self) -> TimerHandle {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(timer_loop(
            Arc::downgrade(&self.inner),
            self.inner.config.tick_interval,
            cancel.clone(),
        ));
        TimerHandle { cancel, handle }
    }

    /// Run one scan pass inline and wait for every due job to finish.
    ///
    /// Jobs already running are skipped. Each entry pairs a job id with the
    /// result of its run; one job failing does not affect the others.
    pub async fn run_due_jobs(&self) -> Vec<(String, Result<RunReport, CronError>)> {
        let claimed = self.inner.claim_due_jobs().await;
        let runs = claimed.into_iter().map(|(id, guard)| {
            let inner = &self.inner;
            async move {
                let result = inner.run_locked(&id, RunMode::Scheduled, guard).await;
                (id, result)
            }
        });
        join_all(runs).await
    }
}

async fn timer_loop(inner: Weak<ServiceInner>, tick: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(strong) = inner.upgrade() else {
                    break;
                };
                strong.dispatch_due_jobs().await;
            }
        }
    }
    debug!("timer loop exited");
}

impl ServiceInner {
    /// Find enabled, due jobs and take the run slot of each one that is idle.
    async fn claim_due_jobs(&self) -> Vec<(String, RunGuard)> {
        let now = self.clock.now_ms();
        let due: Vec<String> = {
            let jobs = self.jobs.lock().await;
            jobs.iter()
                .filter(|job| job.enabled)
                .filter(
                    |job| match is_due(&job.schedule, now, job.state.last_run_at_ms) {
                        Ok(due) => due,
                        Err(e) => {
                            warn!(job_id = %job.id, error = %e, "skipping job with invalid schedule");
                            false
                        }
                    },
                )
                .map(|job| job.id.clone())
                .collect()
        };

        due.into_iter()
            .filter_map(|id| match self.run_locks.try_acquire(&id) {
                Some(guard) => Some((id, guard)),
                None => {
                    debug!(job_id = %id, "job still running, skipping this tick");
                    None
                }
            })
            .collect()
    }

    /// Spawn every claimed run onto the in-flight tracker.
    async fn dispatch_due_jobs(self: Arc<Self>) {
        let claimed = self.claim_due_jobs().await;
        if claimed.is_empty() {
            return;
        }
        debug!(count = claimed.len(), "dispatching due jobs");

        for (id, guard) in claimed {
            let inner = Arc::clone(&self);
            self.in_flight.spawn(async move {
                if let Err(e) = inner.run_locked(&id, RunMode::Scheduled, guard).await {
                    error!(job_id = %id, error = %e, "scheduled run failed");
                }
            });
        }
    }
}
