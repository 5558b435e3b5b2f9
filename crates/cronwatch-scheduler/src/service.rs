//! The cron service: owns the job table, the timer loop and every state
//! transition.
//!
//! Every mutation follows the same shape: take the table lock, apply the change
//! to a copy, persist the copy, and only then publish it as the new table. A
//! failed save leaves both the table and the store as they were.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cronwatch_protocols::{
    CronError, CronJob, CronJobCreate, CronJobPatch, EventSink, HeartbeatRequester, JobRunner,
    NoopEventSink, NoopHeartbeat, Schedule,
};

use crate::clock::{Clock, SystemClock};
use crate::escalation::EscalationPolicy;
use crate::locks::RunLocks;
use crate::runner::JobRunnerAdapter;
use crate::schedule::{next_due, validate_schedule};
use crate::store::JobStore;

/// Tunables for [`CronService`].
#[derive(Debug, Clone)]
pub struct CronServiceConfig {
    /// How often the timer loop scans for due jobs.
    pub tick_interval: Duration,
    /// Failure alert throttle window.
    pub escalation: EscalationPolicy,
    /// How long `stop` waits for in-flight scheduled runs.
    pub stop_grace: Duration,
}

impl Default for CronServiceConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            escalation: EscalationPolicy::default(),
            stop_grace: Duration::from_secs(30),
        }
    }
}

/// Whether the timer loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Stopped,
    Running,
}

/// Snapshot returned by [`CronService::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronStatus {
    pub state: ServiceState,
    pub jobs: usize,
    pub enabled_jobs: usize,
    pub next_wake_at_ms: Option<i64>,
}

pub(crate) struct TimerHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) handle: JoinHandle<()>,
}

pub(crate) struct ServiceInner {
    pub(crate) config: CronServiceConfig,
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) runner: JobRunnerAdapter,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) heartbeat: Arc<dyn HeartbeatRequester>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) jobs: tokio::sync::Mutex<Vec<CronJob>>,
    pub(crate) run_locks: RunLocks,
    pub(crate) timer: Mutex<Option<TimerHandle>>,
    pub(crate) in_flight: TaskTracker,
}

impl ServiceInner {
    /// Apply `change` to a copy of the table, persist it, then publish it.
    pub(crate) async fn commit<T, F>(&self, change: F) -> Result<T, CronError>
    where
        F: FnOnce(&mut Vec<CronJob>) -> Result<T, CronError>,
    {
        let mut table = self.jobs.lock().await;
        let mut next = table.clone();
        let value = change(&mut next)?;
        self.store.save(&next).await?;
        *table = next;
        Ok(value)
    }
}

/// Recompute the observability hint for the next run.
pub(crate) fn refresh_next_run(job: &mut CronJob, now_ms: i64) {
    job.state.next_run_at_ms = if job.enabled {
        next_due(&job.schedule, now_ms, job.state.last_run_at_ms)
            .ok()
            .flatten()
    } else {
        None
    };
}

/// Builder for [`CronService`].
pub struct CronServiceBuilder {
    store: Arc<dyn JobStore>,
    runner: Arc<dyn JobRunner>,
    events: Arc<dyn EventSink>,
    heartbeat: Arc<dyn HeartbeatRequester>,
    clock: Arc<dyn Clock>,
    config: CronServiceConfig,
}

impl CronServiceBuilder {
    /// Start a builder. Alerts go nowhere and time comes from the system clock
    /// unless overridden.
    pub fn new(store: Arc<dyn JobStore>, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            store,
            runner,
            events: Arc::new(NoopEventSink),
            heartbeat: Arc::new(NoopHeartbeat),
            clock: Arc::new(SystemClock),
            config: CronServiceConfig::default(),
        }
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn heartbeat(mut self, heartbeat: Arc<dyn HeartbeatRequester>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: CronServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Lock the store, load the persisted table and build the service in the
    /// stopped state.
    ///
    /// A store already owned by another service fails with
    /// [`StorageError::Locked`](cronwatch_protocols::StorageError::Locked).
    pub async fn build(self) -> Result<CronService, CronError> {
        self.store.lock().await?;
        let loaded = self.store.load().await?;

        let mut jobs: Vec<CronJob> = Vec::with_capacity(loaded.len());
        for job in loaded {
            if jobs.iter().any(|j| j.id == job.id) {
                warn!(job_id = %job.id, "duplicate job id in store, keeping the first record");
                continue;
            }
            jobs.push(job);
        }
        info!(jobs = jobs.len(), "cron service loaded job table");

        Ok(CronService {
            inner: Arc::new(ServiceInner {
                config: self.config,
                store: self.store,
                runner: JobRunnerAdapter::new(self.runner),
                events: self.events,
                heartbeat: self.heartbeat,
                clock: self.clock,
                jobs: tokio::sync::Mutex::new(jobs),
                run_locks: RunLocks::new(),
                timer: Mutex::new(None),
                in_flight: TaskTracker::new(),
            }),
        })
    }
}

/// Persistent recurring job scheduler.
///
/// Cheap to clone; clones share the same table and timer.
#[derive(Clone)]
pub struct CronService {
    pub(crate) inner: Arc<ServiceInner>,
}

impl CronService {
    pub fn builder(store: Arc<dyn JobStore>, runner: Arc<dyn JobRunner>) -> CronServiceBuilder {
        CronServiceBuilder::new(store, runner)
    }

    pub fn config(&self) -> &CronServiceConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ServiceState {
        if self.inner.timer.lock().is_some() {
            ServiceState::Running
        } else {
            ServiceState::Stopped
        }
    }

    /// Start the timer loop. Calling it while running is a no-op.
    pub async fn start(&self) {
        let mut timer = self.inner.timer.lock();
        if timer.is_some() {
            debug!("cron service already running");
            return;
        }
        *timer = Some(self.spawn_timer());
        info!(
            tick_ms = self.inner.config.tick_interval.as_millis() as u64,
            "cron service started"
        );
    }

    /// Stop the timer loop and wait (up to the grace period) for scheduled
    /// runs that are still in flight. Idempotent.
    pub async fn stop(&self) {
        let timer = self.inner.timer.lock().take();
        let Some(timer) = timer else {
            debug!("cron service already stopped");
            return;
        };

        timer.cancel.cancel();
        if let Err(e) = timer.handle.await {
            warn!(error = %e, "timer loop ended abnormally");
        }

        let tracker = &self.inner.in_flight;
        tracker.close();
        if tokio::time::timeout(self.inner.config.stop_grace, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                in_flight = tracker.len(),
                "stop grace period elapsed with runs still in flight"
            );
        }
        tracker.reopen();

        info!("cron service stopped");
    }

    /// Create a job from a draft and persist it.
    pub async fn add(&self, draft: CronJobCreate) -> Result<CronJob, CronError> {
        validate_draft(&draft.name, &draft.schedule)?;
        let now = self.inner.clock.now_ms();

        let job = self
            .inner
            .commit(|jobs| {
                let mut id = Uuid::new_v4().to_string();
                while jobs.iter().any(|j| j.id == id) {
                    id = Uuid::new_v4().to_string();
                }
                let mut job = CronJob::from_create(id, draft, now);
                refresh_next_run(&mut job, now);
                jobs.push(job.clone());
                Ok(job)
            })
            .await?;

        info!(
            job_id = %job.id,
            name = %job.name,
            schedule = %job.schedule.describe(),
            "job added"
        );
        Ok(job)
    }

    /// Apply a partial update. Run state is preserved.
    pub async fn update(&self, job_id: &str, patch: CronJobPatch) -> Result<CronJob, CronError> {
        if let Some(schedule) = &patch.schedule {
            validate_schedule(schedule).map_err(|e| CronError::InvalidSchedule(e.to_string()))?;
        }
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CronError::InvalidJob("name cannot be empty".to_string()));
        }
        let now = self.inner.clock.now_ms();

        let job = self
            .inner
            .commit(|jobs| {
                let job = jobs
                    .iter_mut()
                    .find(|j| j.id == job_id)
                    .ok_or_else(|| CronError::not_found(job_id))?;
                job.apply_patch(patch, now);
                refresh_next_run(job, now);
                Ok(job.clone())
            })
            .await?;

        info!(job_id = %job.id, "job updated");
        Ok(job)
    }

    /// Delete a job.
    pub async fn remove(&self, job_id: &str) -> Result<CronJob, CronError> {
        let removed = self
            .inner
            .commit(|jobs| {
                let idx = jobs
                    .iter()
                    .position(|j| j.id == job_id)
                    .ok_or_else(|| CronError::not_found(job_id))?;
                Ok(jobs.remove(idx))
            })
            .await?;

        self.inner.run_locks.remove(job_id);
        info!(job_id = %job_id, name = %removed.name, "job removed");
        Ok(removed)
    }

    pub async fn get(&self, job_id: &str) -> Result<CronJob, CronError> {
        self.inner
            .jobs
            .lock()
            .await
            .iter()
            .find(|j| j.id == job_id)
            .cloned()
            .ok_or_else(|| CronError::not_found(job_id))
    }

    /// List jobs ordered by next run time (never-due jobs last).
    pub async fn list(&self, include_disabled: bool) -> Vec<CronJob> {
        let mut jobs: Vec<CronJob> = self
            .inner
            .jobs
            .lock()
            .await
            .iter()
            .filter(|j| include_disabled || j.enabled)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.state.next_run_at_ms.unwrap_or(i64::MAX));
        jobs
    }

    /// Whether a run of this job is in progress right now.
    pub fn is_running(&self, job_id: &str) -> bool {
        self.inner.run_locks.is_running(job_id)
    }

    pub async fn status(&self) -> CronStatus {
        let now = self.inner.clock.now_ms();
        let jobs = self.inner.jobs.lock().await;
        let enabled: Vec<&CronJob> = jobs.iter().filter(|j| j.enabled).collect();
        let next_wake_at_ms = enabled
            .iter()
            .filter_map(|j| {
                next_due(&j.schedule, now, j.state.last_run_at_ms)
                    .ok()
                    .flatten()
            })
            .min();

        CronStatus {
            state: self.state(),
            jobs: jobs.len(),
            enabled_jobs: enabled.len(),
            next_wake_at_ms,
        }
    }
}

fn validate_draft(name: &str, schedule: &Schedule) -> Result<(), CronError> {
    if name.trim().is_empty() {
        return Err(CronError::InvalidJob("name cannot be empty".to_string()));
    }
    validate_schedule(schedule).map_err(|e| CronError::InvalidSchedule(e.to_string()))
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
