//! Per-job run slots.
//!
//! One lazily created async mutex per job id. Holding the guard means "this
//! job is running"; different jobs never contend with each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub(crate) type RunGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub(crate) struct RunLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RunLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn slot(&self, job_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Wait until the job's slot is free and take it.
    pub(crate) async fn acquire(&self, job_id: &str) -> RunGuard {
        self.slot(job_id).lock_owned().await
    }

    /// Take the job's slot only if nobody is running it.
    pub(crate) fn try_acquire(&self, job_id: &str) -> Option<RunGuard> {
        self.slot(job_id).try_lock_owned().ok()
    }

    pub(crate) fn is_running(&self, job_id: &str) -> bool {
        self.locks
            .get(job_id)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    pub(crate) fn remove(&self, job_id: &str) {
        self.locks.remove(job_id);
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, job_id: &str) -> bool {
        self.locks.contains_key(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_job_is_exclusive() {
        let locks = RunLocks::new();
        let guard = locks.acquire("a").await;
        assert!(locks.is_running("a"));
        assert!(locks.try_acquire("a").is_none());
        drop(guard);
        assert!(!locks.is_running("a"));
        assert!(locks.try_acquire("a").is_some());
    }

    #[tokio::test]
    async fn test_different_jobs_do_not_contend() {
        let locks = RunLocks::new();
        let _a = locks.acquire("a").await;
        assert!(locks.try_acquire("b").is_some());
    }

    #[tokio::test]
    async fn test_waiter_gets_slot_after_release() {
        let locks = Arc::new(RunLocks::new());
        let guard = locks.acquire("a").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("a").await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[test]
    fn test_unknown_job_is_not_running() {
        let locks = RunLocks::new();
        assert!(!locks.is_running("ghost"));
        assert!(!locks.contains("ghost"));
        let _guard = locks.try_acquire("ghost");
        assert!(locks.contains("ghost"));
        locks.remove("ghost");
        assert!(!locks.contains("ghost"));
    }
}
