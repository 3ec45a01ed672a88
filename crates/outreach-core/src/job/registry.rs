//! In-memory job registry with one watch channel per job.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use uuid::Uuid;

use super::types::{Job, JobId, JobPatch, JobStatus, NewJob};
use crate::unix_millis;

/// Shared registry of job id -> job record.
///
/// Each record sits behind its own `watch::Sender`, which is the single
/// mutation point for that job: writers are serialized by the channel and
/// every change wakes the subscribers.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, watch::Sender<Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, watch::Sender<Job>>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, watch::Sender<Job>>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a job in `pending` with a fresh id.
    pub fn create(&self, init: NewJob) -> Job {
        let job = Job::new(Uuid::new_v4(), init, unix_millis());
        let (tx, _rx) = watch::channel(job.clone());
        self.write().insert(job.id, tx);
        tracing::debug!(job_id = %job.id, total_phones = job.total_phones, "job created");
        job
    }

    /// Register a job restored from durable state under its existing id,
    /// reset to `pending` for a new run segment. Replaces any live record.
    pub fn restore(&self, mut job: Job) -> Job {
        job.status = JobStatus::Pending;
        job.current_phone = None;
        job.paused_until = None;
        job.pause_reason = None;
        job.error = None;
        job.updated_at = unix_millis();
        let (tx, _rx) = watch::channel(job.clone());
        self.write().insert(job.id, tx);
        tracing::debug!(job_id = %job.id, processed = job.processed, "job restored");
        job
    }

    /// Snapshot of a job, or None if it does not exist.
    pub fn get(&self, id: JobId) -> Option<Job> {
        self.read().get(&id).map(|tx| tx.borrow().clone())
    }

    /// Snapshots of all jobs, oldest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().values().map(|tx| tx.borrow().clone()).collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Shallow-merge `patch` into the job. No-op (returns None) if the job no longer exists.
    pub fn update(&self, id: JobId, patch: JobPatch) -> Option<Job> {
        self.modify(id, |_| Some(patch))
    }

    /// Atomic read-decide-write: `decide` sees the current record and returns
    /// the patch to apply, or None to leave it unchanged. No other writer can
    /// interleave between the read and the write. Returns the resulting snapshot.
    pub fn modify<F>(&self, id: JobId, decide: F) -> Option<Job>
    where
        F: FnOnce(&Job) -> Option<JobPatch>,
    {
        let jobs = self.read();
        let tx = jobs.get(&id)?;
        let mut snapshot = None;
        tx.send_if_modified(|job| {
            let changed = match decide(job) {
                Some(patch) => job.apply(patch, unix_millis()),
                None => false,
            };
            snapshot = Some(job.clone());
            changed
        });
        snapshot
    }

    /// Receiver that observes every change of the job.
    pub fn subscribe(&self, id: JobId) -> Option<watch::Receiver<Job>> {
        self.read().get(&id).map(|tx| tx.subscribe())
    }

    /// Drop a job record. Subscribers see their channel close.
    pub fn remove(&self, id: JobId) -> Option<Job> {
        self.write().remove(&id).map(|tx| tx.borrow().clone())
    }
}
