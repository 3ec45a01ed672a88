//! Tests for the job store (in-memory database).

use std::path::PathBuf;

use super::{JobStore, RunInfo};
use crate::job::{Job, JobRegistry, JobStats, JobStatus, NewJob, PauseReason};

fn run_info() -> RunInfo {
    RunInfo {
        input_path: PathBuf::from("/data/uploads/contacts.json"),
        output_path: PathBuf::from("/data/uploads/outreach_result_1.json"),
        timeout_ms: 5_000,
    }
}

fn sample_job() -> Job {
    let registry = JobRegistry::new();
    let mut job = registry.create(NewJob {
        total_phones: 9,
        retry_delay_ms: 1_200_000,
        download_url: Some("outreach_result_1.json".to_string()),
        stats: JobStats::default(),
    });
    job.processed = 4;
    job.current_index = 4;
    job.stats = JobStats {
        total: 5,
        invalid: 1,
        found: 3,
        not_found: 1,
        send_message_success: 3,
        ..Default::default()
    };
    job
}

#[tokio::test]
async fn save_and_get_roundtrip() {
    let store = JobStore::open_memory().await.unwrap();
    let mut job = sample_job();
    job.status = JobStatus::Paused;
    job.paused_until = Some(1_700_000_000_000);
    job.pause_reason = Some(PauseReason::RateLimit);
    job.warning = Some("rate limited".to_string());

    store.save_job(&job, &run_info()).await.unwrap();
    let stored = store.get_job(job.id).await.unwrap().expect("stored");
    assert_eq!(stored.job, job);
    assert_eq!(stored.run, run_info());

    assert!(store.get_job(uuid::Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn save_overwrites_previous_snapshot() {
    let store = JobStore::open_memory().await.unwrap();
    let mut job = sample_job();
    job.status = JobStatus::Running;
    store.save_job(&job, &run_info()).await.unwrap();

    job.status = JobStatus::Completed;
    job.processed = 9;
    store.save_job(&job, &run_info()).await.unwrap();

    let all = store.list_jobs().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].job.status, JobStatus::Completed);
    assert_eq!(all[0].job.processed, 9);
}

#[tokio::test]
async fn recover_marks_interrupted_jobs_paused() {
    let store = JobStore::open_memory().await.unwrap();
    let mut running = sample_job();
    running.status = JobStatus::Running;
    running.current_phone = Some("0912345678".to_string());
    let mut done = sample_job();
    done.status = JobStatus::Completed;
    store.save_job(&running, &run_info()).await.unwrap();
    store.save_job(&done, &run_info()).await.unwrap();

    assert_eq!(store.recover_interrupted_jobs().await.unwrap(), 1);

    let running = store.get_job(running.id).await.unwrap().unwrap().job;
    assert_eq!(running.status, JobStatus::Paused);
    assert!(running.current_phone.is_none());
    assert!(running.warning.is_some());
    assert_eq!(running.processed, 4);
    let done = store.get_job(done.id).await.unwrap().unwrap().job;
    assert_eq!(done.status, JobStatus::Completed);

    assert_eq!(store.recover_interrupted_jobs().await.unwrap(), 0);
}

#[tokio::test]
async fn list_newest_first_and_remove() {
    let store = JobStore::open_memory().await.unwrap();
    let mut older = sample_job();
    older.created_at = 1_000;
    let mut newer = sample_job();
    newer.created_at = 2_000;
    store.save_job(&older, &run_info()).await.unwrap();
    store.save_job(&newer, &run_info()).await.unwrap();

    let ids: Vec<_> = store.list_jobs().await.unwrap().into_iter().map(|s| s.job.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);

    store.remove_job(newer.id).await.unwrap();
    let all = store.list_jobs().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].job.id, older.id);
}

#[tokio::test]
async fn open_at_persists_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("jobs.db");
    let job = sample_job();
    {
        let store = JobStore::open_at(&path).await.unwrap();
        store.save_job(&job, &run_info()).await.unwrap();
    }
    let store = JobStore::open_at(&path).await.unwrap();
    assert_eq!(store.get_job(job.id).await.unwrap().unwrap().job.id, job.id);
}
