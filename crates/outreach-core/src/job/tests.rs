//! Tests for the job registry and patch semantics.

use super::*;

fn new_job(total: u64) -> NewJob {
    NewJob {
        total_phones: total,
        retry_delay_ms: 60_000,
        download_url: Some("/tmp/out.json".to_string()),
        stats: JobStats::default(),
    }
}

#[test]
fn create_defaults_to_pending() {
    let registry = JobRegistry::new();
    let job = registry.create(new_job(10));
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.processed, 0);
    assert_eq!(registry.get(job.id), Some(job.clone()));

    let other = registry.create(new_job(1));
    assert_ne!(job.id, other.id);
    assert_eq!(registry.list().len(), 2);
}

#[test]
fn update_is_shallow_merge() {
    let registry = JobRegistry::new();
    let job = registry.create(new_job(10));
    registry.update(
        job.id,
        JobPatch {
            status: Some(JobStatus::Running),
            current_phone: Some(Some("0912345678".to_string())),
            ..Default::default()
        },
    );
    let job = registry.get(job.id).unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.current_phone.as_deref(), Some("0912345678"));
    assert_eq!(job.download_url.as_deref(), Some("/tmp/out.json"));

    registry.update(
        job.id,
        JobPatch {
            current_phone: Some(None),
            ..Default::default()
        },
    );
    assert!(registry.get(job.id).unwrap().current_phone.is_none());
}

#[test]
fn update_missing_job_is_noop() {
    let registry = JobRegistry::new();
    assert!(registry
        .update(uuid::Uuid::new_v4(), JobPatch::status(JobStatus::Running))
        .is_none());
}

#[test]
fn terminal_status_is_immutable() {
    let registry = JobRegistry::new();
    let job = registry.create(new_job(5));
    registry.update(job.id, JobPatch::status(JobStatus::Cancelled));
    registry.update(job.id, JobPatch::resume());
    registry.update(job.id, JobPatch::status(JobStatus::Completed));
    assert_eq!(registry.get(job.id).unwrap().status, JobStatus::Cancelled);

    // Counters still land so the final flushed stats are visible.
    registry.update(
        job.id,
        JobPatch {
            processed: Some(3),
            ..Default::default()
        },
    );
    assert_eq!(registry.get(job.id).unwrap().processed, 3);
}

#[test]
fn processed_is_monotonic_and_bounded() {
    let registry = JobRegistry::new();
    let job = registry.create(new_job(4));
    let set = |n| JobPatch {
        processed: Some(n),
        ..Default::default()
    };
    registry.update(job.id, set(3));
    registry.update(job.id, set(1));
    assert_eq!(registry.get(job.id).unwrap().processed, 3);
    registry.update(job.id, set(9));
    assert_eq!(registry.get(job.id).unwrap().processed, 4);
}

#[test]
fn stats_never_decrease() {
    let registry = JobRegistry::new();
    let job = registry.create(new_job(4));
    let high = JobStats {
        total: 4,
        found: 3,
        ..Default::default()
    };
    let stale = JobStats {
        total: 2,
        found: 1,
        error: 1,
        ..Default::default()
    };
    registry.update(job.id, JobPatch { stats: Some(high), ..Default::default() });
    registry.update(job.id, JobPatch { stats: Some(stale), ..Default::default() });
    let stats = registry.get(job.id).unwrap().stats;
    assert_eq!(stats.total, 4);
    assert_eq!(stats.found, 3);
    assert_eq!(stats.error, 1);
}

#[test]
fn modify_sees_current_state() {
    let registry = JobRegistry::new();
    let job = registry.create(new_job(1));
    // Only pause a running job.
    let pause_if_running = |j: &Job| {
        (j.status == JobStatus::Running).then(|| JobPatch::status(JobStatus::Paused))
    };
    registry.modify(job.id, pause_if_running);
    assert_eq!(registry.get(job.id).unwrap().status, JobStatus::Pending);

    registry.update(job.id, JobPatch::status(JobStatus::Running));
    registry.modify(job.id, pause_if_running);
    assert_eq!(registry.get(job.id).unwrap().status, JobStatus::Paused);
}

#[tokio::test]
async fn subscribers_are_woken_on_change() {
    let registry = JobRegistry::new();
    let job = registry.create(new_job(1));
    let mut rx = registry.subscribe(job.id).unwrap();
    registry.update(job.id, JobPatch::status(JobStatus::Running));
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().status, JobStatus::Running);

    registry.remove(job.id);
    assert!(rx.changed().await.is_err());
    assert!(registry.get(job.id).is_none());
}

#[test]
fn restore_keeps_id_and_counters() {
    let registry = JobRegistry::new();
    let mut job = registry.create(new_job(10));
    job.status = JobStatus::Failed;
    job.processed = 6;
    job.error = Some("disk full".to_string());
    registry.remove(job.id);

    let restored = registry.restore(job.clone());
    assert_eq!(restored.id, job.id);
    assert_eq!(restored.status, JobStatus::Pending);
    assert_eq!(restored.processed, 6);
    assert!(restored.error.is_none());
}

#[test]
fn status_strings_roundtrip() {
    for s in [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Paused,
        JobStatus::Cancelled,
        JobStatus::Completed,
        JobStatus::Failed,
    ] {
        assert_eq!(JobStatus::parse(s.as_str()), s);
    }
    assert_eq!(JobStatus::parse("bogus"), JobStatus::Failed);
}
