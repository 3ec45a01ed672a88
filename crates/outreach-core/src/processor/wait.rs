//! Dispatch gate: consult job status before each row.
//!
//! A paused job blocks the driver. The wait wakes on every registry change
//! to the job (resume, cancel) and polls at a fixed interval only to notice
//! an elapsed auto-resume deadline.

use std::time::Duration;

use crate::guard::RateLimitGuard;
use crate::job::{JobId, JobRegistry, JobStatus};
use crate::unix_millis;

/// Why the driver stopped dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    Cancelled,
    /// The job record no longer exists.
    Missing,
    /// Completed or failed elsewhere.
    Finished(JobStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Proceed,
    Stop(StopReason),
}

/// Status check without waiting, for the moment a unit is about to start.
/// Anything but a running job sends the driver back through [`gate`].
pub(crate) fn may_start(registry: &JobRegistry, job_id: JobId) -> bool {
    registry
        .get(job_id)
        .is_some_and(|job| matches!(job.status, JobStatus::Running | JobStatus::Pending))
}

pub(crate) async fn gate(
    registry: &JobRegistry,
    guard: &RateLimitGuard,
    job_id: JobId,
    poll: Duration,
) -> Gate {
    let Some(mut rx) = registry.subscribe(job_id) else {
        return Gate::Stop(StopReason::Missing);
    };
    let mut announced = false;
    loop {
        let status = rx.borrow_and_update().status;
        match status {
            JobStatus::Running | JobStatus::Pending => return Gate::Proceed,
            JobStatus::Cancelled => return Gate::Stop(StopReason::Cancelled),
            JobStatus::Completed | JobStatus::Failed => {
                return Gate::Stop(StopReason::Finished(status))
            }
            JobStatus::Paused => {
                if guard.try_auto_resume(job_id, unix_millis()).is_some() {
                    return Gate::Proceed;
                }
                if !announced {
                    tracing::info!(%job_id, "job paused; dispatch waiting");
                    announced = true;
                }
            }
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Gate::Stop(StopReason::Missing);
                }
            }
            _ = tokio::time::sleep(poll) => {}
        }
    }
}
