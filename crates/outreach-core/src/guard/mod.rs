//! Rate-limit guard.
//!
//! Watches provider failures; on a quota response it moves a running job to
//! `paused` with a deadline (`paused_until = now + retry_delay`). It never
//! schedules a timer: whoever next checks the job (the pause wait in the
//! batch processor, or a status read) performs the auto-resume once the
//! deadline has passed.

mod classify;

pub use classify::{is_rate_limit, is_rate_limit_message, RATE_LIMIT_PHRASES};

use std::sync::Arc;

use crate::config::clamp_retry_delay_ms;
use crate::job::{Job, JobId, JobPatch, JobRegistry, JobStatus, PauseReason};
use crate::provider::ProviderError;

/// Operator-facing warning set when a job is paused for rate limiting.
pub fn rate_limit_warning(delay_ms: u64) -> String {
    let minutes = delay_ms / 60_000;
    format!("Paused due to provider rate limit. Resuming automatically in {minutes} minute(s).")
}

/// Patch that auto-pauses a job for `delay_ms` starting at `now_ms`.
pub fn auto_pause_patch(delay_ms: u64, now_ms: i64) -> JobPatch {
    JobPatch {
        status: Some(JobStatus::Paused),
        paused_until: Some(Some(now_ms.saturating_add(delay_ms as i64))),
        pause_reason: Some(Some(PauseReason::RateLimit)),
        warning: Some(Some(rate_limit_warning(delay_ms))),
        ..Default::default()
    }
}

/// True if a paused job's auto-resume deadline has passed.
pub fn should_auto_resume(job: &Job, now_ms: i64) -> bool {
    job.status == JobStatus::Paused && job.paused_until.is_some_and(|until| now_ms >= until)
}

/// Requests rate-limit transitions through the registry; never touches rows.
#[derive(Clone)]
pub struct RateLimitGuard {
    registry: Arc<JobRegistry>,
}

impl RateLimitGuard {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    /// Inspect a failure. If it is a rate-limit response and the job is
    /// running, pause the job and return the new snapshot.
    pub fn observe(&self, job_id: JobId, err: &ProviderError, now_ms: i64) -> Option<Job> {
        if !is_rate_limit(err) {
            return None;
        }
        let mut paused = false;
        let job = self.registry.modify(job_id, |job| {
            if job.status != JobStatus::Running {
                return None;
            }
            paused = true;
            Some(auto_pause_patch(clamp_retry_delay_ms(Some(job.retry_delay_ms)), now_ms))
        })?;
        if !paused {
            tracing::debug!(%job_id, status = %job.status, "rate limit seen; job not running");
            return None;
        }
        tracing::warn!(
            %job_id,
            paused_until = job.paused_until,
            error = %err.cell_text(),
            "provider rate limit; job auto-paused"
        );
        Some(job)
    }

    /// Resume the job if its pause deadline has passed. Returns the new snapshot on resume.
    pub fn try_auto_resume(&self, job_id: JobId, now_ms: i64) -> Option<Job> {
        let mut resumed = false;
        let job = self.registry.modify(job_id, |job| {
            resumed = should_auto_resume(job, now_ms);
            resumed.then(JobPatch::resume)
        })?;
        if resumed {
            tracing::info!(%job_id, "rate-limit pause elapsed; job auto-resumed");
            Some(job)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::NewJob;
    use crate::provider::ProviderErrorKind;

    fn running_job(registry: &JobRegistry, retry_delay_ms: u64) -> JobId {
        let job = registry.create(NewJob {
            total_phones: 3,
            retry_delay_ms,
            ..Default::default()
        });
        registry.update(job.id, JobPatch::status(JobStatus::Running));
        job.id
    }

    #[test]
    fn rate_limit_pauses_running_job_until_deadline() {
        let registry = Arc::new(JobRegistry::new());
        let guard = RateLimitGuard::new(Arc::clone(&registry));
        let id = running_job(&registry, 70_000);

        let now = 1_000_000;
        let job = guard
            .observe(id, &ProviderError::rate_limited("429"), now)
            .expect("paused");
        assert_eq!(job.status, JobStatus::Paused);
        assert_eq!(job.paused_until, Some(now + 70_000));
        assert_eq!(job.pause_reason, Some(PauseReason::RateLimit));
        assert!(job.warning.as_deref().unwrap().contains("1 minute"));
    }

    #[test]
    fn out_of_range_delay_is_clamped() {
        let registry = Arc::new(JobRegistry::new());
        let guard = RateLimitGuard::new(Arc::clone(&registry));
        let id = running_job(&registry, 0);
        let job = guard
            .observe(id, &ProviderError::other("too many requests"), 0)
            .unwrap();
        assert_eq!(job.paused_until, Some(60_000));
    }

    #[test]
    fn non_matching_error_or_idle_job_is_ignored() {
        let registry = Arc::new(JobRegistry::new());
        let guard = RateLimitGuard::new(Arc::clone(&registry));
        let id = running_job(&registry, 60_000);

        let plain = ProviderError::new(ProviderErrorKind::Transport, "connection refused");
        assert!(guard.observe(id, &plain, 0).is_none());
        assert_eq!(registry.get(id).unwrap().status, JobStatus::Running);

        registry.update(id, JobPatch::status(JobStatus::Paused));
        assert!(guard.observe(id, &ProviderError::rate_limited("429"), 0).is_none());
        assert!(registry.get(id).unwrap().paused_until.is_none());

        assert!(guard
            .observe(uuid::Uuid::new_v4(), &ProviderError::rate_limited("429"), 0)
            .is_none());
    }

    #[test]
    fn auto_resume_waits_for_deadline_and_clears_fields() {
        let registry = Arc::new(JobRegistry::new());
        let guard = RateLimitGuard::new(Arc::clone(&registry));
        let id = running_job(&registry, 60_000);
        guard.observe(id, &ProviderError::rate_limited("429"), 0);

        assert!(guard.try_auto_resume(id, 59_999).is_none());
        assert_eq!(registry.get(id).unwrap().status, JobStatus::Paused);

        let job = guard.try_auto_resume(id, 60_000).expect("resumed");
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.paused_until.is_none());
        assert!(job.pause_reason.is_none());
        assert!(job.warning.is_none());
    }

    #[test]
    fn manual_pause_never_auto_resumes() {
        let registry = Arc::new(JobRegistry::new());
        let guard = RateLimitGuard::new(Arc::clone(&registry));
        let id = running_job(&registry, 60_000);
        registry.update(id, JobPatch::status(JobStatus::Paused));
        assert!(guard.try_auto_resume(id, i64::MAX).is_none());
    }
}
