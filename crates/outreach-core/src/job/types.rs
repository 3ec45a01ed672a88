//! Job record, status, counters, and the partial-update patch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque job identifier.
pub type JobId = Uuid;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse a stored status; unknown strings map to `Failed`.
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "paused" => JobStatus::Paused,
            "cancelled" => JobStatus::Cancelled,
            "completed" => JobStatus::Completed,
            _ => JobStatus::Failed,
        }
    }

    /// Cancelled, completed and failed jobs never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled | JobStatus::Completed | JobStatus::Failed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job was paused automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    RateLimit,
}

/// Per-job outcome counters. Every counter only grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: u64,
    pub invalid: u64,
    pub found: u64,
    pub not_found: u64,
    pub error: u64,
    pub send_message_success: u64,
    pub send_message_failed: u64,
}

impl JobStats {
    /// Element-wise maximum, so a late or reordered snapshot never lowers a counter.
    pub fn merge_max(&mut self, other: &JobStats) {
        self.total = self.total.max(other.total);
        self.invalid = self.invalid.max(other.invalid);
        self.found = self.found.max(other.found);
        self.not_found = self.not_found.max(other.not_found);
        self.error = self.error.max(other.error);
        self.send_message_success = self.send_message_success.max(other.send_message_success);
        self.send_message_failed = self.send_message_failed.max(other.send_message_failed);
    }
}

/// One bulk-processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub total_phones: u64,
    pub processed: u64,
    pub current_index: u64,
    pub current_phone: Option<String>,
    pub stats: JobStats,
    /// Pause length applied when the provider rate-limits us.
    pub retry_delay_ms: u64,
    /// Unix millis after which a rate-limit pause ends by itself.
    pub paused_until: Option<i64>,
    pub pause_reason: Option<PauseReason>,
    pub warning: Option<String>,
    pub error: Option<String>,
    pub download_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Initial fields for [`crate::job::JobRegistry::create`].
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub total_phones: u64,
    pub retry_delay_ms: u64,
    pub download_url: Option<String>,
    pub stats: JobStats,
}

/// Shallow partial update. `None` leaves a field untouched; for optional
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub processed: Option<u64>,
    pub current_index: Option<u64>,
    pub current_phone: Option<Option<String>>,
    pub stats: Option<JobStats>,
    pub retry_delay_ms: Option<u64>,
    pub paused_until: Option<Option<i64>>,
    pub pause_reason: Option<Option<PauseReason>>,
    pub warning: Option<Option<String>>,
    pub error: Option<Option<String>>,
    pub download_url: Option<Option<String>>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Back to `running` with the auto-pause bookkeeping cleared.
    pub fn resume() -> Self {
        Self {
            status: Some(JobStatus::Running),
            paused_until: Some(None),
            pause_reason: Some(None),
            warning: Some(None),
            ..Default::default()
        }
    }
}

impl Job {
    pub(crate) fn new(id: JobId, init: NewJob, now: i64) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            total_phones: init.total_phones,
            processed: 0,
            current_index: 0,
            current_phone: None,
            stats: init.stats,
            retry_delay_ms: init.retry_delay_ms,
            paused_until: None,
            pause_reason: None,
            warning: None,
            error: None,
            download_url: init.download_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge `patch` into the record. Returns true if anything changed.
    ///
    /// A terminal status is kept even if the patch names another one;
    /// `processed` and `stats` never decrease and `processed` never exceeds
    /// `total_phones`.
    pub(crate) fn apply(&mut self, patch: JobPatch, now: i64) -> bool {
        let before = self.clone();

        if let Some(status) = patch.status {
            if self.status.is_terminal() && status != self.status {
                tracing::debug!(
                    job_id = %self.id,
                    from = %self.status,
                    to = %status,
                    "ignoring status change on finished job"
                );
            } else {
                self.status = status;
            }
        }
        if let Some(processed) = patch.processed {
            self.processed = self.processed.max(processed).min(self.total_phones);
        }
        if let Some(index) = patch.current_index {
            self.current_index = index;
        }
        if let Some(phone) = patch.current_phone {
            self.current_phone = phone;
        }
        if let Some(stats) = patch.stats {
            self.stats.merge_max(&stats);
        }
        if let Some(delay) = patch.retry_delay_ms {
            self.retry_delay_ms = delay;
        }
        if let Some(until) = patch.paused_until {
            self.paused_until = until;
        }
        if let Some(reason) = patch.pause_reason {
            self.pause_reason = reason;
        }
        if let Some(warning) = patch.warning {
            self.warning = warning;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
        if let Some(url) = patch.download_url {
            self.download_url = url;
        }

        let changed = *self != before;
        if changed {
            self.updated_at = now;
        }
        changed
    }
}
