use thiserror::Error;

use crate::job::{JobId, JobStatus};

/// Failures reported to control-surface callers.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("job {id} already {status}")]
    Finished { id: JobId, status: JobStatus },
    #[error("job {0} is already being processed")]
    Active(JobId),
    #[error("dataset I/O failed: {0:#}")]
    Dataset(anyhow::Error),
    #[error("job store failed: {0:#}")]
    Store(anyhow::Error),
}
