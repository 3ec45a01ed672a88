use thiserror::Error;

/// Abnormal ends of a batch run.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The job was cancelled; the dataset was flushed before returning.
    #[error("job cancelled")]
    Cancelled,
    /// Reading or writing the dataset failed.
    #[error("dataset I/O failed: {0:#}")]
    Dataset(anyhow::Error),
    #[error("scheduler failed: {0:#}")]
    Scheduler(anyhow::Error),
}
