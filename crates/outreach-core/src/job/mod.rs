//! Job registry: the single source of truth for job records.
//!
//! Every mutation of a job goes through [`JobRegistry`], which serializes
//! writes per job and broadcasts each new snapshot to subscribers (the pause
//! wait, progress displays, the control socket).

mod registry;
mod types;

pub use registry::JobRegistry;
pub use types::{Job, JobId, JobPatch, JobStats, JobStatus, NewJob, PauseReason};

#[cfg(test)]
mod tests;
