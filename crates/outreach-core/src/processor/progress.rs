//! Background task that applies run progress to the registry and persists
//! a snapshot after every dataset flush.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::job::{JobId, JobPatch, JobRegistry, JobStats};
use crate::store::{JobStore, RunInfo};

#[derive(Debug, Clone)]
pub(crate) enum ProgressEvent {
    /// Counters after a dispatch (or at start/end, with no current phone).
    Progress {
        processed: u64,
        current_phone: Option<String>,
        stats: JobStats,
    },
    /// The dataset on disk now holds exactly the rows counted in `stats`.
    Flushed { stats: JobStats },
}

/// Runs until every sender is dropped. Spawn this with tokio::spawn.
pub(crate) async fn run_progress_loop(
    mut progress_rx: mpsc::Receiver<ProgressEvent>,
    registry: Arc<JobRegistry>,
    store: Option<JobStore>,
    job_id: JobId,
    run: RunInfo,
) {
    while let Some(event) = progress_rx.recv().await {
        match event {
            ProgressEvent::Progress {
                processed,
                current_phone,
                stats,
            } => {
                registry.update(
                    job_id,
                    JobPatch {
                        processed: Some(processed),
                        current_index: Some(processed),
                        current_phone: Some(current_phone),
                        stats: Some(stats),
                        ..Default::default()
                    },
                );
            }
            ProgressEvent::Flushed { stats } => {
                let updated = registry.update(
                    job_id,
                    JobPatch {
                        stats: Some(stats),
                        ..Default::default()
                    },
                );
                let (Some(store), Some(job)) = (&store, updated) else {
                    continue;
                };
                if let Err(e) = store.save_job(&job, &run).await {
                    tracing::warn!(%job_id, "durable progress update failed: {:#}", e);
                }
            }
        }
    }
}
