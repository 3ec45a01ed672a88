//! Control surface: start and continue runs, and let operators pause,
//! resume, cancel, retune and inspect jobs while they run.
//!
//! Every operation goes through the job registry. Operations on a job that
//! already finished are no-ops returning its snapshot; an unknown job id is
//! [`ControlError::NotFound`].

mod error;

pub use error::ControlError;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{clamp_retry_delay_ms, clamp_timeout_ms, OutreachConfig};
use crate::guard::RateLimitGuard;
use crate::job::{Job, JobId, JobPatch, JobRegistry, JobStatus, NewJob};
use crate::processor::{BatchEnd, BatchError, BatchProcessor, BatchRequest, EngineSettings};
use crate::provider::Provider;
use crate::sheet;
use crate::store::{JobStore, RunInfo};
use crate::unix_millis;

/// Parameters of a new run.
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    /// Dataset to process. Removed once the run ends.
    pub input: PathBuf,
    /// Per-send timeout; clamped to [1000, 30000] ms.
    pub timeout_ms: Option<u64>,
    /// Rate-limit pause length; clamped to [60000, 3600000] ms.
    pub retry_delay_ms: Option<u64>,
}

/// A run that has been accepted and is processing in the background.
#[derive(Debug)]
pub struct StartedRun {
    pub job_id: JobId,
    pub total_phones: u64,
    pub output: PathBuf,
    /// Resolves to the final job snapshot (None if the record was removed).
    pub handle: JoinHandle<Option<Job>>,
}

pub struct ControlSurface {
    processor: Arc<BatchProcessor>,
    registry: Arc<JobRegistry>,
    guard: RateLimitGuard,
    store: Option<JobStore>,
    output_dir: PathBuf,
    default_timeout_ms: u64,
    default_retry_delay_ms: u64,
}

impl ControlSurface {
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: EngineSettings,
        output_dir: impl Into<PathBuf>,
        store: Option<JobStore>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let mut processor = BatchProcessor::new(provider, Arc::clone(&registry), settings);
        if let Some(store) = &store {
            processor = processor.with_store(store.clone());
        }
        Self {
            processor: Arc::new(processor),
            guard: RateLimitGuard::new(Arc::clone(&registry)),
            registry,
            store,
            output_dir: output_dir.into(),
            default_timeout_ms: clamp_timeout_ms(None),
            default_retry_delay_ms: clamp_retry_delay_ms(None),
        }
    }

    /// Engine settings, output directory and defaults taken from the config file.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        cfg: &OutreachConfig,
        store: Option<JobStore>,
    ) -> anyhow::Result<Self> {
        let surface = Self::new(provider, EngineSettings::from(cfg), cfg.uploads_dir()?, store);
        Ok(surface.with_defaults(cfg.default_timeout_ms, cfg.default_retry_delay_ms))
    }

    /// Defaults for runs that do not name a timeout or retry delay.
    pub fn with_defaults(mut self, timeout_ms: u64, retry_delay_ms: u64) -> Self {
        self.default_timeout_ms = clamp_timeout_ms(Some(timeout_ms));
        self.default_retry_delay_ms = clamp_retry_delay_ms(Some(retry_delay_ms));
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Count the dataset, create the job and start processing it in the
    /// background. Returns as soon as the job exists.
    pub async fn start_run(&self, req: StartRequest) -> Result<StartedRun, ControlError> {
        let sheet = match sheet::load(&req.input).await {
            Ok(sheet) => sheet,
            Err(e) => {
                remove_input(&req.input).await;
                return Err(ControlError::Dataset(e));
            }
        };
        let count = sheet::count_phones(&sheet);
        let output = self.output_dir.join(sheet::result_filename(unix_millis()));
        let timeout_ms = clamp_timeout_ms(Some(req.timeout_ms.unwrap_or(self.default_timeout_ms)));
        let retry_delay_ms =
            clamp_retry_delay_ms(Some(req.retry_delay_ms.unwrap_or(self.default_retry_delay_ms)));

        let job = self.registry.create(NewJob {
            total_phones: count.valid,
            retry_delay_ms,
            download_url: Some(output.to_string_lossy().into_owned()),
            ..Default::default()
        });
        tracing::info!(
            job_id = %job.id,
            input = %req.input.display(),
            valid = count.valid,
            invalid = count.invalid,
            timeout_ms,
            retry_delay_ms,
            "run accepted"
        );

        let batch = BatchRequest {
            job_id: job.id,
            input: req.input,
            output: output.clone(),
            send_timeout: Duration::from_millis(timeout_ms),
        };
        Ok(StartedRun {
            job_id: job.id,
            total_phones: job.total_phones,
            output,
            handle: self.spawn_run(batch),
        })
    }

    /// Start a new segment of a stored job under the same id. The run reads
    /// and writes the job's output dataset, skipping rows already recorded.
    pub async fn continue_run(&self, job_id: JobId) -> Result<StartedRun, ControlError> {
        if let Some(live) = self.registry.get(job_id) {
            if !live.status.is_terminal() {
                return Err(ControlError::Active(job_id));
            }
        }
        let store = self.store.as_ref().ok_or(ControlError::NotFound(job_id))?;
        let stored = store
            .get_job(job_id)
            .await
            .map_err(ControlError::Store)?
            .ok_or(ControlError::NotFound(job_id))?;
        if stored.job.status.is_terminal() {
            return Err(ControlError::Finished {
                id: job_id,
                status: stored.job.status,
            });
        }

        let RunInfo {
            input_path,
            output_path,
            timeout_ms,
        } = stored.run;
        // No flush reached disk yet: start from the original input.
        let input = if tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            output_path.clone()
        } else {
            input_path
        };
        // The sheet scan recomputes the baseline; stats carry over.
        let mut job = stored.job;
        job.processed = 0;
        job.current_index = 0;
        let job = self.registry.restore(job);
        tracing::info!(
            %job_id,
            dataset = %input.display(),
            processed = job.processed,
            "continuing stored job"
        );

        let batch = BatchRequest {
            job_id,
            input,
            output: output_path.clone(),
            send_timeout: Duration::from_millis(clamp_timeout_ms(Some(timeout_ms))),
        };
        Ok(StartedRun {
            job_id,
            total_phones: job.total_phones,
            output: output_path,
            handle: self.spawn_run(batch),
        })
    }

    fn spawn_run(&self, batch: BatchRequest) -> JoinHandle<Option<Job>> {
        let processor = Arc::clone(&self.processor);
        let registry = Arc::clone(&self.registry);
        let store = self.store.clone();
        tokio::spawn(async move { drive_run(&processor, &registry, store.as_ref(), batch).await })
    }

    /// Operator pause. Clears any auto-resume deadline, so the job stays
    /// paused until resumed.
    pub fn pause(&self, job_id: JobId) -> Result<Job, ControlError> {
        let job = self.transition(job_id, |job| {
            (job.status != JobStatus::Paused || job.paused_until.is_some()).then(|| JobPatch {
                status: Some(JobStatus::Paused),
                paused_until: Some(None),
                pause_reason: Some(None),
                current_phone: Some(None),
                ..Default::default()
            })
        })?;
        tracing::info!(%job_id, status = %job.status, "pause requested");
        Ok(job)
    }

    pub fn resume(&self, job_id: JobId) -> Result<Job, ControlError> {
        let job = self.transition(job_id, |_| Some(JobPatch::resume()))?;
        tracing::info!(%job_id, status = %job.status, "resume requested");
        Ok(job)
    }

    /// Irreversible. In-flight provider calls finish; nothing new is dispatched.
    pub fn cancel(&self, job_id: JobId) -> Result<Job, ControlError> {
        let job = self.transition(job_id, |_| {
            Some(JobPatch {
                status: Some(JobStatus::Cancelled),
                paused_until: Some(None),
                pause_reason: Some(None),
                warning: Some(None),
                current_phone: Some(None),
                ..Default::default()
            })
        })?;
        tracing::info!(%job_id, status = %job.status, "cancel requested");
        Ok(job)
    }

    /// Set the rate-limit pause length, clamped to [60000, 3600000] ms.
    pub fn set_retry_delay(&self, job_id: JobId, delay_ms: u64) -> Result<Job, ControlError> {
        let clamped = clamp_retry_delay_ms(Some(delay_ms));
        if clamped != delay_ms {
            tracing::debug!(%job_id, requested = delay_ms, clamped, "retry delay clamped");
        }
        self.transition(job_id, |_| {
            Some(JobPatch {
                retry_delay_ms: Some(clamped),
                ..Default::default()
            })
        })
    }

    /// Job snapshot. A rate-limit pause whose deadline has passed is resumed first.
    pub fn get_status(&self, job_id: JobId) -> Result<Job, ControlError> {
        self.guard.try_auto_resume(job_id, unix_millis());
        self.registry.get(job_id).ok_or(ControlError::NotFound(job_id))
    }

    pub fn list(&self) -> Vec<Job> {
        self.registry.list()
    }

    /// Apply `decide` unless the job already finished.
    fn transition<F>(&self, job_id: JobId, decide: F) -> Result<Job, ControlError>
    where
        F: FnOnce(&Job) -> Option<JobPatch>,
    {
        self.registry
            .modify(job_id, |job| {
                if job.status.is_terminal() {
                    return None;
                }
                decide(job)
            })
            .ok_or(ControlError::NotFound(job_id))
    }
}

/// Default path for the control socket (same XDG state dir as the job store).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("outreach")?.get_state_home();
    Ok(dir.join("control.sock"))
}

/// Run one segment to its end and record the outcome on the job.
async fn drive_run(
    processor: &BatchProcessor,
    registry: &JobRegistry,
    store: Option<&JobStore>,
    batch: BatchRequest,
) -> Option<Job> {
    let job_id = batch.job_id;
    registry.modify(job_id, |job| {
        (job.status == JobStatus::Pending).then(|| JobPatch::status(JobStatus::Running))
    });
    let run_info = RunInfo {
        input_path: batch.input.clone(),
        output_path: batch.output.clone(),
        timeout_ms: batch.send_timeout.as_millis() as u64,
    };
    save_snapshot(registry, store, job_id, &run_info).await;

    let finished = match processor.run(&batch).await {
        Ok(report) if report.end == BatchEnd::Completed => {
            tracing::info!(
                %job_id,
                processed = report.processed,
                total = report.stats.total,
                found = report.stats.found,
                sent = report.stats.send_message_success,
                "job completed"
            );
            JobPatch {
                status: Some(JobStatus::Completed),
                processed: Some(report.processed),
                stats: Some(report.stats),
                current_phone: Some(None),
                paused_until: Some(None),
                pause_reason: Some(None),
                warning: Some(None),
                ..Default::default()
            }
        }
        Ok(_) => JobPatch {
            current_phone: Some(None),
            ..Default::default()
        },
        Err(BatchError::Cancelled) => JobPatch {
            status: Some(JobStatus::Cancelled),
            current_phone: Some(None),
            ..Default::default()
        },
        Err(e) => {
            tracing::error!(%job_id, "run failed: {}", e);
            JobPatch {
                status: Some(JobStatus::Failed),
                error: Some(Some(e.to_string())),
                current_phone: Some(None),
                paused_until: Some(None),
                pause_reason: Some(None),
                ..Default::default()
            }
        }
    };
    registry.update(job_id, finished);

    if batch.input != batch.output {
        remove_input(&batch.input).await;
    }
    save_snapshot(registry, store, job_id, &run_info).await;
    registry.get(job_id)
}

async fn save_snapshot(
    registry: &JobRegistry,
    store: Option<&JobStore>,
    job_id: JobId,
    run: &RunInfo,
) {
    let (Some(store), Some(job)) = (store, registry.get(job_id)) else {
        return;
    };
    if let Err(e) = store.save_job(&job, run).await {
        tracing::warn!(%job_id, "job snapshot not saved: {:#}", e);
    }
}

/// Best-effort removal of a run's input dataset.
async fn remove_input(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "input dataset removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "input dataset not removed: {}", e),
    }
}
