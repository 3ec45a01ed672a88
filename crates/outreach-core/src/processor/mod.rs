//! Batch processor: drives one job over its dataset.
//!
//! The driver walks rows from the resume point, validates phones inline,
//! consults the job status before each dispatch, and hands valid rows to the
//! bounded scheduler. The status is checked again once the scheduler has a
//! slot and a start for the row, so a pause or cancel that lands while the
//! driver waits on the scheduler keeps the row from reaching the provider.
//!
//! Units report row outcomes over a channel; the driver is the only writer of
//! the sheet and of the counters. It flushes every `checkpoint_interval`
//! dispatched rows and once after all units have finished.

mod error;
mod progress;
mod stats;
mod unit;
mod wait;

pub use error::BatchError;
pub use unit::{compose_message, RowOutcome, SendOutcome};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::OutreachConfig;
use crate::guard::RateLimitGuard;
use crate::job::{JobId, JobRegistry, JobStats, JobStatus};
use crate::provider::Provider;
use crate::scheduler::{BoundedScheduler, SchedulerLimits};
use crate::sheet::{self, Sheet, INVALID_PHONE, RESULT_COL};
use crate::store::{JobStore, RunInfo};
use progress::ProgressEvent;
use stats::StatsCounter;
use unit::{RowResult, UnitContext};
use wait::{Gate, StopReason};

const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Engine-wide knobs for every run.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub limits: SchedulerLimits,
    /// Flush the dataset after this many dispatched rows.
    pub checkpoint_interval: usize,
    /// Poll period of the pause wait, for noticing an elapsed auto-resume deadline.
    pub pause_poll: Duration,
    pub templates: Arc<[String]>,
}

impl From<&OutreachConfig> for EngineSettings {
    fn from(cfg: &OutreachConfig) -> Self {
        Self {
            limits: SchedulerLimits::from(&cfg.scheduler),
            checkpoint_interval: cfg.checkpoint_interval.max(1),
            pause_poll: cfg.pause_poll(),
            templates: cfg.templates.clone().into(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&OutreachConfig::default())
    }
}

/// One run of a job over a dataset.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub job_id: JobId,
    /// Dataset to read.
    pub input: PathBuf,
    /// Where flushes go. May equal `input` when continuing a job.
    pub output: PathBuf,
    pub send_timeout: Duration,
}

impl BatchRequest {
    fn run_info(&self) -> RunInfo {
        RunInfo {
            input_path: self.input.clone(),
            output_path: self.output.clone(),
            timeout_ms: self.send_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEnd {
    /// Every row was visited.
    Completed,
    /// Dispatch stopped early because the job vanished or finished elsewhere.
    Halted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub end: BatchEnd,
    /// Valid phones dispatched, including rows done by earlier segments.
    pub processed: u64,
    pub stats: JobStats,
}

pub struct BatchProcessor {
    provider: Arc<dyn Provider>,
    registry: Arc<JobRegistry>,
    guard: RateLimitGuard,
    store: Option<JobStore>,
    settings: EngineSettings,
}

/// Per-run state owned by the driver.
struct Run {
    job_id: JobId,
    sheet: Sheet,
    output: PathBuf,
    results: mpsc::UnboundedReceiver<RowResult>,
    stats: StatsCounter,
    processed: u64,
    progress: mpsc::Sender<ProgressEvent>,
}

impl Run {
    /// Write every outcome reported so far into the sheet and count it.
    fn apply_results(&mut self) {
        while let Ok(RowResult { row, outcome }) = self.results.try_recv() {
            outcome.write_to(&mut self.sheet, row);
            self.stats.record(&outcome);
        }
    }

    async fn report(&self, current_phone: Option<String>) {
        let event = ProgressEvent::Progress {
            processed: self.processed,
            current_phone,
            stats: self.stats.snapshot(),
        };
        // Worker gone only after the run ends.
        let _ = self.progress.send(event).await;
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        self.apply_results();
        sheet::flush(&self.sheet, &self.output).await?;
        let event = ProgressEvent::Flushed {
            stats: self.stats.snapshot(),
        };
        let _ = self.progress.send(event).await;
        Ok(())
    }
}

impl BatchProcessor {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<JobRegistry>,
        settings: EngineSettings,
    ) -> Self {
        let guard = RateLimitGuard::new(Arc::clone(&registry));
        Self {
            provider,
            registry,
            guard,
            store: None,
            settings,
        }
    }

    /// Persist a job snapshot after every flush.
    pub fn with_store(mut self, store: JobStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Process the dataset for `req.job_id`. Does not change the job's
    /// final status; the caller decides completion, cancellation or failure
    /// from the returned value.
    pub async fn run(&self, req: &BatchRequest) -> Result<BatchReport, BatchError> {
        let job_id = req.job_id;
        let sheet = sheet::load(&req.input).await.map_err(BatchError::Dataset)?;
        let point = sheet::resume_point(&sheet);
        if let Some(last) = point.checkpoint {
            tracing::info!(
                %job_id,
                last_processed_row = last,
                already_processed = point.processed_valid,
                "resuming after previously processed rows"
            );
        }

        let seed = self
            .registry
            .get(job_id)
            .map(|job| job.stats)
            .unwrap_or_default();
        let stats = StatsCounter::seeded(&seed);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let progress_task = tokio::spawn(progress::run_progress_loop(
            progress_rx,
            Arc::clone(&self.registry),
            self.store.clone(),
            job_id,
            req.run_info(),
        ));

        let ctx = Arc::new(UnitContext {
            provider: Arc::clone(&self.provider),
            guard: self.guard.clone(),
            job_id,
            send_timeout: req.send_timeout,
            templates: Arc::clone(&self.settings.templates),
            results: results_tx,
        });
        let mut run = Run {
            job_id,
            sheet,
            output: req.output.clone(),
            results: results_rx,
            stats,
            processed: point.processed_valid,
            progress: progress_tx,
        };
        run.report(None).await;

        let mut scheduler = BoundedScheduler::new(self.settings.limits);
        let dispatched = self
            .dispatch_rows(&mut run, &mut scheduler, &ctx, point.start_row)
            .await;
        scheduler.drain().await;
        drop(ctx);

        let outcome = self.finish(&mut run, dispatched).await;
        drop(run);
        if let Err(e) = progress_task.await {
            tracing::warn!(%job_id, "progress worker did not finish: {}", e);
        }
        outcome
    }

    /// Final flush and classification once every unit has finished.
    async fn finish(
        &self,
        run: &mut Run,
        dispatched: Result<Option<StopReason>, BatchError>,
    ) -> Result<BatchReport, BatchError> {
        let job_id = run.job_id;
        run.report(None).await;
        let stop = match dispatched {
            Ok(stop) => stop,
            Err(e) => {
                if let Err(flush_err) = run.flush().await {
                    tracing::warn!(%job_id, "flush after failure failed: {:#}", flush_err);
                }
                return Err(e);
            }
        };
        run.flush().await.map_err(BatchError::Dataset)?;

        let status = self.registry.get(job_id).map(|job| job.status);
        let end = match (stop, status) {
            (Some(StopReason::Cancelled), _) | (_, Some(JobStatus::Cancelled)) => {
                tracing::info!(%job_id, processed = run.processed, "job cancelled; dataset flushed");
                return Err(BatchError::Cancelled);
            }
            (Some(StopReason::Missing), _) | (_, None) => {
                tracing::warn!(%job_id, "job record missing; halting run");
                BatchEnd::Halted
            }
            (Some(StopReason::Finished(status)), _) => {
                tracing::info!(%job_id, %status, "job finished elsewhere; halting run");
                BatchEnd::Halted
            }
            (None, Some(_)) => BatchEnd::Completed,
        };
        Ok(BatchReport {
            end,
            processed: run.processed,
            stats: run.stats.snapshot(),
        })
    }

    /// Walk rows from `start_row`. Returns the reason dispatch stopped early, if any.
    async fn dispatch_rows(
        &self,
        run: &mut Run,
        scheduler: &mut BoundedScheduler,
        ctx: &Arc<UnitContext>,
        start_row: usize,
    ) -> Result<Option<StopReason>, BatchError> {
        let job_id = run.job_id;
        let mut since_flush = 0usize;
        for row in start_row..run.sheet.len() {
            let raw = run.sheet.phone(row).to_string();
            let phone = match sheet::normalize_phone(&raw) {
                Some(phone) if sheet::is_valid_phone(&raw) => phone,
                _ => {
                    run.stats.record_invalid();
                    run.sheet.set_cell(row, RESULT_COL, INVALID_PHONE);
                    tracing::debug!(%job_id, row, raw = %raw, "invalid phone");
                    continue;
                }
            };

            let reservation = loop {
                match wait::gate(&self.registry, &self.guard, job_id, self.settings.pause_poll).await {
                    Gate::Proceed => {}
                    Gate::Stop(reason) => return Ok(Some(reason)),
                }
                let reservation = scheduler.reserve().await.map_err(BatchError::Scheduler)?;
                // Paused or cancelled while waiting for the scheduler.
                if wait::may_start(&self.registry, job_id) {
                    break reservation;
                }
            };
            scheduler.start(reservation, unit::run_unit(Arc::clone(ctx), row, phone.clone()));
            run.processed += 1;
            run.apply_results();
            run.report(Some(phone)).await;

            since_flush += 1;
            if since_flush >= self.settings.checkpoint_interval && self.flush_allowed(job_id) {
                run.flush().await.map_err(BatchError::Dataset)?;
                since_flush = 0;
            }
        }
        Ok(None)
    }

    fn flush_allowed(&self, job_id: JobId) -> bool {
        self.registry
            .get(job_id)
            .is_some_and(|job| matches!(job.status, JobStatus::Running | JobStatus::Paused))
    }
}
