//! `outreach run <input>` – process a dataset in the foreground.

use anyhow::{Context, Result};
use outreach_core::config::OutreachConfig;
use outreach_core::control::{self, ControlSurface, StartRequest, StartedRun};
use outreach_core::job::{Job, JobStatus};
use outreach_core::provider::GatewayProvider;
use outreach_core::store::JobStore;
use outreach_core::unix_millis;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::control_socket;

const PROGRESS_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub timeout_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,
}

pub async fn run_job(
    store: &JobStore,
    cfg: &OutreachConfig,
    input: &Path,
    opts: RunOptions,
) -> Result<()> {
    let surface = open_surface(store, cfg).await?;
    // The engine removes its input when done; work on a copy.
    let upload = stage_upload(input, surface.output_dir()).await?;
    let started = surface
        .start_run(StartRequest {
            input: upload,
            timeout_ms: opts.timeout_ms,
            retry_delay_ms: opts.retry_delay_ms,
        })
        .await?;
    watch_run(surface, started).await
}

/// Surface wired to the configured gateway and the job store, after
/// recovering jobs a previous process left mid-run. Refuses while another
/// run is answering on the control socket.
pub(super) async fn open_surface(
    store: &JobStore,
    cfg: &OutreachConfig,
) -> Result<Arc<ControlSurface>> {
    if let Ok(path) = control::default_control_socket_path() {
        control_socket::ensure_no_active_run(&path).await?;
    }
    let recovered = store.recover_interrupted_jobs().await?;
    if recovered > 0 {
        println!("{recovered} interrupted job(s) marked paused; use `outreach continue <id>`.");
    }
    let provider = Arc::new(GatewayProvider::new(&cfg.provider));
    let surface = ControlSurface::from_config(provider, cfg, Some(store.clone()))?;
    Ok(Arc::new(surface))
}

/// Copy `input` into the uploads directory under a unique name.
async fn stage_upload(input: &Path, uploads_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .with_context(|| format!("create uploads dir {}", uploads_dir.display()))?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset.json".to_string());
    let dest = uploads_dir.join(format!("upload_{}_{}", unix_millis(), name));
    tokio::fs::copy(input, &dest)
        .await
        .with_context(|| format!("copy {} -> {}", input.display(), dest.display()))?;
    Ok(dest)
}

/// Host the control socket and print progress until the run ends.
pub(super) async fn watch_run(surface: Arc<ControlSurface>, started: StartedRun) -> Result<()> {
    let StartedRun {
        job_id,
        total_phones,
        output,
        mut handle,
    } = started;
    println!("Job {job_id}: {total_phones} phone(s) to process");
    println!("Output: {}", output.display());

    let socket_path = control::default_control_socket_path().ok();
    let listener = socket_path.as_ref().and_then(|path| {
        match control_socket::spawn_control_listener(Arc::clone(&surface), path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                None
            }
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_millis(PROGRESS_INTERVAL_MS));
    let mut last_status = None;
    let finished = loop {
        tokio::select! {
            res = &mut handle => break res.context("run task failed")?,
            _ = ticker.tick() => {
                if let Ok(job) = surface.get_status(job_id) {
                    print_progress(&job, &mut last_status);
                }
            }
        }
    };

    if let Some(listener) = listener {
        listener.abort();
        if let Some(path) = &socket_path {
            let _ = std::fs::remove_file(path);
        }
    }

    let Some(job) = finished else {
        anyhow::bail!("job {job_id} disappeared before finishing");
    };
    print_summary(&job);
    match job.status {
        JobStatus::Failed => anyhow::bail!(
            "job {} failed: {}",
            job.id,
            job.error.as_deref().unwrap_or("unknown error")
        ),
        _ => Ok(()),
    }
}

fn print_progress(job: &Job, last_status: &mut Option<JobStatus>) {
    if *last_status != Some(job.status) {
        match (&job.status, &job.warning) {
            (JobStatus::Paused, Some(warning)) => println!("\n  paused: {warning}"),
            (status, _) => println!("\n  {status}"),
        }
        *last_status = Some(job.status);
    }
    let pct = if job.total_phones > 0 {
        job.processed as f64 * 100.0 / job.total_phones as f64
    } else {
        100.0
    };
    let s = &job.stats;
    println!(
        "\r  {} / {} ({:.1}%)  found {}  not found {}  errors {}  sent {}  send failed {}  ",
        job.processed,
        job.total_phones,
        pct,
        s.found,
        s.not_found,
        s.error,
        s.send_message_success,
        s.send_message_failed
    );
}

fn print_summary(job: &Job) {
    let s = &job.stats;
    println!();
    println!("Job {} {}", job.id, job.status);
    println!(
        "  total {}  invalid {}  found {}  not found {}  errors {}  sent {}  send failed {}",
        s.total, s.invalid, s.found, s.not_found, s.error, s.send_message_success, s.send_message_failed
    );
    if let Some(url) = &job.download_url {
        println!("  results: {url}");
    }
}
