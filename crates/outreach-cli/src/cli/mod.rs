//! CLI for the outreach job engine.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use outreach_core::config;
use outreach_core::job::JobId;
use outreach_core::store::JobStore;
use std::path::PathBuf;

use commands::{run_continue, run_control, run_job, run_status, RunOptions};
use control_socket::ControlRequest;

/// Top-level CLI for the outreach job engine.
#[derive(Debug, Parser)]
#[command(name = "outreach")]
#[command(about = "Resumable, rate-aware bulk phone lookup and messaging", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Process a dataset of phone numbers in the foreground.
    Run {
        /// Dataset file (JSON grid of rows; phone in column 1).
        input: PathBuf,
        /// Per-send timeout in milliseconds (clamped to 1000..=30000).
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
        /// Pause length after a provider rate limit (clamped to 60000..=3600000).
        #[arg(long, value_name = "MS")]
        retry_delay_ms: Option<u64>,
    },

    /// Continue an interrupted job from its output dataset.
    Continue {
        /// Job identifier.
        id: JobId,
    },

    /// Show one job, or all jobs.
    Status {
        /// Job identifier.
        id: Option<JobId>,
    },

    /// Pause a running job.
    Pause {
        /// Job identifier.
        id: JobId,
    },

    /// Resume a paused job.
    Resume {
        /// Job identifier.
        id: JobId,
    },

    /// Cancel a job. Cannot be undone.
    Cancel {
        /// Job identifier.
        id: JobId,
    },

    /// Change how long a job pauses after a provider rate limit.
    SetRetryDelay {
        /// Job identifier.
        id: JobId,
        /// Delay in milliseconds (clamped to 60000..=3600000).
        ms: u64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = JobStore::open_default().await?;

        match cli.command {
            CliCommand::Run {
                input,
                timeout_ms,
                retry_delay_ms,
            } => {
                let opts = RunOptions {
                    timeout_ms,
                    retry_delay_ms,
                };
                run_job(&store, &cfg, &input, opts).await?
            }
            CliCommand::Continue { id } => run_continue(&store, &cfg, id).await?,
            CliCommand::Status { id } => run_status(&store, id).await?,
            CliCommand::Pause { id } => run_control(&store, ControlRequest::Pause(id)).await?,
            CliCommand::Resume { id } => run_control(&store, ControlRequest::Resume(id)).await?,
            CliCommand::Cancel { id } => run_control(&store, ControlRequest::Cancel(id)).await?,
            CliCommand::SetRetryDelay { id, ms } => {
                run_control(&store, ControlRequest::SetRetryDelay(id, ms)).await?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
