//! `outreach continue <id>` – resume an interrupted job from its output dataset.

use anyhow::Result;
use outreach_core::config::OutreachConfig;
use outreach_core::job::JobId;
use outreach_core::store::JobStore;

use super::run::{open_surface, watch_run};

pub async fn run_continue(store: &JobStore, cfg: &OutreachConfig, id: JobId) -> Result<()> {
    let surface = open_surface(store, cfg).await?;
    let started = surface.continue_run(id).await?;
    watch_run(surface, started).await
}
