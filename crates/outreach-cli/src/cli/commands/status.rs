//! `outreach status [id]` – ask the active run, falling back to the job store.

use anyhow::Result;
use outreach_core::control;
use outreach_core::job::{Job, JobId};
use outreach_core::store::JobStore;

use crate::cli::control_socket::{self, ControlReply, ControlRequest};

pub async fn run_status(store: &JobStore, id: Option<JobId>) -> Result<()> {
    let live = ask_active_run(ControlRequest::Status(id)).await;

    let Some(id) = id else {
        let mut jobs: Vec<Job> = store.list_jobs().await?.into_iter().map(|s| s.job).collect();
        // Live snapshots are newer than the last flush.
        for job in live.map(|r| r.jobs).unwrap_or_default() {
            match jobs.iter_mut().find(|j| j.id == job.id) {
                Some(stored) => *stored = job,
                None => jobs.push(job),
            }
        }
        print_table(&jobs);
        return Ok(());
    };

    if let Some(job) = live.and_then(|r| r.job) {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }
    match store.get_job(id).await? {
        Some(stored) => println!("{}", serde_json::to_string_pretty(&stored.job)?),
        None => anyhow::bail!("job {id} not found"),
    }
    Ok(())
}

async fn ask_active_run(req: ControlRequest) -> Option<ControlReply> {
    let path = control::default_control_socket_path().ok()?;
    match control_socket::send_request(&path, req).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!("control socket status: {:#}", e);
            None
        }
    }
}

fn print_table(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs in store.");
        return;
    }
    println!("{:<36} {:<10} {:>11} {}", "ID", "STATUS", "PROCESSED", "OUTPUT");
    for j in jobs {
        println!(
            "{:<36} {:<10} {:>11} {}",
            j.id.to_string(),
            j.status.as_str(),
            format!("{}/{}", j.processed, j.total_phones),
            j.download_url.as_deref().unwrap_or("-")
        );
    }
}
